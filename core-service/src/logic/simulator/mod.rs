//! Source Generator - simulated drones
//!
//! One tokio task per simulated source. Each unit optionally truncates its
//! own table once, then inserts a fresh record every `interval` until the
//! shared deadline passes. Units never coordinate with each other.

pub mod payload;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::logic::config::SimulatorConfig;
use crate::logic::record::{table_name, Record, SourceId};
use crate::logic::storage::SharedStore;

pub use payload::{ImageDirectory, PayloadSource, SyntheticImages};

/// Insert counts of one producer unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub source_id: SourceId,
    pub inserted: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratorReport {
    /// Ascending by source id
    pub units: Vec<UnitReport>,
    pub elapsed: Duration,
}

impl GeneratorReport {
    pub fn unit(&self, source_id: SourceId) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.source_id == source_id)
    }

    pub fn total_inserted(&self) -> u64 {
        self.units.iter().map(|u| u.inserted).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.units.iter().map(|u| u.failed).sum()
    }
}

pub struct SourceGenerator {
    store: SharedStore,
    payloads: Arc<dyn PayloadSource>,
    config: SimulatorConfig,
}

impl SourceGenerator {
    pub fn new(store: SharedStore, payloads: Arc<dyn PayloadSource>, config: SimulatorConfig) -> Self {
        Self {
            store,
            payloads,
            config,
        }
    }

    /// Run every unit until the deadline.
    ///
    /// Without a configured duration this only returns if the future is
    /// dropped, which aborts all units.
    pub async fn run(&self) -> GeneratorReport {
        let start = Instant::now();
        let deadline = self.config.duration.map(|d| start + d);

        log::info!(
            "Starting {} simulated source(s), one record every {:?}{}",
            self.config.sources,
            self.config.interval,
            match self.config.duration {
                Some(d) => format!(" for {:?}", d),
                None => String::new(),
            }
        );

        let mut units = JoinSet::new();
        for source_id in 0..self.config.sources {
            let unit = ProducerUnit {
                source_id,
                store: Arc::clone(&self.store),
                payloads: Arc::clone(&self.payloads),
                interval: self.config.interval,
                reset: self.config.reset,
                deadline,
            };
            units.spawn(unit.run());
        }

        let mut reports = Vec::with_capacity(self.config.sources as usize);
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => log::error!("Producer unit aborted: {}", e),
            }
        }
        reports.sort_by_key(|r| r.source_id);

        let report = GeneratorReport {
            units: reports,
            elapsed: start.elapsed(),
        };
        log::info!(
            "Simulation finished: {} inserted, {} failed in {:?}",
            report.total_inserted(),
            report.total_failed(),
            report.elapsed
        );
        report
    }
}

struct ProducerUnit {
    source_id: SourceId,
    store: SharedStore,
    payloads: Arc<dyn PayloadSource>,
    interval: Duration,
    reset: bool,
    deadline: Option<Instant>,
}

impl ProducerUnit {
    async fn run(self) -> UnitReport {
        let mut report = UnitReport {
            source_id: self.source_id,
            ..Default::default()
        };

        if self.reset {
            match self.store.truncate(self.source_id).await {
                Ok(()) => log::info!("Truncated {}", table_name(self.source_id)),
                Err(e) => log::warn!("Could not truncate {}: {}", table_name(self.source_id), e),
            }
        }

        loop {
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }

            let record = Record::new(self.source_id, self.payloads.next_payload());
            let record_id = record.id;
            match self.store.insert(record).await {
                Ok(()) => {
                    report.inserted += 1;
                    log::debug!("Drone {} published {}", self.source_id, record_id);
                }
                Err(e) => {
                    report.failed += 1;
                    log::warn!("Drone {} insert failed: {}", self.source_id, e);
                }
            }

            tokio::time::sleep(self.interval).await;
        }

        report
    }
}
