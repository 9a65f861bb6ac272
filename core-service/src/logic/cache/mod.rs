//! Latest-State Cache
//!
//! Process-wide view of the newest record and result per source, shared
//! between the refresh task (the only writer of cycle results) and any
//! number of readers.
//!
//! Readers get an `Arc<Snapshot>` and never wait for a cycle: commits build a
//! complete new snapshot and swap it in. Commits and invalidations serialize
//! on a write gate that also tracks invalidation epochs. A commit carries the
//! epoch observed when its cycle started, and any source invalidated after
//! that point is left out of the commit.

pub mod refresher;
#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::logic::dispatcher::{CycleReport, CycleSummary, SourceOutcome};
use crate::logic::record::{ClassificationResult, Record, SourceId};

pub use refresher::{CacheRefresher, RefreshHandle};

/// Cached state of one source
///
/// Records are shared between consecutive snapshots; publishing a new
/// snapshot never copies payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub record: Arc<Record>,
    /// `None` while the latest record has no result in this process yet
    pub result: Option<ClassificationResult>,
}

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Bumped on every commit or invalidation
    pub generation: u64,
    pub committed_at: Option<DateTime<Utc>>,
    pub entries: BTreeMap<SourceId, SnapshotEntry>,
    /// Digest of the last committed full cycle
    pub last_cycle: Option<CycleSummary>,
}

impl Snapshot {
    pub fn get(&self, source_id: SourceId) -> Option<&SnapshotEntry> {
        self.entries.get(&source_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn overview(&self) -> Vec<EntryOverview> {
        self.entries
            .iter()
            .map(|(source_id, entry)| EntryOverview {
                source_id: *source_id,
                record_id: entry.record.id.to_string(),
                timestamp: entry.record.timestamp,
                label: entry.result.as_ref().map(|r| r.label.0),
                category: entry.result.as_ref().and_then(|r| r.category.clone()),
                latency_ms: entry.result.as_ref().map(ClassificationResult::latency_ms),
            })
            .collect()
    }
}

/// Serializable row of a snapshot, without the payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryOverview {
    pub source_id: SourceId,
    pub record_id: String,
    pub timestamp: DateTime<Utc>,
    pub label: Option<u32>,
    pub category: Option<String>,
    pub latency_ms: Option<f64>,
}

/// Which sources a commit speaks for
#[derive(Debug, Clone, Copy)]
pub enum CommitScope<'a> {
    /// A full cycle over exactly these sources; entries for anything else
    /// are dropped
    Full(&'a [SourceId]),
    /// A single-source pass; other entries are untouched
    Partial,
}

#[derive(Debug, Default)]
struct WriteGate {
    /// Invalidation counter
    epoch: u64,
    generation: u64,
    invalidated: HashMap<SourceId, u64>,
    invalidated_all: u64,
}

impl WriteGate {
    fn is_stale(&self, source_id: SourceId, since: u64) -> bool {
        self.invalidated_all > since || self.invalidated.get(&source_id).is_some_and(|e| *e > since)
    }
}

#[derive(Default)]
pub struct LatestStateCache {
    current: RwLock<Arc<Snapshot>>,
    gate: Mutex<WriteGate>,
}

impl LatestStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot. Never blocks on a running cycle.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Invalidation epoch; capture before starting a cycle and pass to `commit`
    pub fn epoch(&self) -> u64 {
        self.gate.lock().epoch
    }

    /// Drop one source's entry now. Cycles started earlier cannot bring it back.
    pub fn invalidate(&self, source_id: SourceId) {
        let mut gate = self.gate.lock();
        gate.epoch += 1;
        let epoch = gate.epoch;
        gate.invalidated.insert(source_id, epoch);
        gate.generation += 1;

        let mut next = (**self.current.read()).clone();
        next.entries.remove(&source_id);
        next.generation = gate.generation;
        *self.current.write() = Arc::new(next);

        log::debug!("Cache entry for source {} invalidated (epoch {})", source_id, epoch);
    }

    pub fn invalidate_all(&self) {
        let mut gate = self.gate.lock();
        gate.epoch += 1;
        gate.invalidated_all = gate.epoch;
        gate.invalidated.clear();
        gate.generation += 1;

        let last_cycle = self.current.read().last_cycle.clone();
        *self.current.write() = Arc::new(Snapshot {
            generation: gate.generation,
            committed_at: Some(Utc::now()),
            entries: BTreeMap::new(),
            last_cycle,
        });

        log::debug!("Cache cleared (epoch {})", gate.epoch);
    }

    /// Merge a cycle report into a new snapshot and publish it.
    ///
    /// Classified sources take the new (record, result); unchanged sources
    /// keep their entry while it still points at the latest record; empty
    /// sources are dropped; failed sources keep whatever they had.
    pub fn commit(&self, report: &CycleReport, since_epoch: u64, scope: CommitScope<'_>) -> Arc<Snapshot> {
        let mut gate = self.gate.lock();
        let mut next = (**self.current.read()).clone();

        if let CommitScope::Full(sources) = scope {
            next.entries.retain(|id, _| sources.contains(id));
        }

        let mut skipped = 0usize;
        for (source_id, outcome) in &report.outcomes {
            if gate.is_stale(*source_id, since_epoch) {
                skipped += 1;
                continue;
            }

            match outcome {
                SourceOutcome::Classified { record, result, .. } => {
                    next.entries.insert(
                        *source_id,
                        SnapshotEntry {
                            record: Arc::new(record.clone()),
                            result: Some(result.clone()),
                        },
                    );
                }
                SourceOutcome::Unchanged { latest } => {
                    let current = next.entries.get(source_id).map(|e| e.record.id);
                    if current != Some(latest.id) {
                        next.entries.insert(
                            *source_id,
                            SnapshotEntry {
                                record: Arc::new(latest.clone()),
                                result: None,
                            },
                        );
                    }
                }
                SourceOutcome::Empty => {
                    next.entries.remove(source_id);
                }
            }
        }

        if skipped > 0 {
            log::debug!(
                "Cycle #{}: {} invalidated source(s) left out of the commit",
                report.cycle,
                skipped
            );
        }

        gate.generation += 1;
        next.generation = gate.generation;
        next.committed_at = Some(Utc::now());
        if let CommitScope::Full(_) = scope {
            next.last_cycle = Some(report.summary());
        }

        let next = Arc::new(next);
        *self.current.write() = Arc::clone(&next);
        next
    }
}
