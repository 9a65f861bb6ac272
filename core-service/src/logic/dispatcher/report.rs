//! Cycle reports: per-source outcomes plus aggregate latency and resource
//! statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Error;
use crate::logic::collector::ResourceSample;
use crate::logic::record::{ClassificationResult, Record, RecordId, SourceId};

/// What happened to one source during a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    /// A new record was classified
    Classified {
        record: Record,
        result: ClassificationResult,
        sample: ResourceSample,
    },
    /// Newest record was already classified in an earlier cycle
    Unchanged { latest: Record },
    /// Table holds no records
    Empty,
}

impl SourceOutcome {
    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            SourceOutcome::Classified { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// A source whose scan or classification failed this cycle
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source_id: SourceId,
    pub error: Error,
    /// Record that was being classified, if the scan got that far
    pub record_id: Option<RecordId>,
    /// Sample taken before a classification that then failed
    pub sample: Option<ResourceSample>,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Successful sources, ascending by id
    pub outcomes: Vec<(SourceId, SourceOutcome)>,
    /// Failed sources, ascending by id
    pub failures: Vec<SourceFailure>,
    /// Mean latency over classified sources; `None` without successes
    pub mean_latency: Option<Duration>,
    /// Mean over every sample taken during the cycle
    pub mean_resource: Option<ResourceSample>,
}

impl CycleReport {
    pub(crate) fn build(
        cycle: u64,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        results: Vec<(SourceId, Result<SourceOutcome, SourceFailure>)>,
    ) -> Self {
        let mut outcomes = Vec::new();
        let mut failures = Vec::new();

        for (source_id, result) in results {
            match result {
                Ok(outcome) => outcomes.push((source_id, outcome)),
                Err(failure) => failures.push(failure),
            }
        }
        outcomes.sort_by_key(|(id, _)| *id);
        failures.sort_by_key(|f| f.source_id);

        let latencies: Vec<Duration> = outcomes
            .iter()
            .filter_map(|(_, o)| o.result().map(|r| r.latency))
            .collect();
        let mean_latency = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<Duration>() / latencies.len() as u32)
        };

        let samples = outcomes
            .iter()
            .filter_map(|(_, o)| match o {
                SourceOutcome::Classified { sample, .. } => Some(sample),
                _ => None,
            })
            .chain(failures.iter().filter_map(|f| f.sample.as_ref()));
        let mean_resource = ResourceSample::mean(samples);

        Self {
            cycle,
            started_at,
            elapsed,
            outcomes,
            failures,
            mean_latency,
            mean_resource,
        }
    }

    pub fn outcome(&self, source_id: SourceId) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == source_id)
            .map(|(_, o)| o)
    }

    pub fn failure(&self, source_id: SourceId) -> Option<&SourceFailure> {
        self.failures.iter().find(|f| f.source_id == source_id)
    }

    pub fn results(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.outcomes.iter().filter_map(|(_, o)| o.result())
    }

    pub fn summary(&self) -> CycleSummary {
        let count = |pred: fn(&SourceOutcome) -> bool| {
            self.outcomes.iter().filter(|(_, o)| pred(o)).count()
        };

        CycleSummary {
            cycle: self.cycle,
            started_at: self.started_at,
            elapsed_ms: self.elapsed.as_secs_f64() * 1000.0,
            sources: self.outcomes.len() + self.failures.len(),
            classified: count(|o| matches!(o, SourceOutcome::Classified { .. })),
            unchanged: count(|o| matches!(o, SourceOutcome::Unchanged { .. })),
            empty: count(|o| matches!(o, SourceOutcome::Empty)),
            failed: self.failures.len(),
            mean_latency_ms: self.mean_latency.map(|d| d.as_secs_f64() * 1000.0),
            mean_resource: self.mean_resource.clone(),
            failures: self
                .failures
                .iter()
                .map(|f| FailureSummary {
                    source_id: f.source_id,
                    kind: f.error.kind(),
                    message: f.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Serializable digest of a cycle for the viewing layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: f64,
    pub sources: usize,
    pub classified: usize,
    pub unchanged: usize,
    pub empty: usize,
    pub failed: usize,
    pub mean_latency_ms: Option<f64>,
    pub mean_resource: Option<ResourceSample>,
    pub failures: Vec<FailureSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureSummary {
    pub source_id: SourceId,
    pub kind: &'static str,
    pub message: String,
}

impl std::fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cycle #{}: {} sources, {} classified, {} unchanged, {} empty, {} failed in {:.1}ms",
            self.cycle, self.sources, self.classified, self.unchanged, self.empty, self.failed, self.elapsed_ms
        )?;
        if let Some(latency) = self.mean_latency_ms {
            write!(f, ", mean latency {:.1}ms", latency)?;
        }
        if let Some(res) = &self.mean_resource {
            write!(f, ", cpu {:.1}% mem {:.1}%", res.cpu_overall, res.memory_percent)?;
        }
        Ok(())
    }
}
