//! Dispatcher - bounded-concurrency classification across sources
//!
//! One cycle: for every source, scan -> detect -> classify the new record (if
//! any). Sources are processed by at most `workers` concurrent futures, and
//! the classifier itself runs on tokio's blocking pool so a heavy model never
//! stalls the async workers.
//!
//! Blocking classifications hold a permit from a semaphore sized to
//! `workers` until they return, including ones whose caller already timed
//! out, so abandoned calls still count against the bound across cycles.
//!
//! # Failure Strategy
//! A storage error, malformed payload or classifier failure is recorded
//! against its source only. The cycle always completes, and the watermark of
//! a failed source is not advanced, so its record is retried next cycle.

pub mod report;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::logic::collector::{ResourceSample, ResourceSampler};
use crate::logic::config::{PollerConfig, ScanMode, SourceSet};
use crate::logic::detector::{ChangeDetector, Detection};
use crate::logic::model::{Label, SharedClassifier};
use crate::logic::record::{parse_table_name, table_name, ClassificationResult, Record, SourceId};
use crate::logic::storage::SharedStore;

pub use report::{CycleReport, CycleSummary, FailureSummary, SourceFailure, SourceOutcome};

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub workers: usize,
    pub scan_mode: ScanMode,
    pub storage_timeout: Duration,
    pub classify_timeout: Duration,
}

impl From<&PollerConfig> for DispatchConfig {
    fn from(config: &PollerConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            scan_mode: config.scan_mode,
            storage_timeout: config.storage_timeout,
            classify_timeout: config.classify_timeout,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::from(&PollerConfig::default())
    }
}

pub struct Dispatcher {
    store: SharedStore,
    classifier: SharedClassifier,
    sampler: Arc<dyn ResourceSampler>,
    detector: ChangeDetector,
    config: DispatchConfig,
    /// Classification slots, one per worker
    slots: Arc<Semaphore>,
    cycles: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        store: SharedStore,
        classifier: SharedClassifier,
        sampler: Arc<dyn ResourceSampler>,
        config: DispatchConfig,
    ) -> Self {
        log::info!(
            "Dispatcher ready (classifier: {}, workers: {}, scan mode: {:?})",
            classifier.name(),
            config.workers,
            config.scan_mode
        );

        Self {
            store,
            classifier,
            sampler,
            detector: ChangeDetector::new(),
            slots: Arc::new(Semaphore::new(config.workers.max(1))),
            config,
            cycles: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Drop the watermark of a removed source
    pub fn forget(&self, source_id: SourceId) {
        self.detector.forget(source_id);
    }

    pub fn forget_all(&self) {
        self.detector.forget_all();
    }

    /// Sources a cycle should cover right now
    pub async fn resolve_sources(&self, set: &SourceSet) -> Result<Vec<SourceId>> {
        match set {
            SourceSet::Fixed(ids) => Ok(ids.clone()),
            SourceSet::Discover => self.with_storage_timeout("list sources", self.store.list_sources()).await,
        }
    }

    /// One full pass over `sources`
    pub async fn run_cycle(&self, sources: &[SourceId]) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let started_at = Utc::now();
        let cycle_start = Instant::now();

        let mut sources = sources.to_vec();
        sources.sort_unstable();
        sources.dedup();

        let results: Vec<_> = stream::iter(sources)
            .map(|source_id| async move { (source_id, self.process_source(source_id, cycle_start).await) })
            .buffer_unordered(self.config.workers)
            .collect()
            .await;

        let report = CycleReport::build(cycle, started_at, cycle_start.elapsed(), results);

        for failure in &report.failures {
            log::warn!(
                "Source {} failed in cycle #{}: {}",
                failure.source_id,
                cycle,
                failure.error
            );
        }

        report
    }

    /// A one-source cycle, for explicit external requests
    pub async fn run_single(&self, source_id: SourceId) -> CycleReport {
        log::info!("Triggered pass for {}", table_name(source_id));
        self.run_cycle(&[source_id]).await
    }

    /// Triggered pass addressed by table name, e.g. `drone_3`
    pub async fn run_triggered(&self, table: &str) -> Result<CycleReport> {
        let source_id = parse_table_name(table)?;
        Ok(self.run_single(source_id).await)
    }

    async fn process_source(
        &self,
        source_id: SourceId,
        cycle_start: Instant,
    ) -> std::result::Result<SourceOutcome, SourceFailure> {
        let failure = |error: Error, record: Option<&Record>, sample: Option<ResourceSample>| SourceFailure {
            source_id,
            error,
            record_id: record.map(|r| r.id),
            sample,
        };

        let records = self.fetch(source_id).await.map_err(|e| failure(e, None, None))?;

        let record = match self.detector.check(source_id, &records) {
            Detection::Empty => return Ok(SourceOutcome::Empty),
            Detection::Unchanged(latest) => return Ok(SourceOutcome::Unchanged { latest }),
            Detection::New(record) => record,
        };

        let (sample, classified) = self.classify(&record).await;
        let latency = cycle_start.elapsed();

        let label = classified.map_err(|e| failure(e, Some(&record), sample.clone()))?;

        // Only a successful classification advances the watermark
        self.detector.mark_processed(source_id, record.id);

        let result = ClassificationResult {
            record_id: record.id,
            source_id,
            label,
            category: self.classifier.category(label),
            latency,
        };

        log::info!(
            "Drone {} - Image ID {} classified as: {}",
            source_id,
            record.id,
            result.category.as_deref().unwrap_or("unknown")
        );

        Ok(SourceOutcome::Classified {
            record,
            result,
            sample: sample.unwrap_or_default(),
        })
    }

    async fn fetch(&self, source_id: SourceId) -> Result<Vec<Record>> {
        match self.config.scan_mode {
            ScanMode::FullScan => self.with_storage_timeout("scan", self.store.scan(source_id)).await,
            ScanMode::LatestQuery => Ok(self
                .with_storage_timeout("latest", self.store.latest(source_id))
                .await?
                .into_iter()
                .collect()),
        }
    }

    async fn with_storage_timeout<T>(
        &self,
        what: &str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        timeout(self.config.storage_timeout, fut).await.map_err(|_| {
            Error::StorageUnavailable(format!("{} timed out after {:?}", what, self.config.storage_timeout))
        })?
    }

    /// Sample resources, then classify on the blocking pool.
    ///
    /// The timeout covers waiting for a slot as well as the call itself. A
    /// timed-out call keeps its slot until the model returns; its result is
    /// discarded.
    async fn classify(&self, record: &Record) -> (Option<ResourceSample>, Result<Label>) {
        let classifier = Arc::clone(&self.classifier);
        let sampler = Arc::clone(&self.sampler);
        let slots = Arc::clone(&self.slots);
        let payload = record.payload.clone();

        let work = async move {
            let permit = slots
                .acquire_owned()
                .await
                .map_err(|_| Error::Classifier("classification slots closed".into()))?;

            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let sample = sampler.sample();
                let label = classifier.classify(&payload);
                (sample, label)
            })
            .await
            .map_err(|join_err| Error::Classifier(format!("classification worker failed: {}", join_err)))
        };

        match timeout(self.config.classify_timeout, work).await {
            Ok(Ok((sample, label))) => (Some(sample), label),
            Ok(Err(e)) => (None, Err(e)),
            Err(_) => (
                None,
                Err(Error::Classifier(format!(
                    "classification timed out after {:?}",
                    self.config.classify_timeout
                ))),
            ),
        }
    }
}
