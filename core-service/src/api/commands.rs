//! Console Commands - operations exposed to the presentation layer
//!
//! Triggered classification, snapshot views and removal. Every call returns
//! a structured `Result`; client mistakes surface as `InvalidRequest` or
//! `SourceNotFound` before any storage work happens.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::logic::cache::{LatestStateCache, RefreshHandle, Snapshot};
use crate::logic::dispatcher::{CycleSummary, Dispatcher, SourceOutcome};
use crate::logic::model::sniff_image;
use crate::logic::record::{parse_table_name, table_name, ClassificationResult, SourceId};
use crate::logic::storage::SharedStore;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerRequest {
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
    pub message: String,
    pub source_id: SourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ClassificationResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovalResponse {
    pub status: &'static str,
    pub message: String,
    /// Records deleted
    pub removed: u64,
}

/// One cached source as the image grid shows it
#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub source_id: SourceId,
    pub timestamp: DateTime<Utc>,
    /// Payload URL with a cache-busting suffix
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Raw payload of a cached record
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsoleStatus {
    pub classifier: String,
    pub workers: usize,
    pub cached_sources: usize,
    pub generation: u64,
    pub committed_at: Option<DateTime<Utc>>,
    pub last_cycle: Option<CycleSummary>,
}

// ============================================================================
// CONSOLE
// ============================================================================

#[derive(Clone)]
pub struct Console {
    store: SharedStore,
    dispatcher: Arc<Dispatcher>,
    cache: Arc<LatestStateCache>,
    refresh: RefreshHandle,
}

impl Console {
    pub fn new(dispatcher: Arc<Dispatcher>, cache: Arc<LatestStateCache>, refresh: RefreshHandle) -> Self {
        Self {
            store: Arc::clone(dispatcher.store()),
            dispatcher,
            cache,
            refresh,
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.cache.snapshot()
    }

    /// Run one classification pass for the named table and wait for it.
    ///
    /// The pass goes through the refresh task, so the snapshot already holds
    /// its result when this returns.
    pub async fn trigger(&self, request: TriggerRequest) -> Result<TriggerResponse> {
        let table = request
            .table_name
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::InvalidRequest("table_name is required".into()))?;
        let source_id = parse_table_name(&table)?;
        self.ensure_known(source_id).await?;

        let report = self.refresh.trigger(source_id).await?;
        if let Some(failure) = report.failure(source_id) {
            return Err(failure.error.clone());
        }

        let table = table_name(source_id);
        let (message, result) = match report.outcome(source_id) {
            Some(SourceOutcome::Classified { result, .. }) => (
                format!(
                    "{} classified as {}",
                    table,
                    result.category.as_deref().unwrap_or("unknown")
                ),
                Some(result.clone()),
            ),
            Some(SourceOutcome::Unchanged { .. }) => (format!("no new image in {}", table), None),
            Some(SourceOutcome::Empty) | None => (format!("{} holds no images", table), None),
        };

        Ok(TriggerResponse {
            status: "success",
            message,
            source_id,
            result,
        })
    }

    /// Delete a source's records, its cache entry and its watermark
    pub async fn remove_source(&self, source_id: SourceId) -> Result<RemovalResponse> {
        self.ensure_known(source_id).await?;

        let removed = self.store.delete_by_source(source_id).await?;
        self.cache.invalidate(source_id);
        self.dispatcher.forget(source_id);

        log::info!("Removed {} record(s) of source {}", removed, source_id);
        Ok(RemovalResponse {
            status: "success",
            message: format!("source {} removed", source_id),
            removed,
        })
    }

    /// Truncate every known table and clear all derived state.
    ///
    /// Cache and watermarks are cleared even when some truncates fail; the
    /// first failure is returned after that.
    pub async fn remove_all(&self) -> Result<RemovalResponse> {
        let sources = self.store.list_sources().await?;

        let mut first_error = None;
        for source_id in &sources {
            if let Err(e) = self.store.truncate(*source_id).await {
                log::warn!("Could not truncate {}: {}", table_name(*source_id), e);
                first_error.get_or_insert(e);
            }
        }

        self.cache.invalidate_all();
        self.dispatcher.forget_all();

        if let Some(e) = first_error {
            return Err(e);
        }

        log::info!("Removed all records from {} source(s)", sources.len());
        Ok(RemovalResponse {
            status: "success",
            message: format!("{} source(s) cleared", sources.len()),
            removed: sources.len() as u64,
        })
    }

    /// Cached sources for the image grid, ascending by id
    pub fn images(&self) -> Vec<ImageView> {
        self.cache
            .snapshot()
            .entries
            .iter()
            .map(|(source_id, entry)| ImageView {
                source_id: *source_id,
                timestamp: entry.record.timestamp,
                url: format!("/images/{}?t={}", source_id, entry.record.timestamp.timestamp()),
                category: entry.result.as_ref().and_then(|r| r.category.clone()),
            })
            .collect()
    }

    /// Payload of the cached record, `None` when nothing is cached
    pub fn image(&self, source_id: SourceId) -> Option<ImagePayload> {
        let snapshot = self.cache.snapshot();
        let entry = snapshot.get(source_id)?;
        let mime = sniff_image(&entry.record.payload)
            .map(|kind| kind.mime())
            .unwrap_or("application/octet-stream");

        Some(ImagePayload {
            bytes: entry.record.payload.clone(),
            mime,
        })
    }

    pub fn status(&self) -> ConsoleStatus {
        let snapshot = self.cache.snapshot();
        ConsoleStatus {
            classifier: self.dispatcher.classifier_name().to_string(),
            workers: self.dispatcher.config().workers,
            cached_sources: snapshot.len(),
            generation: snapshot.generation,
            committed_at: snapshot.committed_at,
            last_cycle: snapshot.last_cycle.clone(),
        }
    }

    async fn ensure_known(&self, source_id: SourceId) -> Result<()> {
        if self.store.list_sources().await?.contains(&source_id) {
            Ok(())
        } else {
            Err(Error::SourceNotFound(source_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::cache::CacheRefresher;
    use crate::logic::collector::FixedSampler;
    use crate::logic::config::SourceSet;
    use crate::logic::dispatcher::DispatchConfig;
    use crate::logic::model::DigestClassifier;
    use crate::logic::record::Record;
    use crate::logic::storage::{MemoryStore, RecordStore};
    use std::time::Duration;

    fn jpeg(tag: u8) -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xE0, tag]
    }

    /// Console over a running refresh task. The cold-start cycle has
    /// committed by the time the first trigger is answered.
    fn console(store: Arc<MemoryStore>) -> Console {
        let dispatcher = Arc::new(Dispatcher::new(
            store,
            Arc::new(DigestClassifier::default()),
            Arc::new(FixedSampler::default()),
            DispatchConfig::default(),
        ));
        let cache = Arc::new(LatestStateCache::new());
        let (_task, handle) = CacheRefresher::new(
            dispatcher.clone(),
            cache.clone(),
            SourceSet::Discover,
            Duration::from_secs(3600),
        )
        .spawn();
        Console::new(dispatcher, cache, handle)
    }

    async fn trigger(console: &Console, table: &str) -> TriggerResponse {
        console
            .trigger(TriggerRequest {
                table_name: Some(table.into()),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_trigger_without_table_name_scans_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Record::new(1, jpeg(1))).await.unwrap();
        let console = console(store.clone());
        // Answered only after the cold-start cycle
        trigger(&console, "drone_1").await;
        let scans = store.scan_count();

        let err = console.trigger(TriggerRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(err.is_client_error());
        assert_eq!(store.scan_count(), scans);
    }

    #[tokio::test]
    async fn test_trigger_unknown_and_known_sources() {
        let store = Arc::new(MemoryStore::new());
        let record = Record::new(2, jpeg(2));
        store.insert(record.clone()).await.unwrap();
        let console = console(store.clone());

        let missing = console
            .trigger(TriggerRequest {
                table_name: Some("drone_9".into()),
            })
            .await;
        assert_eq!(missing.unwrap_err(), Error::SourceNotFound(9));

        // The cold-start cycle classified the record first
        let response = trigger(&console, "drone_2").await;
        assert_eq!(response.status, "success");
        assert_eq!(response.source_id, 2);
        assert_eq!(response.message, "no new image in drone_2");
        assert!(response.result.is_none());
        assert_eq!(console.snapshot().get(2).map(|e| e.record.id), Some(record.id));

        let newer = Record::new(2, jpeg(5));
        store.insert(newer.clone()).await.unwrap();
        let response = trigger(&console, "drone_2").await;
        assert_eq!(response.result.map(|r| r.record_id), Some(newer.id));
        assert_eq!(console.snapshot().get(2).map(|e| e.record.id), Some(newer.id));

        let images = console.images();
        assert_eq!(images.len(), 1);
        assert!(images[0].url.starts_with("/images/2?t="));
    }

    #[tokio::test]
    async fn test_remove_source() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Record::new(1, jpeg(1))).await.unwrap();
        store.insert(Record::new(2, jpeg(2))).await.unwrap();
        let console = console(store.clone());
        trigger(&console, "drone_2").await;
        assert!(console.image(1).is_some());

        let response = console.remove_source(1).await.unwrap();
        assert_eq!(response.removed, 1);
        assert!(store.scan(1).await.unwrap().is_empty());
        assert!(console.image(1).is_none());

        let response = trigger(&console, "drone_1").await;
        assert_eq!(response.message, "drone_1 holds no images");
        assert!(console.snapshot().get(1).is_none());
        assert!(console.snapshot().get(2).is_some());

        assert_eq!(console.remove_source(77).await.unwrap_err(), Error::SourceNotFound(77));
    }

    #[tokio::test]
    async fn test_remove_all_clears_everything() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Record::new(1, jpeg(1))).await.unwrap();
        store.insert(Record::new(2, jpeg(2))).await.unwrap();
        let console = console(store.clone());
        trigger(&console, "drone_1").await;
        assert_eq!(console.snapshot().len(), 2);

        let response = console.remove_all().await.unwrap();
        assert_eq!(response.removed, 2);
        assert!(console.snapshot().is_empty());
        assert!(console.images().is_empty());
        assert_eq!(store.len(1) + store.len(2), 0);

        // Fresh records after the reset count as new
        let again = Record::new(1, jpeg(3));
        store.insert(again.clone()).await.unwrap();
        trigger(&console, "drone_1").await;
        assert_eq!(
            console.snapshot().get(1).and_then(|e| e.result.as_ref()).map(|r| r.record_id),
            Some(again.id)
        );
    }

    #[tokio::test]
    async fn test_image_payload_and_status() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Record::new(3, jpeg(3))).await.unwrap();
        let console = console(store);
        trigger(&console, "drone_3").await;

        let payload = console.image(3).unwrap();
        assert_eq!(payload.mime, "image/jpeg");
        assert_eq!(payload.bytes, jpeg(3));

        let status = console.status();
        assert_eq!(status.classifier, "digest");
        assert_eq!(status.cached_sources, 1);
        assert!(status.last_cycle.is_some());
    }
}
