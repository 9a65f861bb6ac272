use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::*;
use crate::error::Error;
use crate::logic::collector::{FixedSampler, ResourceSample};
use crate::logic::config::SourceSet;
use crate::logic::dispatcher::{DispatchConfig, Dispatcher, SourceFailure};
use crate::logic::model::{DigestClassifier, Label};
use crate::logic::storage::{MemoryStore, RecordStore};

fn record(source_id: SourceId) -> Record {
    Record::new(source_id, vec![0xFF, 0xD8, 0xFF, source_id as u8])
}

fn classified(record: &Record) -> SourceOutcome {
    SourceOutcome::Classified {
        record: record.clone(),
        result: ClassificationResult {
            record_id: record.id,
            source_id: record.source_id,
            label: Label(3),
            category: Some("drone".into()),
            latency: Duration::from_millis(12),
        },
        sample: ResourceSample::default(),
    }
}

fn report(cycle: u64, results: Vec<(SourceId, std::result::Result<SourceOutcome, SourceFailure>)>) -> CycleReport {
    CycleReport::build(cycle, Utc::now(), Duration::from_millis(5), results)
}

fn failed(source_id: SourceId) -> std::result::Result<SourceOutcome, SourceFailure> {
    Err(SourceFailure {
        source_id,
        error: Error::StorageUnavailable("down".into()),
        record_id: None,
        sample: None,
    })
}

#[test]
fn test_commit_merge_rules() {
    let cache = LatestStateCache::new();
    let (a, b, c) = (record(1), record(2), record(3));

    cache.commit(
        &report(1, vec![(1, Ok(classified(&a))), (2, Ok(classified(&b))), (3, Ok(classified(&c)))]),
        cache.epoch(),
        CommitScope::Full(&[1, 2, 3]),
    );
    assert_eq!(cache.snapshot().len(), 3);

    // 1 unchanged, 2 emptied, 3 failing
    let snap = cache.commit(
        &report(2, vec![(1, Ok(SourceOutcome::Unchanged { latest: a.clone() })), (2, Ok(SourceOutcome::Empty)), (3, failed(3))]),
        cache.epoch(),
        CommitScope::Full(&[1, 2, 3]),
    );

    assert_eq!(snap.get(1).and_then(|e| e.result.as_ref()).map(|r| r.record_id), Some(a.id));
    assert!(snap.get(2).is_none());
    assert_eq!(snap.get(3).map(|e| e.record.id), Some(c.id));
    assert_eq!(snap.last_cycle.as_ref().map(|s| s.cycle), Some(2));
}

#[test]
fn test_unchanged_source_gains_entry_without_result() {
    let cache = LatestStateCache::new();
    let a = record(1);

    let snap = cache.commit(
        &report(1, vec![(1, Ok(SourceOutcome::Unchanged { latest: a.clone() }))]),
        cache.epoch(),
        CommitScope::Partial,
    );

    let entry = snap.get(1).unwrap();
    assert_eq!(*entry.record, a);
    assert_eq!(entry.result, None);
}

#[test]
fn test_untouched_entries_are_shared_across_snapshots() {
    let cache = LatestStateCache::new();
    let (a, b) = (record(1), record(2));
    let first = cache.commit(
        &report(1, vec![(1, Ok(classified(&a))), (2, Ok(classified(&b)))]),
        cache.epoch(),
        CommitScope::Full(&[1, 2]),
    );

    let second = cache.commit(
        &report(2, vec![(1, Ok(SourceOutcome::Unchanged { latest: a.clone() })), (2, failed(2))]),
        cache.epoch(),
        CommitScope::Full(&[1, 2]),
    );
    cache.invalidate(2);
    let third = cache.snapshot();

    for snap in [&second, &third] {
        assert!(Arc::ptr_eq(&first.get(1).unwrap().record, &snap.get(1).unwrap().record));
    }
    assert!(Arc::ptr_eq(&first.get(2).unwrap().record, &second.get(2).unwrap().record));
    assert!(third.get(2).is_none());
}

#[test]
fn test_invalidate_all_empties_without_refresh() {
    let cache = LatestStateCache::new();
    cache.commit(
        &report(1, vec![(1, Ok(classified(&record(1)))), (2, Ok(classified(&record(2))))]),
        cache.epoch(),
        CommitScope::Full(&[1, 2]),
    );
    let before = cache.snapshot();

    cache.invalidate_all();

    assert!(cache.snapshot().is_empty());
    // Readers holding the old snapshot are unaffected
    assert_eq!(before.len(), 2);
    assert!(cache.snapshot().generation > before.generation);
}

#[test]
fn test_invalidation_wins_over_inflight_cycle() {
    let cache = LatestStateCache::new();
    let a = record(1);
    let b = record(2);

    // Cycle starts, then source 1 is removed before it commits
    let since = cache.epoch();
    cache.invalidate(1);
    let snap = cache.commit(
        &report(1, vec![(1, Ok(classified(&a))), (2, Ok(classified(&b)))]),
        since,
        CommitScope::Full(&[1, 2]),
    );

    assert!(snap.get(1).is_none());
    assert!(snap.get(2).is_some());

    // A cycle that started after the removal may repopulate it
    let snap = cache.commit(
        &report(2, vec![(1, Ok(classified(&record(1))))]),
        cache.epoch(),
        CommitScope::Partial,
    );
    assert!(snap.get(1).is_some());
}

#[test]
fn test_invalidate_all_wins_over_inflight_cycle() {
    let cache = LatestStateCache::new();
    let since = cache.epoch();
    cache.invalidate_all();

    let snap = cache.commit(
        &report(1, vec![(1, Ok(classified(&record(1))))]),
        since,
        CommitScope::Full(&[1]),
    );
    assert!(snap.is_empty());
}

#[test]
fn test_full_commit_prunes_unlisted_sources() {
    let cache = LatestStateCache::new();
    cache.commit(
        &report(1, vec![(1, Ok(classified(&record(1)))), (9, Ok(classified(&record(9))))]),
        cache.epoch(),
        CommitScope::Full(&[1, 9]),
    );

    let snap = cache.commit(&report(2, vec![(1, Ok(classified(&record(1))))]), cache.epoch(), CommitScope::Full(&[1]));
    assert!(snap.get(9).is_none());

    let overview = snap.overview();
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].category.as_deref(), Some("drone"));
    assert_eq!(overview[0].label, Some(3));
}

fn refresher_for(store: Arc<MemoryStore>, cache: Arc<LatestStateCache>) -> CacheRefresher {
    let dispatcher = Dispatcher::new(
        store,
        Arc::new(DigestClassifier::default()),
        Arc::new(FixedSampler::default()),
        DispatchConfig::default(),
    );
    CacheRefresher::new(Arc::new(dispatcher), cache, SourceSet::Discover, Duration::from_secs(3600))
}

#[tokio::test]
async fn test_refresh_populates_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let a = record(1);
    store.insert(a.clone()).await.unwrap();
    store.truncate(2).await.unwrap();

    let cache = Arc::new(LatestStateCache::new());
    let refresher = refresher_for(store, cache.clone());
    refresher.refresh().await;

    let snap = cache.snapshot();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap.get(1).and_then(|e| e.result.as_ref()).map(|r| r.record_id), Some(a.id));
    assert_eq!(snap.last_cycle.as_ref().map(|s| s.classified), Some(1));
}

#[tokio::test]
async fn test_triggered_pass_lands_in_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(LatestStateCache::new());
    let (task, handle) = refresher_for(store.clone(), cache.clone()).spawn();

    // Cold-start cycle runs on an empty store
    let empty = handle.trigger(5).await.unwrap();
    assert_eq!(empty.outcome(5), Some(&SourceOutcome::Empty));

    let newest = record(5);
    store.insert(newest.clone()).await.unwrap();
    let report = handle.trigger(5).await.unwrap();

    assert_eq!(report.results().next().map(|r| r.record_id), Some(newest.id));
    assert_eq!(cache.snapshot().get(5).map(|e| e.record.id), Some(newest.id));

    drop(handle);
    task.await.unwrap();
}

#[tokio::test]
async fn test_removed_source_absent_from_next_commit() {
    let store = Arc::new(MemoryStore::new());
    store.insert(record(1)).await.unwrap();
    store.insert(record(2)).await.unwrap();

    let cache = Arc::new(LatestStateCache::new());
    let refresher = refresher_for(store.clone(), cache.clone());
    refresher.refresh().await;
    assert_eq!(cache.snapshot().len(), 2);

    store.delete_by_source(1).await.unwrap();
    cache.invalidate(1);
    assert!(store.scan(1).await.unwrap().is_empty());
    assert!(cache.snapshot().get(1).is_none());

    refresher.refresh().await;
    let snap = cache.snapshot();
    assert!(snap.get(1).is_none());
    assert!(snap.get(2).is_some());
}

#[tokio::test]
async fn test_queued_trigger_answered_after_cold_start() {
    let store = Arc::new(MemoryStore::new());
    let a = record(4);
    store.insert(a.clone()).await.unwrap();

    let cache = Arc::new(LatestStateCache::new());
    let (task, handle) = refresher_for(store, cache.clone()).spawn();

    let report = handle.trigger(4).await.unwrap();
    assert_eq!(report.outcome(4), Some(&SourceOutcome::Unchanged { latest: a.clone() }));
    assert!(cache.snapshot().last_cycle.is_some());

    drop(handle);
    task.await.unwrap();
}
