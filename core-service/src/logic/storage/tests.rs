use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use super::*;
use crate::logic::config::StoreConfig;

fn record_at(source_id: SourceId, micros: i64) -> Record {
    // Whole microseconds, the resolution the SQLite store keeps
    let ts = Utc.timestamp_micros(1_700_000_000_000_000 + micros).unwrap();
    Record::with_timestamp(source_id, ts, vec![0xFF, 0xD8, 0xFF, micros as u8])
}

async fn sqlite_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        database_url: format!("sqlite://{}", dir.path().join("records.db").display()),
        max_connections: 2,
    };
    let store = SqliteStore::connect(&config).await.unwrap();
    (dir, store)
}

/// Behaviour every store must share
async fn exercise(store: &dyn RecordStore) {
    assert!(store.scan(1).await.unwrap().is_empty());
    assert_eq!(store.latest(1).await.unwrap(), None);

    let older = record_at(1, 10);
    let newer = record_at(1, 20);
    store.insert(newer.clone()).await.unwrap();
    store.insert(older.clone()).await.unwrap();
    store.insert(record_at(2, 5)).await.unwrap();

    let mut scanned = store.scan(1).await.unwrap();
    scanned.sort_by_key(|r| r.recency_key());
    assert_eq!(scanned, vec![older.clone(), newer.clone()]);
    assert_eq!(store.latest(1).await.unwrap(), Some(newer.clone()));
    assert_eq!(store.list_sources().await.unwrap(), vec![1, 2]);

    assert_eq!(store.delete_by_source(1).await.unwrap(), 2);
    assert!(store.scan(1).await.unwrap().is_empty());
    assert_eq!(store.scan(2).await.unwrap().len(), 1);
    assert_eq!(store.delete_by_source(42).await.unwrap(), 0);

    store.truncate(2).await.unwrap();
    assert!(store.scan(2).await.unwrap().is_empty());
    // Truncating a table that never existed creates it empty
    store.truncate(3).await.unwrap();
    assert!(store.list_sources().await.unwrap().contains(&3));
}

async fn latest_tie_break(store: &dyn RecordStore) {
    let mut low = record_at(8, 1);
    let mut high = record_at(8, 1);
    low.id = Uuid::from_u128(1);
    high.id = Uuid::from_u128(2);

    store.insert(high.clone()).await.unwrap();
    store.insert(low).await.unwrap();
    assert_eq!(store.latest(8).await.unwrap().map(|r| r.id), Some(high.id));
}

#[tokio::test]
async fn test_memory_store_contract() {
    exercise(&MemoryStore::new()).await;
    latest_tie_break(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_store_contract() {
    let (_dir, store) = sqlite_store().await;
    exercise(&store).await;
    latest_tie_break(&store).await;
}

#[tokio::test]
async fn test_sqlite_round_trips_payload_and_timestamp() {
    let (_dir, store) = sqlite_store().await;
    let record = Record::with_timestamp(
        5,
        Utc.timestamp_micros(1_712_345_678_123_456).unwrap(),
        vec![0x89, b'P', b'N', b'G', 0, 1, 2, 255],
    );
    store.insert(record.clone()).await.unwrap();

    assert_eq!(store.scan(5).await.unwrap(), vec![record]);
}

#[tokio::test]
async fn test_sqlite_tables_visible_across_connections() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        database_url: format!("sqlite://{}", dir.path().join("shared.db").display()),
        max_connections: 1,
    };

    let writer = SqliteStore::connect(&config).await.unwrap();
    let reader = SqliteStore::connect(&config).await.unwrap();

    writer.insert(record_at(4, 1)).await.unwrap();
    assert_eq!(reader.list_sources().await.unwrap(), vec![4]);
    assert_eq!(reader.scan(4).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failing_memory_source() {
    let store = MemoryStore::new();
    store.insert(record_at(1, 1)).await.unwrap();
    store.fail_source(1);

    assert!(matches!(store.scan(1).await, Err(crate::error::Error::StorageUnavailable(_))));
    assert_eq!(store.scan_count(), 1);

    store.heal_source(1);
    assert_eq!(store.scan(1).await.unwrap().len(), 1);
    assert_eq!(store.len(1), 1);
    assert_eq!(store.insert_count(), 1);
}
