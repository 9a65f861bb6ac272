//! In-memory record store.
//!
//! Tables live in a `HashMap` guarded by a `parking_lot` lock; every trait
//! call takes the lock once, which gives the same per-operation atomicity a
//! real store offers. Sources can be marked as failing to exercise the
//! dispatcher's error isolation, or given a slow insert path.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::RecordStore;
use crate::error::{Error, Result};
use crate::logic::record::{table_name, Record, SourceId};

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<SourceId, Vec<Record>>>,
    failing: RwLock<HashSet<SourceId>>,
    insert_delays: RwLock<HashMap<SourceId, Duration>>,
    scans: AtomicU64,
    inserts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `source_id` fail with `StorageUnavailable`
    pub fn fail_source(&self, source_id: SourceId) {
        self.failing.write().insert(source_id);
    }

    pub fn heal_source(&self, source_id: SourceId) {
        self.failing.write().remove(&source_id);
    }

    /// Every insert into `source_id` takes `delay` before it lands
    pub fn delay_inserts(&self, source_id: SourceId, delay: Duration) {
        self.insert_delays.write().insert(source_id, delay);
    }

    /// Number of scans served so far
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn insert_count(&self) -> u64 {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Rows currently held for the source
    pub fn len(&self, source_id: SourceId) -> usize {
        self.tables.read().get(&source_id).map(Vec::len).unwrap_or(0)
    }

    fn check(&self, source_id: SourceId) -> Result<()> {
        if self.failing.read().contains(&source_id) {
            return Err(Error::StorageUnavailable(format!(
                "{} is unreachable",
                table_name(source_id)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: Record) -> Result<()> {
        let delay = self.insert_delays.read().get(&record.source_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.check(record.source_id)?;
        self.tables.write().entry(record.source_id).or_default().push(record);
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn scan(&self, source_id: SourceId) -> Result<Vec<Record>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.check(source_id)?;
        Ok(self.tables.read().get(&source_id).cloned().unwrap_or_default())
    }

    async fn truncate(&self, source_id: SourceId) -> Result<()> {
        self.check(source_id)?;
        self.tables.write().entry(source_id).or_default().clear();
        Ok(())
    }

    async fn delete_by_source(&self, source_id: SourceId) -> Result<u64> {
        self.check(source_id)?;
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(&source_id) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| r.source_id != source_id);
        Ok((before - rows.len()) as u64)
    }

    async fn list_sources(&self) -> Result<Vec<SourceId>> {
        let mut ids: Vec<SourceId> = self.tables.read().keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
