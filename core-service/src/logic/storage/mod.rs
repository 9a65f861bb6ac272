//! Record Store - per-source append-only tables
//!
//! The store is an external collaborator. It guarantees per-operation
//! atomicity only: a scan may observe a table mid-update and returns rows in
//! no particular order.
//!
//! # Implementations
//! - `memory.rs`: in-process tables, used by tests and single-process demos
//! - `sqlite.rs`: `drone_<id>` tables in a SQLite file shared between processes

pub mod memory;
pub mod sqlite;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::logic::detector;
use crate::logic::record::{Record, SourceId};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Shared handle to whichever store the process was configured with
pub type SharedStore = Arc<dyn RecordStore>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a record to its source's table
    async fn insert(&self, record: Record) -> Result<()>;

    /// Every record of the source, unordered
    async fn scan(&self, source_id: SourceId) -> Result<Vec<Record>>;

    /// Remove every row of the source's table
    async fn truncate(&self, source_id: SourceId) -> Result<()>;

    /// Delete the source's records, returning how many were removed
    async fn delete_by_source(&self, source_id: SourceId) -> Result<u64>;

    /// Sources that currently have a table, ascending
    async fn list_sources(&self) -> Result<Vec<SourceId>>;

    /// Newest record of the source using the same ordering as the detector.
    ///
    /// Stores with an index override this; the default scans.
    async fn latest(&self, source_id: SourceId) -> Result<Option<Record>> {
        let records = self.scan(source_id).await?;
        Ok(detector::newest(&records).cloned())
    }
}
