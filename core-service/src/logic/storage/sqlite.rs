//! SQLite record store.
//!
//! One table per source, `drone_<id>`, created on first insert. Timestamps
//! are stored as integer microseconds so the storage-side `latest` query
//! orders exactly like the in-process detector (timestamp, then id bytes).

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use super::RecordStore;
use crate::error::{Error, Result};
use crate::logic::config::StoreConfig;
use crate::logic::record::{parse_table_name, table_name, Record, SourceId};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    pool: SqlitePool,
    /// Tables already known to exist, saves a `sqlite_master` lookup per call
    known_tables: RwLock<HashSet<SourceId>>,
}

impl SqliteStore {
    /// Open (or create) the database behind `config.database_url`
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        log::info!("Record store connected: {}", config.database_url);

        Ok(Self {
            pool,
            known_tables: RwLock::new(HashSet::new()),
        })
    }

    async fn ensure_table(&self, source_id: SourceId) -> Result<()> {
        if self.known_tables.read().contains(&source_id) {
            return Ok(());
        }

        let table = table_name(source_id);
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id BLOB PRIMARY KEY,
                source_id INTEGER NOT NULL,
                ts_micros INTEGER NOT NULL,
                payload BLOB NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_ts ON {table}(ts_micros, id)"
        ))
        .execute(&self.pool)
        .await?;

        log::debug!("Table {} ready", table);
        self.known_tables.write().insert(source_id);
        Ok(())
    }

    async fn has_table(&self, source_id: SourceId) -> Result<bool> {
        if self.known_tables.read().contains(&source_id) {
            return Ok(true);
        }

        let row = sqlx::query("SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table_name(source_id))
            .fetch_one(&self.pool)
            .await?;
        let exists = row.try_get::<i64, _>("n")? > 0;

        if exists {
            self.known_tables.write().insert(source_id);
        }
        Ok(exists)
    }
}

fn decode_row(row: &SqliteRow) -> Result<Record> {
    let id: Uuid = row.try_get("id")?;
    let source_id: i64 = row.try_get("source_id")?;
    let ts_micros: i64 = row.try_get("ts_micros")?;
    let payload: Vec<u8> = row.try_get("payload")?;

    let timestamp = DateTime::<Utc>::from_timestamp_micros(ts_micros).ok_or_else(|| {
        Error::StorageUnavailable(format!("record {} has an invalid timestamp {}", id, ts_micros))
    })?;
    let source_id = SourceId::try_from(source_id)
        .map_err(|_| Error::StorageUnavailable(format!("record {} has source id {}", id, source_id)))?;

    Ok(Record {
        id,
        source_id,
        timestamp,
        payload,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, record: Record) -> Result<()> {
        self.ensure_table(record.source_id).await?;

        sqlx::query(&format!(
            "INSERT INTO {} (id, source_id, ts_micros, payload) VALUES (?, ?, ?, ?)",
            table_name(record.source_id)
        ))
        .bind(record.id)
        .bind(i64::from(record.source_id))
        .bind(record.timestamp.timestamp_micros())
        .bind(&record.payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn scan(&self, source_id: SourceId) -> Result<Vec<Record>> {
        if !self.has_table(source_id).await? {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT id, source_id, ts_micros, payload FROM {}",
            table_name(source_id)
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_row).collect()
    }

    async fn truncate(&self, source_id: SourceId) -> Result<()> {
        self.ensure_table(source_id).await?;

        // SQLite has no TRUNCATE; an unqualified DELETE takes the truncate fast path
        sqlx::query(&format!("DELETE FROM {}", table_name(source_id)))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_by_source(&self, source_id: SourceId) -> Result<u64> {
        if !self.has_table(source_id).await? {
            return Ok(0);
        }

        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE source_id = ?",
            table_name(source_id)
        ))
        .bind(i64::from(source_id))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_sources(&self) -> Result<Vec<SourceId>> {
        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'drone_%'")
            .fetch_all(&self.pool)
            .await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name")?;
            if let Ok(id) = parse_table_name(&name) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    async fn latest(&self, source_id: SourceId) -> Result<Option<Record>> {
        if !self.has_table(source_id).await? {
            return Ok(None);
        }

        let row = sqlx::query(&format!(
            "SELECT id, source_id, ts_micros, payload FROM {} ORDER BY ts_micros DESC, id DESC LIMIT 1",
            table_name(source_id)
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_row).transpose()
    }
}
