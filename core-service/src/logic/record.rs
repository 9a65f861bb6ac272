//! Record Model
//!
//! Records are produced by sources (drones), stored per-source and never
//! mutated after insert. A source's table is named `drone_<id>`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::logic::model::Label;

/// Identity of one source. Stable for the lifetime of a deployment.
pub type SourceId = u32;

/// Identity of one record inside its source's table.
pub type RecordId = Uuid;

/// Table name prefix for per-source tables
pub const TABLE_PREFIX: &str = "drone_";

static TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^drone_(\d{1,9})$").expect("table name pattern is valid")
});

/// Table name holding a source's records
pub fn table_name(source_id: SourceId) -> String {
    format!("{}{}", TABLE_PREFIX, source_id)
}

/// Parse `drone_<id>` back into a source id
pub fn parse_table_name(name: &str) -> Result<SourceId> {
    let caps = TABLE_NAME_RE
        .captures(name.trim())
        .ok_or_else(|| Error::InvalidRequest(format!("'{}' is not a source table", name)))?;

    caps[1]
        .parse()
        .map_err(|_| Error::InvalidRequest(format!("source id out of range in '{}'", name)))
}

/// One timestamped payload produced by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub source_id: SourceId,
    pub timestamp: DateTime<Utc>,
    pub payload: Vec<u8>,
}

impl Record {
    /// New record with a fresh id, stamped now
    pub fn new(source_id: SourceId, payload: Vec<u8>) -> Self {
        Self::with_timestamp(source_id, Utc::now(), payload)
    }

    pub fn with_timestamp(source_id: SourceId, timestamp: DateTime<Utc>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            timestamp,
            payload,
        }
    }

    /// Ordering key used to pick the newest record: timestamp, then id
    pub fn recency_key(&self) -> (DateTime<Utc>, RecordId) {
        (self.timestamp, self.id)
    }
}

/// Outcome of classifying one record. Produced once per dispatched record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub record_id: RecordId,
    pub source_id: SourceId,
    pub label: Label,
    pub category: Option<String>,
    /// Time from cycle start until the classification finished
    pub latency: Duration,
}

impl ClassificationResult {
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_round_trip() {
        assert_eq!(table_name(7), "drone_7");
        assert_eq!(parse_table_name("drone_7").unwrap(), 7);
        assert_eq!(parse_table_name(" drone_12 ").unwrap(), 12);
    }

    #[test]
    fn test_rejects_foreign_tables() {
        assert!(matches!(parse_table_name("imagecollection"), Err(Error::InvalidRequest(_))));
        assert!(matches!(parse_table_name("drone_"), Err(Error::InvalidRequest(_))));
        assert!(matches!(parse_table_name("drone_1; DROP"), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_new_records_get_distinct_ids() {
        let a = Record::new(1, vec![1]);
        let b = Record::new(1, vec![1]);
        assert_ne!(a.id, b.id);
        assert_eq!(a.source_id, 1);
    }
}
