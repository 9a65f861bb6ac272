//! Change Detector
//!
//! Decides, per source, whether the newest record in a scan still needs to be
//! classified. Scans are unordered, so "newest" is computed here:
//! maximum timestamp, ties broken by the highest record id.
//!
//! The last-processed watermark advances only through `mark_processed`,
//! which the dispatcher calls after a successful classification. A failed
//! classification therefore leaves the record eligible for the next cycle.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::logic::record::{Record, RecordId, SourceId};

/// Newest record of an unordered scan
pub fn newest(records: &[Record]) -> Option<&Record> {
    records.iter().max_by_key(|r| r.recency_key())
}

/// The newest record, unless it is the one already processed
pub fn detect<'a>(records: &'a [Record], last_seen: Option<&RecordId>) -> Option<&'a Record> {
    let candidate = newest(records)?;
    match last_seen {
        Some(id) if *id == candidate.id => None,
        _ => Some(candidate),
    }
}

/// What a scan tells the dispatcher about one source
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// Newest record differs from the watermark
    New(Record),
    /// Newest record was already processed
    Unchanged(Record),
    /// Table holds no records
    Empty,
}

/// Owner of the per-source last-processed watermark
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_seen: Mutex<HashMap<SourceId, RecordId>>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a scan result against the watermark.
    ///
    /// An empty table means the source was reset or removed; the watermark
    /// for it is dropped so whatever gets inserted next counts as new.
    pub fn check(&self, source_id: SourceId, records: &[Record]) -> Detection {
        let mut last_seen = self.last_seen.lock();

        if records.is_empty() {
            if last_seen.remove(&source_id).is_some() {
                log::debug!("Source {} is empty, watermark dropped", source_id);
            }
            return Detection::Empty;
        }

        match detect(records, last_seen.get(&source_id)) {
            Some(record) => Detection::New(record.clone()),
            None => match newest(records) {
                Some(record) => Detection::Unchanged(record.clone()),
                None => Detection::Empty,
            },
        }
    }

    /// Advance the watermark after `record_id` was classified
    pub fn mark_processed(&self, source_id: SourceId, record_id: RecordId) {
        self.last_seen.lock().insert(source_id, record_id);
    }

    /// Forget one source, e.g. after its table was deleted
    pub fn forget(&self, source_id: SourceId) {
        self.last_seen.lock().remove(&source_id);
    }

    pub fn forget_all(&self) {
        self.last_seen.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn last_seen(&self, source_id: SourceId) -> Option<RecordId> {
        self.last_seen.lock().get(&source_id).copied()
    }
}
