//! In-memory record store

use chrono::{DateTime, Utc};

use super::{newest_first, RecordStore};
use crate::error::MonitorError;
use crate::types::StoredRecord;

/// Vec-backed store, for tests and hosts that persist elsewhere
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Vec<StoredRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[StoredRecord] {
        &self.records
    }
}

impl RecordStore for MemoryRecordStore {
    fn insert(&mut self, record: StoredRecord) -> Result<(), MonitorError> {
        self.records.push(record);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>, MonitorError> {
        Ok(newest_first(self.records.clone(), limit))
    }

    fn remove_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<usize, MonitorError> {
        let before = self.records.len();
        self.records.retain(|r| r.timestamp >= cutoff);
        Ok(before - self.records.len())
    }

    fn len(&self) -> Result<usize, MonitorError> {
        Ok(self.records.len())
    }
}
