//! Snapshot record stores
//!
//! Storage is owned by the host; the recorder only needs somewhere to insert
//! records, list the newest ones, and drop the expired ones.

mod jsonl;
mod memory;

pub use jsonl::JsonlRecordStore;
pub use memory::MemoryRecordStore;

use chrono::{DateTime, Utc};

use crate::error::MonitorError;
use crate::types::StoredRecord;

/// Trait for local snapshot stores
pub trait RecordStore {
    /// Persist a new record
    fn insert(&mut self, record: StoredRecord) -> Result<(), MonitorError>;

    /// Up to `limit` records, newest first
    fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>, MonitorError>;

    /// Delete every record with a timestamp before `cutoff`, returning how many were removed
    fn remove_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<usize, MonitorError>;

    /// Number of stored records
    fn len(&self) -> Result<usize, MonitorError>;

    fn is_empty(&self) -> Result<bool, MonitorError> {
        Ok(self.len()? == 0)
    }
}

/// Sort newest first and truncate, shared by the store implementations
fn newest_first(mut records: Vec<StoredRecord>, limit: usize) -> Vec<StoredRecord> {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records.truncate(limit);
    records
}
