//! Newline-delimited JSON file store
//!
//! Inserts append one line per record. Pruning rewrites the file through a
//! sibling temporary file so a crash mid-prune leaves the old file intact.

use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::{newest_first, RecordStore};
use crate::error::MonitorError;
use crate::types::StoredRecord;

/// File-backed store holding one JSON record per line
#[derive(Debug, Clone)]
pub struct JsonlRecordStore {
    path: PathBuf,
}

impl JsonlRecordStore {
    /// Open a store at `path`; the file is created on first insert
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_all(&self) -> Result<Vec<StoredRecord>, MonitorError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: StoredRecord = serde_json::from_str(&line).map_err(|e| {
                MonitorError::StorageError(format!(
                    "{}:{}: {}",
                    self.path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            records.push(record);
        }

        Ok(records)
    }
}

impl RecordStore for JsonlRecordStore {
    fn insert(&mut self, record: StoredRecord) -> Result<(), MonitorError> {
        let line = serde_json::to_string(&record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>, MonitorError> {
        Ok(newest_first(self.load_all()?, limit))
    }

    fn remove_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<usize, MonitorError> {
        let records = self.load_all()?;
        let before = records.len();
        let kept: Vec<StoredRecord> = records
            .into_iter()
            .filter(|r| r.timestamp >= cutoff)
            .collect();
        let removed = before - kept.len();

        if removed == 0 {
            return Ok(0);
        }

        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for record in &kept {
                writeln!(tmp, "{}", serde_json::to_string(record)?)?;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        Ok(removed)
    }

    fn len(&self) -> Result<usize, MonitorError> {
        Ok(self.load_all()?.len())
    }
}
