//! Append-only JSON-lines log of cost-metric records.
//!
//! The offline trainer reads this file to fit new predictor artifacts.

use std::fs::{create_dir_all, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::core::{CostMetricRecord, SchedulerError};

/// File-backed cost-metric log, one JSON record per line.
pub struct JsonlMetricLog {
    path: PathBuf,
    write: Mutex<()>,
}

impl JsonlMetricLog {
    /// Open (or prepare to create) the log at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Store` if the parent directory cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|e| SchedulerError::Store(e.to_string()))?;
        }
        Ok(Self {
            path,
            write: Mutex::new(()),
        })
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Store` on serialization or I/O failure.
    pub fn append(&self, record: &CostMetricRecord) -> Result<(), SchedulerError> {
        let line = serde_json::to_string(record).map_err(|e| SchedulerError::Store(e.to_string()))?;
        let _guard = self.write.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SchedulerError::Store(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| SchedulerError::Store(e.to_string()))
    }

    /// Read every record in file order. A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Store` on I/O failure or a malformed line.
    pub fn read_all(&self) -> Result<Vec<CostMetricRecord>, SchedulerError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .map_err(|e| SchedulerError::Store(e.to_string()))?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| SchedulerError::Store(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record =
                serde_json::from_str(&line).map_err(|e| SchedulerError::Store(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(batch_id: u64) -> CostMetricRecord {
        CostMetricRecord {
            batch_id,
            batch_size: 23,
            total_volume: 460.0,
            processing_secs: 9.7,
            cost_per_item: 0.0093,
            recorded_at_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_append_then_read_all() {
        let dir = std::env::temp_dir().join(format!("metric_log_{}", uuid::Uuid::new_v4()));
        let log = JsonlMetricLog::open(dir.join("metrics.jsonl")).unwrap();
        assert!(log.read_all().unwrap().is_empty());

        log.append(&record(1)).unwrap();
        log.append(&record(2)).unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].batch_id, 1);
        assert_eq!(records[1], record(2));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let dir = std::env::temp_dir().join(format!("metric_log_{}", uuid::Uuid::new_v4()));
        let log = JsonlMetricLog::open(dir.join("metrics.jsonl")).unwrap();
        std::fs::write(log.path(), "not json\n").unwrap();

        assert!(matches!(log.read_all(), Err(SchedulerError::Store(_))));

        let _ = std::fs::remove_dir_all(dir);
    }
}
