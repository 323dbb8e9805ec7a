//! Append-only log stores
//!
//! `LogSink` is the only write path the recorder sees: append one entry,
//! nothing else. `JsonlLogStore` keeps entries as line-delimited JSON and
//! also provides the read-side queries; `MemoryLogStore` keeps them in
//! process.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::RwLock;

use tracing::debug;

use crate::error::{AuditError, AuditResult};
use crate::models::PrimaryKey;

use super::entry::LogEntry;

/// Destination for new log entries
pub trait LogSink {
    /// Append an entry
    fn save_log_entry(&self, entry: &LogEntry) -> AuditResult<()>;
}

/// Line-delimited JSON log file
///
/// Each line is a complete JSON object representing one entry.
pub struct JsonlLogStore {
    log_path: PathBuf,
}

impl JsonlLogStore {
    /// Create a store that writes to the specified path
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Read all entries, oldest first
    pub fn read_all(&self) -> AuditResult<Vec<LogEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| AuditError::Io(format!("Failed to open change log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                AuditError::Io(format!("Failed to read change log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: LogEntry = serde_json::from_str(&line).map_err(|e| {
                AuditError::Json(format!(
                    "Failed to parse log entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            entries.push(entry);
        }

        Ok(entries)
    }

    /// Read the most recent N entries
    pub fn read_recent(&self, count: usize) -> AuditResult<Vec<LogEntry>> {
        let all_entries = self.read_all()?;
        let start = all_entries.len().saturating_sub(count);
        Ok(all_entries[start..].to_vec())
    }

    /// All entries about one record, oldest first
    pub fn for_entity(&self, entity_key: &str, entity_id: &PrimaryKey) -> AuditResult<Vec<LogEntry>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.entity_key == entity_key && &e.entity_id == entity_id)
            .collect())
    }

    /// Distinct entity keys present in the log, ascending
    pub fn entity_keys(&self) -> AuditResult<Vec<String>> {
        let keys: BTreeSet<String> = self
            .read_all()?
            .into_iter()
            .map(|e| e.entity_key)
            .collect();
        Ok(keys.into_iter().collect())
    }

    /// Get the number of entries in the log
    pub fn entry_count(&self) -> AuditResult<usize> {
        if !self.log_path.exists() {
            return Ok(0);
        }

        let file = File::open(&self.log_path)
            .map_err(|e| AuditError::Io(format!("Failed to open change log: {}", e)))?;

        let reader = BufReader::new(file);
        let count = reader
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .count();

        Ok(count)
    }

    /// Check if the log file exists
    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }

    /// Get the path to the log file
    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

impl LogSink for JsonlLogStore {
    /// Appends the entry as a JSON line and flushes immediately
    fn save_log_entry(&self, entry: &LogEntry) -> AuditResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| AuditError::Persistence(format!("Failed to open change log: {}", e)))?;

        let json = serde_json::to_string(entry)
            .map_err(|e| AuditError::Json(format!("Failed to serialize log entry: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| AuditError::Persistence(format!("Failed to write log entry: {}", e)))?;

        file.flush()
            .map_err(|e| AuditError::Persistence(format!("Failed to flush change log: {}", e)))?;

        debug!(id = %entry.id, path = %self.log_path.display(), "Appended log entry");
        Ok(())
    }
}

/// In-process log store
#[derive(Default)]
pub struct MemoryLogStore {
    entries: RwLock<Vec<LogEntry>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl LogSink for MemoryLogStore {
    fn save_log_entry(&self, entry: &LogEntry) -> AuditResult<()> {
        let mut entries = self.entries.write().map_err(|e| {
            AuditError::Persistence(format!("Failed to acquire write lock: {}", e))
        })?;
        entries.push(entry.clone());
        Ok(())
    }
}
