//! Storage layer for changeslog
//!
//! Provides the JSON record store (atomic writes, automatic directory
//! creation) and the append-only change log side by side.

pub mod file_io;
pub mod records;

pub use file_io::{read_json, write_json_atomic};
pub use records::RecordRepository;

use crate::audit::JsonlLogStore;
use crate::config::paths::ChangeslogPaths;
use crate::error::AuditError;

/// Main storage coordinator
pub struct Storage {
    paths: ChangeslogPaths,
    pub records: RecordRepository,
    pub log: JsonlLogStore,
}

impl Storage {
    /// Create a new Storage instance
    pub fn new(paths: ChangeslogPaths) -> Result<Self, AuditError> {
        paths.ensure_directories()?;

        Ok(Self {
            records: RecordRepository::new(paths.records_file()),
            log: JsonlLogStore::new(paths.log_file()),
            paths,
        })
    }

    /// Get the paths configuration
    pub fn paths(&self) -> &ChangeslogPaths {
        &self.paths
    }

    /// Load all data from disk
    pub fn load_all(&mut self) -> Result<(), AuditError> {
        self.records.load()
    }

    /// Save all data to disk
    pub fn save_all(&self) -> Result<(), AuditError> {
        self.records.save()
    }

    /// Check if storage has been initialized (has any data)
    pub fn is_initialized(&self) -> bool {
        self.paths.settings_file().exists()
    }
}
