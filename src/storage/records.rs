//! Record repository for JSON storage
//!
//! Keeps schema-less records in records.json, keyed by entity key and primary
//! key.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuditError;
use crate::models::{DynamicRecord, PrimaryKey, RecordStore};

use super::file_io::{read_json, write_json_atomic};

/// Serializable record data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RecordData {
    records: Vec<DynamicRecord>,
}

type RecordKey = (String, String);

fn key_of(entity_key: &str, id: &PrimaryKey) -> RecordKey {
    (entity_key.to_string(), id.to_string())
}

/// Repository for record persistence
pub struct RecordRepository {
    path: PathBuf,
    data: RwLock<HashMap<RecordKey, DynamicRecord>>,
}

impl RecordRepository {
    /// Create a new record repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Load records from disk
    pub fn load(&self) -> Result<(), AuditError> {
        let file_data: RecordData = read_json(&self.path)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.clear();
        for record in file_data.records {
            data.insert(key_of(&record.entity_key, &record.id), record);
        }

        debug!(count = data.len(), path = %self.path.display(), "Loaded records");
        Ok(())
    }

    /// Save records to disk
    pub fn save(&self) -> Result<(), AuditError> {
        let data = self
            .data
            .read()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut records: Vec<_> = data.values().cloned().collect();
        records.sort_by(|a, b| {
            a.entity_key
                .cmp(&b.entity_key)
                .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
        });

        write_json_atomic(&self.path, &RecordData { records })
    }

    /// Get a record by entity key and primary key
    pub fn get(&self, entity_key: &str, id: &PrimaryKey) -> Result<Option<DynamicRecord>, AuditError> {
        let data = self
            .data
            .read()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.get(&key_of(entity_key, id)).cloned())
    }

    /// Insert or update a record
    pub fn upsert(&self, mut record: DynamicRecord) -> Result<(), AuditError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        record.mark_persisted();
        data.insert(key_of(&record.entity_key, &record.id), record);
        Ok(())
    }

    /// Delete a record
    pub fn delete(&self, entity_key: &str, id: &PrimaryKey) -> Result<bool, AuditError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        Ok(data.remove(&key_of(entity_key, id)).is_some())
    }

    /// Count records
    pub fn count(&self) -> Result<usize, AuditError> {
        let data = self
            .data
            .read()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(data.len())
    }
}

impl RecordStore<DynamicRecord> for RecordRepository {
    /// Re-reads the record from the file on disk, so only saved state is seen
    fn refresh(&self, record: &mut DynamicRecord) -> Result<(), AuditError> {
        let file_data: RecordData = read_json(&self.path)?;

        let stored = file_data
            .records
            .into_iter()
            .find(|r| r.entity_key == record.entity_key && r.id == record.id)
            .ok_or_else(|| AuditError::record_not_found(&record.entity_key, record.id.to_string()))?;

        record.attributes = stored.attributes;
        record.relations = stored.relations;
        Ok(())
    }
}
