//! Snapshot capture
//!
//! A snapshot is the normalized, ordered key -> value view of a record at one
//! instant. It only holds owned JSON, so later changes to the record never
//! leak into a snapshot already taken.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use super::normalize::normalize;
use crate::error::AuditResult;
use crate::models::{Auditable, Attributes, RecordStore};

/// Normalized record state
pub type Snapshot = Map<String, Value>;

/// Keys that carry store bookkeeping rather than record state
pub const BOOKKEEPING_KEYS: &[&str] = &["oldAttributes"];

/// Records currently having their relations expanded
///
/// Relation values are only read for a record that is not already being
/// expanded further up the call chain, so self-referencing schemas cannot
/// trigger unbounded relation loading. Clones share their marks: a record
/// whose `relations()` captures snapshots of related records hands those
/// captures a clone of the guard it was given.
#[derive(Debug, Clone, Default)]
pub struct ExpansionGuard {
    expanding: Arc<Mutex<HashSet<(String, String)>>>,
}

impl ExpansionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a record as being expanded; false if it already is
    pub fn enter<R: Auditable>(&self, record: &R) -> bool {
        self.marks().insert(Self::key_of(record))
    }

    /// Clear the expansion mark for a record
    pub fn leave<R: Auditable>(&self, record: &R) {
        self.marks().remove(&Self::key_of(record));
    }

    pub fn is_expanding<R: Auditable>(&self, record: &R) -> bool {
        self.marks().contains(&Self::key_of(record))
    }

    fn marks(&self) -> MutexGuard<'_, HashSet<(String, String)>> {
        self.expanding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_of<R: Auditable>(record: &R) -> (String, String) {
        (
            record.entity_key().to_string(),
            record.primary_key().to_string(),
        )
    }
}

/// Builds snapshots of audited records
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotBuilder {
    include_relations: bool,
}

impl SnapshotBuilder {
    pub fn new(include_relations: bool) -> Self {
        Self { include_relations }
    }

    /// Capture a record's current in-memory state
    ///
    /// Attributes come first, then relations (when enabled and the record is
    /// not already being expanded), then `virtual_attributes`, which win on
    /// collisions.
    pub fn capture<R: Auditable>(
        &self,
        record: &R,
        virtual_attributes: &Attributes,
        guard: &ExpansionGuard,
    ) -> Snapshot {
        let mut source = record.attributes();

        if self.include_relations && guard.enter(record) {
            source.merge(&record.relations());
            guard.leave(record);
        }

        source.merge(virtual_attributes);
        Self::from_attributes(&source)
    }

    /// Re-read the record from the store, then capture it
    ///
    /// Records that were never persisted are captured as they are.
    pub fn capture_fresh<R, S>(
        &self,
        store: &S,
        record: &mut R,
        virtual_attributes: &Attributes,
        guard: &ExpansionGuard,
    ) -> AuditResult<Snapshot>
    where
        R: Auditable,
        S: RecordStore<R> + ?Sized,
    {
        if !record.is_new_record() {
            store.refresh(record)?;
        }
        Ok(self.capture(record, virtual_attributes, guard))
    }

    /// Normalize an explicitly supplied attribute set
    pub fn from_attributes(attributes: &Attributes) -> Snapshot {
        attributes
            .iter()
            .filter(|(name, _)| !BOOKKEEPING_KEYS.contains(name))
            .map(|(name, value)| (name.to_string(), normalize(value)))
            .collect()
    }
}
