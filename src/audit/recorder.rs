//! Change recording lifecycle
//!
//! One `AuditRecorder` follows one record through one mutation:
//!
//! ```text
//! Idle -> CapturedBefore -> CapturedAfter | Deleted -> Logged | Skipped
//! ```
//!
//! The before-snapshot is taken when the record is loaded (if the request
//! gate allows it). After a save or delete the after-snapshot is taken, the
//! two are diffed, the result is redacted and clipped, and a `LogEntry` is
//! appended when anything is left. Logging never fails the mutation: every
//! problem on this path ends up in the returned `RecordOutcome`.

use std::net::IpAddr;

use tracing::{debug, info, warn};

use super::diff::DiffEngine;
use super::entry::{resolve_ip, LogEntry, Title};
use super::finalize::Finalizer;
use super::gate::{CaptureGate, RequestContext};
use super::logger::LogSink;
use super::normalize::normalize;
use super::snapshot::{ExpansionGuard, Snapshot, SnapshotBuilder};
use crate::config::{audit::validate_attribute_name, AuditConfig};
use crate::error::{AuditError, AuditResult};
use crate::models::{AttributeValue, Attributes, Auditable, RecordStore};

/// Where the recorder is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    CapturedBefore,
    CapturedAfter,
    Deleted,
    Logged,
    Skipped,
}

/// Why no entry was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing loggable changed
    NoChanges,
    /// The configured trigger returned false
    TriggerVetoed,
}

/// Result of finishing a save or delete
#[derive(Debug)]
pub enum RecordOutcome {
    Logged(LogEntry),
    Skipped(SkipReason),
    /// The entry (or the fresh read before it) could not be completed
    Failed(AuditError),
}

impl RecordOutcome {
    pub fn is_logged(&self) -> bool {
        matches!(self, RecordOutcome::Logged(_))
    }

    pub fn entry(&self) -> Option<&LogEntry> {
        match self {
            RecordOutcome::Logged(entry) => Some(entry),
            _ => None,
        }
    }
}

/// Tracks one record mutation and writes its log entry
pub struct AuditRecorder {
    config: AuditConfig,
    builder: SnapshotBuilder,
    engine: DiffEngine,
    finalizer: Finalizer,
    state: RecorderState,
    before: Option<Snapshot>,
    custom_attributes: Attributes,
    client_ip: Option<IpAddr>,
    guard: ExpansionGuard,
}

impl AuditRecorder {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            builder: SnapshotBuilder::new(config.include_relations),
            engine: DiffEngine::new(config.equality),
            finalizer: Finalizer::new(config.denylist.clone(), config.truncation_limit),
            custom_attributes: config.custom_attributes.clone(),
            config,
            state: RecorderState::Idle,
            before: None,
            client_ip: None,
            guard: ExpansionGuard::new(),
        }
    }

    /// Share relation-expansion marks with other recorders
    pub fn with_expansion_guard(mut self, guard: ExpansionGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// The before-snapshot, if one was captured
    pub fn before_snapshot(&self) -> Option<&Snapshot> {
        self.before.as_ref()
    }

    /// Set the address recorded on the entry
    pub fn set_client_ip(&mut self, ip: IpAddr) {
        self.client_ip = Some(ip);
    }

    /// Handle a "record loaded" event
    ///
    /// Captures the before-snapshot when `gate` allows it for `ctx`.
    /// Returns whether a snapshot was taken.
    pub fn on_loaded<R: Auditable>(
        &mut self,
        record: &R,
        ctx: &RequestContext,
        gate: &dyn CaptureGate,
    ) -> bool {
        if let Some(ip) = ctx.client_ip {
            self.client_ip = Some(ip);
        }

        if !gate.should_capture(ctx) {
            debug!(route = %ctx.route, "Capture bypassed for route");
            return false;
        }

        self.capture_before(record);
        true
    }

    /// Capture the before-snapshot unconditionally
    pub fn capture_before<R: Auditable>(&mut self, record: &R) {
        let snapshot = self
            .builder
            .capture(record, &Attributes::new(), &self.guard);

        debug!(
            entity_key = record.entity_key(),
            entity_id = %record.primary_key(),
            fields = snapshot.len(),
            "Captured before-snapshot"
        );

        self.before = Some(snapshot);
        self.state = RecorderState::CapturedBefore;
    }

    /// Capture the before-snapshot from attributes read before the mutation
    ///
    /// For callers that hold the prior state separately from the record.
    pub fn capture_before_from(&mut self, attributes: &Attributes) {
        let snapshot = SnapshotBuilder::from_attributes(attributes);
        debug!(fields = snapshot.len(), "Captured before-snapshot from attributes");

        self.before = Some(snapshot);
        self.state = RecorderState::CapturedBefore;
    }

    /// Log an attribute the record itself does not have
    ///
    /// `old` is added to the before-snapshot and `new` to the after-snapshot;
    /// a `None` side is left out.
    ///
    /// # Errors
    ///
    /// Fails if the name is blank or reserved.
    pub fn add_to_compare(
        &mut self,
        name: &str,
        old: Option<AttributeValue>,
        new: Option<AttributeValue>,
    ) -> AuditResult<()> {
        validate_attribute_name(name)?;

        if let Some(old) = old {
            self.before
                .get_or_insert_with(Snapshot::new)
                .insert(name.to_string(), normalize(&old));
        }

        if let Some(new) = new {
            self.custom_attributes.insert(name, new);
        }

        Ok(())
    }

    /// Handle a successful save, logging it as an update
    pub fn after_save<R, S>(&mut self, store: &S, record: &mut R, sink: &dyn LogSink) -> RecordOutcome
    where
        R: Auditable,
        S: RecordStore<R> + ?Sized,
    {
        self.after_save_as(store, record, sink, Title::Update)
    }

    /// Handle a successful save with a caller-chosen title
    ///
    /// The title is replaced by `Create` when no before-snapshot exists.
    pub fn after_save_as<R, S>(
        &mut self,
        store: &S,
        record: &mut R,
        sink: &dyn LogSink,
        title: Title,
    ) -> RecordOutcome
    where
        R: Auditable,
        S: RecordStore<R> + ?Sized,
    {
        if !self.config.trigger_allows() {
            return self.skip(SkipReason::TriggerVetoed);
        }

        let after = match self.builder.capture_fresh(
            store,
            record,
            &self.custom_attributes,
            &self.guard,
        ) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    entity_key = record.entity_key(),
                    entity_id = %record.primary_key(),
                    error = %e,
                    "Failed to re-read record for after-snapshot"
                );
                return RecordOutcome::Failed(e);
            }
        };

        self.state = RecorderState::CapturedAfter;
        self.complete(record, after, title, sink)
    }

    /// Handle a successful delete
    pub fn after_delete<R: Auditable>(&mut self, record: &R, sink: &dyn LogSink) -> RecordOutcome {
        if !self.config.trigger_allows() {
            return self.skip(SkipReason::TriggerVetoed);
        }

        self.state = RecorderState::Deleted;
        self.complete(record, Snapshot::new(), Title::Delete, sink)
    }

    fn complete<R: Auditable>(
        &mut self,
        record: &R,
        after: Snapshot,
        title: Title,
        sink: &dyn LogSink,
    ) -> RecordOutcome {
        let empty = Snapshot::new();
        let before = self.before.as_ref().unwrap_or(&empty);

        let diff = self.engine.diff(before, &after);
        debug!(
            entity_key = record.entity_key(),
            changed = diff.len(),
            "Computed snapshot diff"
        );

        let Some(message) = self.finalizer.finalize(&diff, before, &after) else {
            return self.skip(SkipReason::NoChanges);
        };

        let title = if before.is_empty() { Title::Create } else { title };
        let ip = resolve_ip(self.client_ip, self.config.default_client_ip);

        let entry = LogEntry::new(
            title,
            record.entity_key(),
            record.primary_key(),
            Some(message.old_json()),
            Some(message.new_json()),
            ip,
        );

        match sink.save_log_entry(&entry) {
            Ok(()) => {
                info!(
                    id = %entry.id,
                    title = %entry.title,
                    entity_key = %entry.entity_key,
                    entity_id = %entry.entity_id,
                    fields = message.new.len(),
                    "Logged record change"
                );
                self.state = RecorderState::Logged;
                RecordOutcome::Logged(entry)
            }
            Err(e) => {
                warn!(
                    entity_key = %entry.entity_key,
                    entity_id = %entry.entity_id,
                    error = %e,
                    "Failed to save log entry"
                );
                RecordOutcome::Failed(e)
            }
        }
    }

    fn skip(&mut self, reason: SkipReason) -> RecordOutcome {
        debug!(?reason, "Skipped log entry");
        self.state = RecorderState::Skipped;
        RecordOutcome::Skipped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::gate::ActionGate;
    use crate::audit::logger::MemoryLogStore;
    use crate::models::{DynamicRecord, PrimaryKey, RelatedKeys};
    use crate::config::EqualityPolicy;
    use serde_json::{json, Value};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Store holding the durable copy of each record
    #[derive(Default)]
    struct TestStore {
        durable: RefCell<HashMap<String, DynamicRecord>>,
    }

    impl TestStore {
        fn persist(&self, record: &DynamicRecord) {
            self.durable
                .borrow_mut()
                .insert(record.id.to_string(), record.clone());
        }
    }

    impl RecordStore<DynamicRecord> for TestStore {
        fn refresh(&self, record: &mut DynamicRecord) -> AuditResult<()> {
            let durable = self.durable.borrow();
            let stored = durable
                .get(&record.id.to_string())
                .ok_or_else(|| AuditError::record_not_found(&record.entity_key, record.id.to_string()))?;
            record.attributes = stored.attributes.clone();
            record.relations = stored.relations.clone();
            Ok(())
        }
    }

    struct CountingSink {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSink {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl LogSink for CountingSink {
        fn save_log_entry(&self, _entry: &LogEntry) -> AuditResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AuditError::Persistence("constraint violation".into()))
            } else {
                Ok(())
            }
        }
    }

    fn alice() -> DynamicRecord {
        let mut record = DynamicRecord::new("User", 1)
            .with_attribute("name", "Alice")
            .with_attribute("age", 30);
        record.mark_persisted();
        record
    }

    fn update_ctx() -> RequestContext {
        RequestContext::new("user/update")
    }

    #[test]
    fn test_create_logs_all_fields() {
        let store = TestStore::default();
        let sink = MemoryLogStore::new();
        let mut recorder = AuditRecorder::new(AuditConfig::default());

        let mut record = DynamicRecord::new("User", 1)
            .with_attribute("name", "Alice")
            .with_attribute("age", 30);
        store.persist(&record);

        let outcome = recorder.after_save(&store, &mut record, &sink);
        let entry = outcome.entry().unwrap();

        assert_eq!(entry.title, Title::Create);
        assert_eq!(entry.new_message.as_deref(), Some(r#"{"name":"Alice","age":30}"#));
        assert_eq!(entry.old_message.as_deref(), Some(r#"{"name":"","age":""}"#));
        assert_eq!(recorder.state(), RecorderState::Logged);
        assert_eq!(sink.entries().len(), 1);
    }

    #[test]
    fn test_update_logs_changed_field_only() {
        let store = TestStore::default();
        let sink = MemoryLogStore::new();
        let mut record = alice();
        store.persist(&record);

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        assert!(recorder.on_loaded(&record, &update_ctx(), &ActionGate::default()));
        assert_eq!(recorder.state(), RecorderState::CapturedBefore);

        record.set("age", 31);
        store.persist(&record);

        let entry = recorder
            .after_save(&store, &mut record, &sink)
            .entry()
            .cloned()
            .unwrap();

        assert_eq!(entry.title, Title::Update);
        assert_eq!(entry.old_message.as_deref(), Some(r#"{"age":30}"#));
        assert_eq!(entry.new_message.as_deref(), Some(r#"{"age":31}"#));
        assert_eq!(entry.entity_key, "User");
        assert_eq!(entry.entity_id, PrimaryKey::Int(1));
    }

    #[test]
    fn test_after_snapshot_reflects_durable_state() {
        let store = TestStore::default();
        let sink = MemoryLogStore::new();
        let mut record = alice();
        store.persist(&record);

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        recorder.capture_before(&record);

        // The store fills in a column the caller never set locally
        let mut durable = record.clone();
        durable.set("updated_at", "2026-10-19");
        store.persist(&durable);

        let outcome = recorder.after_save(&store, &mut record, &sink);
        let entry = outcome.entry().unwrap();
        assert_eq!(entry.new_message.as_deref(), Some(r#"{"updated_at":"2026-10-19"}"#));
    }

    #[test]
    fn test_delete_logs_everything_as_old() {
        let sink = MemoryLogStore::new();
        let record = DynamicRecord::new("User", 1).with_attribute("name", "Alice");

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        recorder.capture_before(&record);

        let outcome = recorder.after_delete(&record, &sink);
        let entry = outcome.entry().unwrap();

        assert_eq!(entry.title, Title::Delete);
        assert_eq!(entry.old_message.as_deref(), Some(r#"{"name":"Alice"}"#));
        assert_eq!(entry.new_message.as_deref(), Some(r#"{"name":""}"#));
    }

    #[test]
    fn test_no_op_never_calls_sink() {
        let store = TestStore::default();
        let sink = CountingSink::new(false);
        let mut record = alice();
        store.persist(&record);

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        recorder.capture_before(&record);

        let outcome = recorder.after_save(&store, &mut record, &sink);
        assert!(matches!(outcome, RecordOutcome::Skipped(SkipReason::NoChanges)));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.state(), RecorderState::Skipped);
    }

    #[test]
    fn test_unchanged_relation_not_logged() {
        let store = TestStore::default();
        let sink = MemoryLogStore::new();
        let mut record = alice().with_relation(
            "tags",
            RelatedKeys::Many(vec![PrimaryKey::Int(1), PrimaryKey::Int(2)]),
        );
        store.persist(&record);

        let mut recorder = AuditRecorder::new(AuditConfig::default().with_relations(true));
        recorder.capture_before(&record);
        assert!(recorder.before_snapshot().unwrap().contains_key("tags"));

        record.set("name", "Alicia");
        store.persist(&record);

        let entry = recorder
            .after_save(&store, &mut record, &sink)
            .entry()
            .cloned()
            .unwrap();
        let new = entry.new_payload();
        assert!(new.get("tags").is_none());
        assert_eq!(new.get("name"), Some(&json!("Alicia")));
    }

    #[test]
    fn test_changed_relation_logged() {
        let store = TestStore::default();
        let sink = MemoryLogStore::new();
        let mut record = alice().with_relation("tags", RelatedKeys::Many(vec![PrimaryKey::Int(1)]));
        store.persist(&record);

        let mut recorder = AuditRecorder::new(AuditConfig::default().with_relations(true));
        recorder.capture_before(&record);

        record.set_relation(
            "tags",
            RelatedKeys::Many(vec![PrimaryKey::Int(1), PrimaryKey::Int(3)]),
        );
        store.persist(&record);

        let outcome = recorder.after_save(&store, &mut record, &sink);
        let new = outcome.entry().unwrap().new_payload();
        assert_eq!(new.get("tags"), Some(&json!([1, 3])));
    }

    #[test]
    fn test_trigger_veto() {
        let store = TestStore::default();
        let sink = CountingSink::new(false);
        let mut record = alice();
        store.persist(&record);

        let mut recorder = AuditRecorder::new(AuditConfig::default().with_trigger(|| false));
        recorder.capture_before(&record);
        record.set("age", 99);
        store.persist(&record);

        let outcome = recorder.after_save(&store, &mut record, &sink);
        assert!(matches!(outcome, RecordOutcome::Skipped(SkipReason::TriggerVetoed)));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);

        let outcome = recorder.after_delete(&record, &sink);
        assert!(matches!(outcome, RecordOutcome::Skipped(SkipReason::TriggerVetoed)));
    }

    #[test]
    fn test_trigger_evaluated_at_save_time() {
        let store = TestStore::default();
        let sink = MemoryLogStore::new();
        let mut record = alice();
        store.persist(&record);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let config = AuditConfig::default().with_trigger(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        let mut recorder = AuditRecorder::new(config);
        recorder.capture_before(&record);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        record.set("age", 31);
        store.persist(&record);
        assert!(recorder.after_save(&store, &mut record, &sink).is_logged());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_persistence_failure_surfaces_as_outcome() {
        let sink = CountingSink::new(true);
        let record = alice();

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        recorder.capture_before(&record);

        let outcome = recorder.after_delete(&record, &sink);
        assert!(!outcome.is_logged());
        assert!(matches!(outcome, RecordOutcome::Failed(ref e) if e.is_persistence()));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refresh_failure_surfaces_as_outcome() {
        let store = TestStore::default();
        let sink = CountingSink::new(false);
        let mut record = alice();

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        recorder.capture_before(&record);

        let outcome = recorder.after_save(&store, &mut record, &sink);
        assert!(matches!(outcome, RecordOutcome::Failed(ref e) if e.is_not_found()));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bypassed_route_skips_capture() {
        let record = alice();
        let mut recorder = AuditRecorder::new(AuditConfig::default());

        let captured = recorder.on_loaded(
            &record,
            &RequestContext::new("user/index"),
            &ActionGate::default(),
        );

        assert!(!captured);
        assert!(recorder.before_snapshot().is_none());
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn test_add_to_compare() {
        let store = TestStore::default();
        let sink = MemoryLogStore::new();
        let mut record = alice();
        store.persist(&record);

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        recorder.capture_before(&record);
        recorder
            .add_to_compare("role", Some("editor".into()), Some("admin".into()))
            .unwrap();

        let entry = recorder
            .after_save(&store, &mut record, &sink)
            .entry()
            .cloned()
            .unwrap();
        assert_eq!(entry.old_message.as_deref(), Some(r#"{"role":"editor"}"#));
        assert_eq!(entry.new_message.as_deref(), Some(r#"{"role":"admin"}"#));
    }

    #[test]
    fn test_capture_before_from_supplied_attributes() {
        let sink = MemoryLogStore::new();
        let record = DynamicRecord::new("User", 1).with_attribute("name", "Alicia");

        let mut prior = Attributes::new();
        prior.insert("name", "Alice");
        prior.insert("oldAttributes", json!({"name": "Alice"}));

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        recorder.capture_before_from(&prior);
        assert!(!recorder.before_snapshot().unwrap().contains_key("oldAttributes"));

        let store = TestStore::default();
        let mut record = record;
        let entry = recorder
            .after_save(&store, &mut record, &sink)
            .entry()
            .cloned()
            .unwrap();
        assert_eq!(entry.title, Title::Update);
        assert_eq!(entry.old_message.as_deref(), Some(r#"{"name":"Alice"}"#));
        assert_eq!(entry.new_message.as_deref(), Some(r#"{"name":"Alicia"}"#));
    }

    #[test]
    fn test_add_to_compare_rejects_blank_name() {
        let mut recorder = AuditRecorder::new(AuditConfig::default());
        let err = recorder.add_to_compare("", Some("x".into()), None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_password_change_alone_not_logged() {
        let store = TestStore::default();
        let sink = CountingSink::new(false);
        let mut record = alice().with_attribute("password", "old-hash");
        store.persist(&record);

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        recorder.capture_before(&record);
        record.set("password", "new-hash");
        store.persist(&record);

        let outcome = recorder.after_save(&store, &mut record, &sink);
        assert!(matches!(outcome, RecordOutcome::Skipped(SkipReason::NoChanges)));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_custom_title() {
        let store = TestStore::default();
        let sink = MemoryLogStore::new();
        let mut record = alice();
        store.persist(&record);

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        recorder.capture_before(&record);
        record.set("age", 40);
        store.persist(&record);

        let outcome = recorder.after_save_as(&store, &mut record, &sink, Title::from("Approve"));
        assert_eq!(outcome.entry().unwrap().title, Title::Custom("Approve".into()));
    }

    #[test]
    fn test_client_ip_recorded() {
        let sink = MemoryLogStore::new();
        let record = alice();
        let ctx = update_ctx().with_client_ip("203.0.113.9".parse().unwrap());

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        recorder.on_loaded(&record, &ctx, &ActionGate::default());

        let outcome = recorder.after_delete(&record, &sink);
        assert_eq!(
            outcome.entry().unwrap().client_ip(),
            Some("203.0.113.9".parse().unwrap())
        );
    }

    #[test]
    fn test_default_client_ip() {
        let sink = MemoryLogStore::new();
        let record = alice();

        let mut recorder = AuditRecorder::new(AuditConfig::default());
        recorder.capture_before(&record);

        let outcome = recorder.after_delete(&record, &sink);
        assert_eq!(
            outcome.entry().unwrap().client_ip(),
            Some(std::net::Ipv4Addr::LOCALHOST)
        );
    }

    #[test]
    fn test_configured_denylist_limit_and_equality() {
        let store = TestStore::default();
        let sink = MemoryLogStore::new();
        let mut record = alice()
            .with_attribute("ssn", "111-22-3333")
            .with_attribute("password", "old");
        store.persist(&record);

        let config = AuditConfig::default()
            .with_denylist(["ssn"])
            .with_truncation_limit(10)
            .with_equality(EqualityPolicy::Strict);
        let mut recorder = AuditRecorder::new(config);
        recorder.capture_before(&record);

        record.set("name", "abcdefghijklmnopqrstuvwxyz");
        record.set("age", "30");
        record.set("ssn", "999-88-7777");
        record.set("password", "new");
        store.persist(&record);

        let entry = recorder
            .after_save(&store, &mut record, &sink)
            .entry()
            .cloned()
            .unwrap();

        assert_eq!(
            entry.old_message.as_deref(),
            Some(r#"{"name":"Alice","age":30,"password":"old"}"#)
        );
        assert_eq!(
            entry.new_message.as_deref(),
            Some(r#"{"name":"abc ... yz","age":"30","password":"new"}"#)
        );
    }

    /// Record whose relation loading audits the same row again, as a
    /// self-referencing schema does
    struct SelfLoading {
        guard: ExpansionGuard,
        loads: Cell<u32>,
    }

    impl Auditable for SelfLoading {
        fn entity_key(&self) -> &str {
            "Category"
        }

        fn primary_key(&self) -> PrimaryKey {
            PrimaryKey::Int(3)
        }

        fn attributes(&self) -> Attributes {
            [("name", AttributeValue::from("root"))].into_iter().collect()
        }

        fn relations(&self) -> Attributes {
            self.loads.set(self.loads.get() + 1);
            let mut nested = AuditRecorder::new(with_relations()).with_expansion_guard(self.guard.clone());
            nested.capture_before(self);
            let parent = nested.before_snapshot().cloned().unwrap_or_default();
            [("parent", AttributeValue::Scalar(Value::Object(parent)))]
                .into_iter()
                .collect()
        }

        fn is_new_record(&self) -> bool {
            false
        }
    }

    fn with_relations() -> AuditConfig {
        AuditConfig {
            include_relations: true,
            ..AuditConfig::default()
        }
    }

    #[test]
    fn test_shared_guard_stops_relation_reentry() {
        let guard = ExpansionGuard::new();
        let record = SelfLoading {
            guard: guard.clone(),
            loads: Cell::new(0),
        };

        let mut recorder = AuditRecorder::new(with_relations()).with_expansion_guard(guard.clone());
        recorder.capture_before(&record);

        assert_eq!(record.loads.get(), 1);
        assert_eq!(
            recorder.before_snapshot().unwrap()["parent"],
            json!({"name": "root"})
        );
        assert!(!guard.is_expanding(&record));
    }
}
