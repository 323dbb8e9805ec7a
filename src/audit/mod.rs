//! Change audit trail
//!
//! Records what changed on a record between the moment it was loaded and the
//! moment it was saved or deleted, and appends that to an append-only log.
//!
//! # Architecture
//!
//! - `SnapshotBuilder`: captures a record's normalized key -> value state,
//!   optionally including relations and virtual attributes.
//! - `DiffEngine`: computes which keys were removed, modified or added between
//!   two snapshots.
//! - `Finalizer`: drops denylisted keys, pairs every changed key with its
//!   full old and new value, and clips long strings.
//! - `AuditRecorder`: drives the per-record lifecycle and writes a `LogEntry`
//!   through a `LogSink` when something loggable changed.
//! - `JsonlLogStore`: line-delimited JSON log with read-side queries.
//!
//! # Example
//!
//! ```rust,ignore
//! use changeslog::audit::{ActionGate, AuditRecorder, JsonlLogStore, RequestContext};
//! use changeslog::config::AuditConfig;
//!
//! let log = JsonlLogStore::new(paths.log_file());
//! let mut recorder = AuditRecorder::new(AuditConfig::default());
//!
//! recorder.on_loaded(&user, &RequestContext::new("user/update"), &ActionGate::default());
//! user.set("age", 31);
//! repository.upsert(user.clone())?;
//!
//! let outcome = recorder.after_save(&repository, &mut user, &log);
//! ```

mod diff;
mod entry;
mod finalize;
mod gate;
mod logger;
mod normalize;
mod recorder;
pub(crate) mod snapshot;

pub use diff::{loosely_equal, ChangeKind, DiffEngine, DiffResult, FieldDiff};
pub use entry::{add_to_log, encode_ip, resolve_ip, DecodedPayload, FieldChange, LogEntry, Title};
pub use finalize::{
    limit_string, limit_value, FinalizedMessage, Finalizer, DEFAULT_TRUNCATION_LIMIT,
    TRUNCATION_MARKER,
};
pub use gate::{ActionGate, CaptureGate, RequestContext};
pub use logger::{JsonlLogStore, LogSink, MemoryLogStore};
pub use normalize::{normalize, normalize_json};
pub use recorder::{AuditRecorder, RecordOutcome, RecorderState, SkipReason};
pub use snapshot::{ExpansionGuard, Snapshot, SnapshotBuilder, BOOKKEEPING_KEYS};
