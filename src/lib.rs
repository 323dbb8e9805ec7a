//! changeslog - change audit trail for records
//!
//! This library records what changed on a record between the moment it was
//! loaded and the moment it was saved or deleted. Changes are diffed,
//! sensitive fields are redacted, long values are clipped, and the result is
//! appended to a log that is never rewritten.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Path management, persisted settings and the runtime `AuditConfig`
//! - `error`: Custom error types
//! - `models`: Record-side types (`Auditable`, `PrimaryKey`, `AttributeValue`)
//! - `audit`: Snapshot capture, diffing, finalization, the recorder and log entries
//! - `storage`: JSON record store and the storage coordinator
//! - `logging`: Diagnostic `tracing` setup for the binary
//! - `cli`: Command handlers for the `changeslog` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use changeslog::audit::{AuditRecorder, MemoryLogStore};
//! use changeslog::config::AuditConfig;
//! use changeslog::models::DynamicRecord;
//!
//! let log = MemoryLogStore::new();
//! let mut user = DynamicRecord::new("User", 1).with_attribute("age", 30);
//!
//! let mut recorder = AuditRecorder::new(AuditConfig::default());
//! recorder.capture_before(&user);
//! user.set("age", 31);
//! let outcome = recorder.after_save(&store, &mut user, &log);
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod storage;

pub use error::{AuditError, AuditResult};
