//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the audit and storage layers.

pub mod diff;
pub mod log;
pub mod record;

pub use diff::{handle_diff_command, DiffArgs};
pub use log::{handle_add_command, handle_entities_command, handle_log_command, AddArgs, LogArgs};
pub use record::{handle_delete_command, handle_record_command, DeleteArgs, RecordArgs};

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::audit::{RecordOutcome, SkipReason};
use crate::error::{AuditError, AuditResult};

/// Read a file that must hold a single JSON object
pub(crate) fn read_object(path: &Path) -> AuditResult<Map<String, Value>> {
    let text = fs::read_to_string(path)
        .map_err(|e| AuditError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

    match serde_json::from_str(&text)? {
        Value::Object(map) => Ok(map),
        _ => Err(AuditError::Validation(format!(
            "{} must contain a JSON object",
            path.display()
        ))),
    }
}

/// Print what happened to a recorded mutation
///
/// A failed log write is reported but does not fail the command; the record
/// change itself has already been saved.
pub(crate) fn print_outcome(outcome: &RecordOutcome) {
    match outcome {
        RecordOutcome::Logged(entry) => {
            println!("{}", entry.format_human_readable());
        }
        RecordOutcome::Skipped(SkipReason::NoChanges) => {
            println!("No changes to log.");
        }
        RecordOutcome::Skipped(SkipReason::TriggerVetoed) => {
            println!("Logging vetoed by trigger.");
        }
        RecordOutcome::Failed(e) => {
            eprintln!("Warning: change saved but not logged: {}", e);
        }
    }
}
