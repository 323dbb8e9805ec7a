//! Diff CLI command
//!
//! Compares two JSON objects the way the recorder compares snapshots and
//! prints the payloads that would be logged.

use std::path::PathBuf;

use clap::Args;
use serde_json::Value;

use crate::audit::{DiffEngine, FinalizedMessage, Finalizer, SnapshotBuilder};
use crate::config::Settings;
use crate::error::AuditResult;
use crate::models::Attributes;

use super::read_object;

/// Arguments for `changeslog diff`
#[derive(Args)]
pub struct DiffArgs {
    /// JSON object with the state before the change
    pub before: PathBuf,
    /// JSON object with the state after the change
    pub after: PathBuf,
}

/// Compute the loggable payloads for two states
pub fn diff_objects(
    settings: &Settings,
    before: serde_json::Map<String, Value>,
    after: serde_json::Map<String, Value>,
) -> Option<FinalizedMessage> {
    let old = SnapshotBuilder::from_attributes(&Attributes::from_json_object(before));
    let new = SnapshotBuilder::from_attributes(&Attributes::from_json_object(after));

    let diff = DiffEngine::new(settings.equality).diff(&old, &new);
    Finalizer::new(settings.denylist.clone(), settings.truncation_limit).finalize(&diff, &old, &new)
}

/// Handle `changeslog diff`
pub fn handle_diff_command(settings: &Settings, args: DiffArgs) -> AuditResult<()> {
    let before = read_object(&args.before)?;
    let after = read_object(&args.after)?;

    match diff_objects(settings, before, after) {
        Some(message) => {
            println!("old: {}", message.old_json());
            println!("new: {}", message.new_json());
        }
        None => println!("No changes."),
    }

    Ok(())
}
