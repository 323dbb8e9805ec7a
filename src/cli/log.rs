//! Log CLI commands
//!
//! Write precomputed entries and query the log store.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Args;

use crate::audit::{add_to_log, LogEntry, Title};
use crate::config::Settings;
use crate::error::{AuditError, AuditResult};
use crate::models::{DynamicRecord, PrimaryKey};
use crate::storage::Storage;

use super::read_object;

/// Arguments for `changeslog add`
#[derive(Args)]
pub struct AddArgs {
    /// Type of the record (e.g. "User")
    pub entity_key: String,
    /// Primary key of the record
    pub entity_id: String,
    /// JSON object with the values to log
    pub message: PathBuf,
    /// Entry title
    #[arg(short, long, default_value = "Create")]
    pub title: String,
    /// Address of the client making the change
    #[arg(long)]
    pub client_ip: Option<IpAddr>,
}

/// Arguments for `changeslog log`
#[derive(Args)]
pub struct LogArgs {
    /// Only show entries for this record type
    #[arg(short, long)]
    pub entity: Option<String>,
    /// Only show entries for this primary key (requires --entity)
    #[arg(long, requires = "entity")]
    pub id: Option<String>,
    /// Number of most recent entries to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

/// Handle `changeslog add`
pub fn handle_add_command(storage: &Storage, settings: &Settings, args: AddArgs) -> AuditResult<()> {
    let message = read_object(&args.message)?;
    let entity = DynamicRecord::new(args.entity_key, PrimaryKey::parse(&args.entity_id));
    let title = Title::from(args.title);

    if !add_to_log(
        &storage.log,
        &message,
        &entity,
        title.clone(),
        args.client_ip,
        settings.default_client_ip,
    ) {
        return Err(AuditError::Persistence(format!(
            "Failed to write entry to {}",
            storage.log.path().display()
        )));
    }

    println!("Logged {} for {} {}", title, entity.entity_key, entity.id);
    Ok(())
}

/// Select entries for `changeslog log`, most recent last
pub fn select_entries(storage: &Storage, args: &LogArgs) -> AuditResult<Vec<LogEntry>> {
    let entries = match (&args.entity, &args.id) {
        (Some(entity), Some(id)) => storage.log.for_entity(entity, &PrimaryKey::parse(id))?,
        (Some(entity), None) => storage
            .log
            .read_all()?
            .into_iter()
            .filter(|e| &e.entity_key == entity)
            .collect(),
        _ => return storage.log.read_recent(args.limit),
    };

    let start = entries.len().saturating_sub(args.limit);
    Ok(entries[start..].to_vec())
}

/// Handle `changeslog log`
pub fn handle_log_command(storage: &Storage, args: LogArgs) -> AuditResult<()> {
    let entries = select_entries(storage, &args)?;

    if entries.is_empty() {
        println!("No log entries found.");
        return Ok(());
    }

    for entry in &entries {
        println!("{}", entry.format_human_readable());
    }

    println!("\nShowing {} of {} entries", entries.len(), storage.log.entry_count()?);
    Ok(())
}

/// Handle `changeslog entities`
pub fn handle_entities_command(storage: &Storage) -> AuditResult<()> {
    let keys = storage.log.entity_keys()?;

    if keys.is_empty() {
        println!("No log entries found.");
        return Ok(());
    }

    for key in keys {
        println!("{}", key);
    }
    Ok(())
}
