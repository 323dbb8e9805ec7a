//! Record CLI commands
//!
//! Save or delete a record in the record store and run it through the full
//! recorder lifecycle, so the change lands in the log exactly as it would
//! from an application.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Args;

use crate::audit::{ActionGate, AuditRecorder, RecordOutcome, RequestContext, Title};
use crate::config::{AuditConfig, Settings};
use crate::error::{AuditError, AuditResult};
use crate::models::{DynamicRecord, PrimaryKey};
use crate::storage::Storage;

use super::{print_outcome, read_object};

/// Arguments for `changeslog record`
#[derive(Args)]
pub struct RecordArgs {
    /// Type of the record (e.g. "User")
    pub entity_key: String,
    /// Primary key of the record
    pub entity_id: String,
    /// JSON object with the record's new attributes
    pub after: PathBuf,
    /// Route the change is made through (controller/action)
    #[arg(short, long, default_value = "record/update")]
    pub route: String,
    /// Entry title for updates (creates are always titled Create)
    #[arg(short, long)]
    pub title: Option<String>,
    /// Address of the client making the change
    #[arg(long)]
    pub client_ip: Option<IpAddr>,
}

/// Arguments for `changeslog delete`
#[derive(Args)]
pub struct DeleteArgs {
    /// Type of the record (e.g. "User")
    pub entity_key: String,
    /// Primary key of the record
    pub entity_id: String,
    /// Route the change is made through (controller/action)
    #[arg(short, long, default_value = "record/delete")]
    pub route: String,
    /// Address of the client making the change
    #[arg(long)]
    pub client_ip: Option<IpAddr>,
}

fn request_context(route: &str, client_ip: Option<IpAddr>) -> RequestContext {
    let ctx = RequestContext::new(route);
    match client_ip {
        Some(ip) => ctx.with_client_ip(ip),
        None => ctx,
    }
}

/// Save a record's new state and log the change
pub fn record_change(
    storage: &Storage,
    settings: &Settings,
    args: RecordArgs,
) -> AuditResult<RecordOutcome> {
    let attributes = read_object(&args.after)?;
    let id = PrimaryKey::parse(&args.entity_id);
    let ctx = request_context(&args.route, args.client_ip);
    let gate = ActionGate::new(settings.bypassed_actions.clone());

    let mut recorder = AuditRecorder::new(AuditConfig::from_settings(settings));

    let mut record = match storage.records.get(&args.entity_key, &id)? {
        Some(existing) => {
            recorder.on_loaded(&existing, &ctx, &gate);
            existing
        }
        None => {
            if let Some(ip) = ctx.client_ip {
                recorder.set_client_ip(ip);
            }
            DynamicRecord::new(args.entity_key, id)
        }
    };

    record.attributes = attributes;
    storage.records.upsert(record.clone())?;
    storage.records.save()?;

    let outcome = match args.title {
        Some(title) => {
            recorder.after_save_as(&storage.records, &mut record, &storage.log, Title::from(title))
        }
        None => recorder.after_save(&storage.records, &mut record, &storage.log),
    };
    Ok(outcome)
}

/// Delete a record and log its last state
pub fn delete_record(
    storage: &Storage,
    settings: &Settings,
    args: DeleteArgs,
) -> AuditResult<RecordOutcome> {
    let id = PrimaryKey::parse(&args.entity_id);
    let record = storage
        .records
        .get(&args.entity_key, &id)?
        .ok_or_else(|| AuditError::record_not_found(&args.entity_key, id.to_string()))?;

    let ctx = request_context(&args.route, args.client_ip);
    let gate = ActionGate::new(settings.bypassed_actions.clone());

    let mut recorder = AuditRecorder::new(AuditConfig::from_settings(settings));
    recorder.on_loaded(&record, &ctx, &gate);

    storage.records.delete(&args.entity_key, &id)?;
    storage.records.save()?;

    Ok(recorder.after_delete(&record, &storage.log))
}

/// Handle `changeslog record`
pub fn handle_record_command(storage: &Storage, settings: &Settings, args: RecordArgs) -> AuditResult<()> {
    let outcome = record_change(storage, settings, args)?;
    print_outcome(&outcome);
    Ok(())
}

/// Handle `changeslog delete`
pub fn handle_delete_command(storage: &Storage, settings: &Settings, args: DeleteArgs) -> AuditResult<()> {
    let outcome = delete_record(storage, settings, args)?;
    print_outcome(&outcome);
    Ok(())
}
