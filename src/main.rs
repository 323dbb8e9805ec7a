use anyhow::Result;
use clap::{Parser, Subcommand};

use changeslog::cli::{
    handle_add_command, handle_delete_command, handle_diff_command, handle_entities_command,
    handle_log_command, handle_record_command, AddArgs, DeleteArgs, DiffArgs, LogArgs, RecordArgs,
};
use changeslog::config::{paths::ChangeslogPaths, settings::Settings};
use changeslog::logging::init_logging_with_level;
use changeslog::storage::Storage;

#[derive(Parser)]
#[command(
    name = "changeslog",
    version,
    about = "Change audit trail for records",
    long_about = "changeslog records what changed on a record between loading and \
                  saving it, redacts sensitive fields, and appends the result to an \
                  append-only log."
)]
struct Cli {
    /// Show debug diagnostics on stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what would be logged between two JSON states
    Diff(DiffArgs),

    /// Log a precomputed message for a record
    Add(AddArgs),

    /// Save a record's new state and log the change
    Record(RecordArgs),

    /// Delete a record and log its last state
    Delete(DeleteArgs),

    /// Show log entries
    Log(LogArgs),

    /// List record types present in the log
    Entities,

    /// Write the default settings file
    Init,

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging_with_level(cli.verbose);

    let paths = ChangeslogPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    let mut storage = Storage::new(paths.clone())?;
    storage.load_all()?;

    match cli.command {
        Some(Commands::Diff(args)) => handle_diff_command(&settings, args)?,
        Some(Commands::Add(args)) => handle_add_command(&storage, &settings, args)?,
        Some(Commands::Record(args)) => handle_record_command(&storage, &settings, args)?,
        Some(Commands::Delete(args)) => handle_delete_command(&storage, &settings, args)?,
        Some(Commands::Log(args)) => handle_log_command(&storage, args)?,
        Some(Commands::Entities) => handle_entities_command(&storage)?,
        Some(Commands::Init) => {
            println!("Initializing changeslog at: {}", paths.base_dir().display());
            paths.ensure_directories()?;
            settings.save(&paths)?;
            println!("Initialization complete!");
            println!();
            println!("Edit {} to change the denylist,", paths.settings_file().display());
            println!("truncation limit, bypassed actions or equality policy.");
        }
        Some(Commands::Config) => {
            println!("changeslog Configuration");
            println!("========================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            println!("Log file:         {}", paths.log_file().display());
            println!("Records file:     {}", paths.records_file().display());
            println!("Initialized:      {}", storage.is_initialized());
            println!();
            println!("Settings:");
            println!("  Truncation limit:  {}", settings.truncation_limit);
            println!(
                "  Denylist:          {}",
                settings.denylist.iter().cloned().collect::<Vec<_>>().join(", ")
            );
            println!("  Include relations: {}", settings.include_relations);
            println!(
                "  Bypassed actions:  {}",
                settings
                    .bypassed_actions
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("  Equality:          {:?}", settings.equality);
            println!("  Default client IP: {}", settings.default_client_ip);
        }
        None => {
            println!("changeslog - change audit trail for records");
            println!();
            println!("Run 'changeslog --help' for usage information.");
        }
    }

    Ok(())
}
