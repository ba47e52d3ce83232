mod commands;
mod config;
mod context;
mod logging;
mod notify;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crate::commands::{
    cmd_cache_activate, cmd_cache_install, cmd_cache_list, cmd_cache_show, cmd_capture, cmd_drain,
    cmd_force_sync, cmd_import_zones, cmd_queue_list, cmd_status, cmd_worker,
};
use crate::config::Overrides;
use crate::context::AppContext;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Offline-first capture and sync client.
#[derive(Parser)]
#[command(name = "rgpl", version, about = "Offline-first capture and sync client")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Configuration file (defaults to ./rgpl.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server base URL, overriding config and RGPL_SERVER_URL
    #[arg(long, global = true)]
    server: Option<String>,

    /// Data directory, overriding config and RGPL_DATA_DIR
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Keep the queue in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a form: queue it locally and try to send it now
    Capture {
        /// Text field, repeatable
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
        /// File field, repeatable; an empty path means no file chosen
        #[arg(long = "file", value_name = "KEY=PATH[:MIME]")]
        files: Vec<String>,
    },

    /// Inspect the local queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Send every queued record to the server, then clear the queue
    Drain,

    /// Show the connection state and pending records, local and server
    Status,

    /// Ask the server to synchronise now
    ForceSync,

    /// Upload a CSV or Excel zone file
    ImportZones {
        /// Zone file to upload
        file: Option<PathBuf>,
    },

    /// Manage the offline asset snapshot
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Run the background context: cache lifecycle, connectivity watch, drain on reconnect
    Worker {
        /// Install and activate the configured snapshot, then exit
        #[arg(long)]
        once: bool,
        /// Raise sync-pending right after startup
        #[arg(long)]
        sync_now: bool,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// List queued records in insertion order
    List,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Fetch the manifest into a new snapshot
    Install {
        /// Snapshot version (defaults to [cache] version)
        #[arg(long)]
        version: Option<String>,
    },
    /// Serve an installed snapshot and delete the others
    Activate {
        /// Snapshot version (defaults to [cache] version)
        #[arg(long)]
        version: Option<String>,
    },
    /// List stored snapshots
    List,
    /// Print the cached response for a path
    Show {
        /// Request path, e.g. /login
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let overrides = Overrides {
        server: cli.server.clone(),
        data_dir: cli.data_dir.clone(),
    };
    let config = match config::load(cli.config.as_deref(), &overrides) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("config error: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    logging::init_logging(&config.log, cli.quiet);

    let ctx = match AppContext::new(config, cli.output, cli.quiet, cli.ephemeral) {
        Ok(ctx) => ctx,
        Err(e) => {
            report_error(&e, cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Capture { fields, files } => cmd_capture(&ctx, &fields, &files),
        Commands::Queue { command } => match command {
            QueueCommands::List => cmd_queue_list(&ctx),
        },
        Commands::Drain => cmd_drain(&ctx),
        Commands::Status => cmd_status(&ctx),
        Commands::ForceSync => cmd_force_sync(&ctx),
        Commands::ImportZones { file } => cmd_import_zones(&ctx, file.as_deref()),
        Commands::Cache { command } => match command {
            CacheCommands::Install { version } => cmd_cache_install(&ctx, version.as_deref()),
            CacheCommands::Activate { version } => cmd_cache_activate(&ctx, version.as_deref()),
            CacheCommands::List => cmd_cache_list(&ctx),
            CacheCommands::Show { path } => cmd_cache_show(&ctx, &path),
        },
        Commands::Worker { once, sync_now } => cmd_worker(&ctx, once, sync_now),
    }
}

/// Print an error to stderr, as a JSON object in JSON mode.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}

/// Print a JSON value to stdout.
pub(crate) fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("could not serialize output: {}", e),
    }
}
