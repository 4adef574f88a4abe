//! CLI parser and command dispatch.

mod annotate;
mod helpers;
mod init;
mod lookup;
mod sessions;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use rsannotate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "rsanno")]
#[command(about = "Resumable batch annotation of SNP identifiers")]
#[command(version)]
pub struct Cli {
    /// Target directory or database file (overrides config file).
    /// Can be a directory containing rsannotate.db or a .db file directly.
    #[arg(long, short = 't', global = true)]
    target: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Extract identifiers from a file and annotate them in a new session
    Annotate {
        /// Variant or genotype file to read
        file: PathBuf,
        /// Display name for the session (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
        /// Identifiers per lookup call
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Resume a paused session with the file it was created from
    Resume {
        /// Session ID
        session_id: String,
        /// Variant or genotype file to read
        file: PathBuf,
        /// Identifiers per lookup call
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// List sessions, newest first
    Sessions,

    /// Show one session
    Status {
        /// Session ID
        session_id: String,
    },

    /// Print stored results for a session
    Results {
        /// Session ID
        session_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up identifiers without creating a session
    Lookup {
        /// Identifiers to look up (e.g. rs429358)
        #[arg(required = true)]
        identifiers: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        data: cli.target,
    };
    let (settings, config) = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings, &config).await,
        Commands::Annotate {
            file,
            name,
            batch_size,
        } => annotate::cmd_annotate(&settings, &config, &file, name, batch_size).await,
        Commands::Resume {
            session_id,
            file,
            batch_size,
        } => annotate::cmd_resume(&settings, &config, &session_id, &file, batch_size).await,
        Commands::Sessions => sessions::cmd_sessions(&settings).await,
        Commands::Status { session_id } => sessions::cmd_status(&settings, &session_id).await,
        Commands::Results { session_id, json } => {
            sessions::cmd_results(&settings, &session_id, json).await
        }
        Commands::Lookup { identifiers, json } => {
            lookup::cmd_lookup(&config, &identifiers, json).await
        }
    }
}
