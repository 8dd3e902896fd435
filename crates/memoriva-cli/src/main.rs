//! memoriva CLI: drives the study-session pipeline against a fixture.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "memoriva", version, about = "Study-session card selection pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue every pending session in a fixture and process them with the worker pool
    Run {
        /// Path to a .toml fixture
        #[arg(long)]
        fixture: PathBuf,

        /// Number of workers (default: from config)
        #[arg(long)]
        workers: Option<usize>,

        /// Queue capacity (default: from config)
        #[arg(long)]
        capacity: Option<usize>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Never call a language model; always use the heuristic selection
        #[arg(long)]
        offline: bool,

        /// Give up waiting for sessions after this many seconds
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },

    /// Process a single session and print its ordered cards
    Process {
        /// Path to a .toml fixture
        #[arg(long)]
        fixture: PathBuf,

        /// Session ID
        #[arg(long)]
        session: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Never call a language model; always use the heuristic selection
        #[arg(long)]
        offline: bool,
    },

    /// Validate a fixture file
    Validate {
        /// Path to a .toml fixture
        #[arg(long)]
        fixture: PathBuf,
    },

    /// Create starter config and example fixture
    Init,
}

#[tokio::main]
async fn main() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "memoriva=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            fixture,
            workers,
            capacity,
            config,
            offline,
            timeout_secs,
        } => {
            commands::run::execute(fixture, workers, capacity, config, offline, timeout_secs).await
        }
        Commands::Process {
            fixture,
            session,
            config,
            offline,
        } => commands::process::execute(fixture, session, config, offline).await,
        Commands::Validate { fixture } => commands::validate::execute(fixture),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
