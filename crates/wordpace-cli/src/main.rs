use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod terminal;

#[derive(Parser)]
#[command(name = "wordpace", version, about = "Word-by-word reading experiment runner")]
struct Cli {
    /// Config file to use instead of ~/.config/wordpace/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session
    Run(commands::run::RunArgs),
    /// Trial order management
    Sequence {
        #[command(subcommand)]
        action: commands::sequence::SequenceAction,
    },
    /// Session data inspection
    Journal {
        #[command(subcommand)]
        action: commands::journal::JournalAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args, config_path),
        Commands::Sequence { action } => commands::sequence::run(action, config_path),
        Commands::Journal { action } => commands::journal::run(action, config_path),
        Commands::Config { action } => commands::config::run(action, config_path),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Log to a file so the terminal presenter keeps the screen to itself.
///
/// `RUST_LOG` overrides the default `info` filter.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    match open_log_file() {
        Some((path, file)) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            tracing::debug!(path = %path.display(), "Logging initialized");
        }
        None => tracing_subscriber::registry().with(env_filter).init(),
    }
}

fn open_log_file() -> Option<(PathBuf, fs::File)> {
    let dir = wordpace_core::storage::data_dir().ok()?.join("logs");
    fs::create_dir_all(&dir).ok()?;
    let path = dir.join("wordpace.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()?;
    Some((path, file))
}
