use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lastivka::config::{default_config_path, Config};
use lastivka::memory_cli::{handle_command, MemoryCommands};
use lastivka_memory::MemoryStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lastivka")]
#[command(about = "Long-term memory for the Lastivka assistant")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: MemoryCommands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Memory store file (overrides config and environment)
    #[arg(short, long)]
    store: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = Config::load_from_file(&config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    init_logging(&config.logging.level)?;

    let store_path = cli.store.unwrap_or_else(|| config.store_path());
    let mut store = MemoryStore::open(&store_path, config.memory.clone())
        .with_context(|| format!("Failed to open memory store {}", store_path.display()))?;
    if let Some(legacy) = config.legacy_path() {
        store = store.with_legacy_path(legacy);
    }
    tracing::debug!("Using memory store {}", store_path.display());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    handle_command(cli.command, &store, &mut out)?;
    out.flush()?;
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter.to_string())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    Ok(())
}
