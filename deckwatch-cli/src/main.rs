//! Deckwatch CLI
//!
//! Command-line interface for submitting pitch decks to the analysis service
//! and following their progress.

mod commands;
mod config;
mod id_resolver;
mod render;
mod surface;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::{Config, Overrides};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "deckwatch")]
#[command(about = "Pitch deck analysis CLI", long_about = None)]
struct Cli {
    /// Analysis service URL
    #[arg(long, env = "DECKWATCH_API_URL")]
    api_url: Option<String>,

    /// Collection the service mounts jobs under (e.g. deals, jobs)
    #[arg(long, env = "DECKWATCH_COLLECTION")]
    collection: Option<String>,

    /// Refresh interval for a followed deal, in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Log polling activity to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "deckwatch=debug,deckwatch_tracker=debug,deckwatch_client=debug"
    } else {
        "deckwatch=warn,deckwatch_tracker=warn,deckwatch_client=warn"
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(Overrides {
        api_url: cli.api_url,
        collection: cli.collection,
        interval_ms: cli.interval_ms,
    })?;

    handle_command(cli.command, &config).await
}
