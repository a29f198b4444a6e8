//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use deckwatch_tracker::Tracker;
use tracing::debug;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a pitch deck (PDF) for analysis
    Submit {
        /// Path to the PDF file
        file: PathBuf,

        /// Return right after submitting instead of following progress
        #[arg(long)]
        no_watch: bool,
    },
    /// List analysed deals
    List {
        /// Keep refreshing until every deal has finished
        #[arg(short, long)]
        watch: bool,
    },
    /// Get deal details
    Get {
        /// Deal ID or unambiguous prefix
        id: String,
    },
    /// Show the processing status of a deal
    Status {
        /// Deal ID or unambiguous prefix
        id: String,
    },
    /// Follow a deal until its analysis finishes
    Watch {
        /// Deal ID or unambiguous prefix
        id: String,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let tracker = Tracker::connect(&config.tracker)?;
    debug!("Connected to {}", config.tracker.api_url);

    let result = match command {
        Commands::Submit { file, no_watch } => job::submit(&tracker, &file, !no_watch).await,
        Commands::List { watch } => job::list(&tracker, watch).await,
        Commands::Get { id } => job::get(&tracker, &id).await,
        Commands::Status { id } => job::status(&tracker, &id).await,
        Commands::Watch { id } => job::watch(&tracker, &id).await,
    };

    tracker.shutdown();
    result
}
