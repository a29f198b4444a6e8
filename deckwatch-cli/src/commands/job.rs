//! Deal command handlers
//!
//! Submitting, listing, inspecting and following analysis jobs.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use colored::*;
use deckwatch_client::DocumentUpload;
use deckwatch_core::domain::job::JobId;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::id_resolver::resolve_job_id;
use crate::render::{print_job_details, print_job_summary, print_status_summary};
use crate::surface::{Outcome, TerminalJobSurface, TerminalListSurface};
use crate::types::IdOrPrefix;
use deckwatch_tracker::Tracker;

/// Submit a document and optionally follow it to the end
pub async fn submit(tracker: &Tracker, file: &Path, follow: bool) -> Result<()> {
    let upload = DocumentUpload::from_path(file)
        .await
        .with_context(|| format!("Cannot read {}", file.display()))?;
    debug!("Submitting {} ({} bytes)", upload.file_name(), upload.len());

    let job = tracker
        .submit(upload)
        .await
        .context("Failed to submit pitch deck")?;
    info!("Submitted {} as job {}", file.display(), job.id);

    println!(
        "{} Submitted {} as {}",
        "✓".green(),
        file.display(),
        job.id.to_string().cyan()
    );

    if follow {
        println!();
        follow_job(tracker, &job.id).await
    } else {
        Ok(())
    }
}

/// List deals, or follow the list until everything has finished
pub async fn list(tracker: &Tracker, follow: bool) -> Result<()> {
    if follow {
        let (surface, done) = TerminalListSurface::new();
        let _binding = tracker.watch_list(Arc::new(surface));
        return wait_for(done, |settled| *settled).await.map(|_| ());
    }

    let jobs = tracker.store().refresh_list().await?;

    if jobs.is_empty() {
        println!("{}", "No deals found.".yellow());
    } else {
        println!("{}", format!("Found {} deal(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

/// Get and display a single deal
pub async fn get(tracker: &Tracker, id: &str) -> Result<()> {
    let id = resolve(tracker, id).await?;
    let job = tracker.store().fetch(&id).await?;

    print_job_details(&job);

    Ok(())
}

/// Show the lightweight status of a deal
pub async fn status(tracker: &Tracker, id: &str) -> Result<()> {
    let id = resolve(tracker, id).await?;
    let summary = tracker.store().transport().get_job_status(&id).await?;

    print_status_summary(&summary);

    Ok(())
}

/// Follow a deal until its analysis finishes
pub async fn watch(tracker: &Tracker, id: &str) -> Result<()> {
    let id = resolve(tracker, id).await?;
    follow_job(tracker, &id).await
}

async fn resolve(tracker: &Tracker, id: &str) -> Result<JobId> {
    let transport = tracker.store().transport();
    resolve_job_id(transport.as_ref(), &IdOrPrefix::parse(id)).await
}

async fn follow_job(tracker: &Tracker, id: &JobId) -> Result<()> {
    let (surface, done) = TerminalJobSurface::new();
    let _binding = tracker.watch(id, Arc::new(surface));
    debug!("Following job {}", id);

    let outcome = wait_for(done, Option::is_some).await?;
    debug!("Stopped following job {}: {:?}", id, outcome);

    match outcome {
        Some(Outcome::Completed) => Ok(()),
        Some(Outcome::Failed) => Err(anyhow!("Analysis of {} failed", id)),
        Some(Outcome::NotFound) => Err(anyhow!("No deal with ID {}", id)),
        None => Ok(()),
    }
}

/// Waits until `ready` holds for the surface's signal, or Ctrl-C
///
/// Returns the last signalled value either way.
async fn wait_for<T: Clone>(mut rx: watch::Receiver<T>, ready: impl FnMut(&T) -> bool) -> Result<T> {
    let latest = rx.clone();

    tokio::select! {
        result = rx.wait_for(ready) => {
            let value = result.context("Rendering surface went away")?;
            Ok(value.clone())
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{}", "Stopped watching.".dimmed());
            Ok(latest.borrow().clone())
        }
    }
}
