//! ID resolver module
//!
//! Resolves job ID prefixes to full IDs by querying the list endpoint, so
//! users can type the first few characters of a job ID.

use anyhow::{Context, Result, anyhow};
use deckwatch_client::JobTransport;
use deckwatch_core::domain::job::JobId;
use tracing::debug;

use crate::types::IdOrPrefix;

/// Resolve a job ID or prefix to a full ID
///
/// A full ID is returned immediately. A prefix is matched case-insensitively
/// against the jobs the list endpoint returns; an exact match wins over
/// longer ones.
///
/// # Errors
/// Returns an error if:
/// - No job matches the prefix
/// - Multiple jobs match the prefix (ambiguous)
/// - The list request fails
pub async fn resolve_job_id(transport: &dyn JobTransport, id_or_prefix: &IdOrPrefix) -> Result<JobId> {
    if let Some(id) = id_or_prefix.as_full() {
        return Ok(id.clone());
    }

    let prefix = id_or_prefix.as_str();
    if prefix.is_empty() {
        return Err(anyhow!("Job ID cannot be empty"));
    }

    let jobs = transport
        .list_jobs()
        .await
        .context("Failed to fetch jobs for ID resolution")?;
    debug!("Resolving prefix '{}' against {} jobs", prefix, jobs.len());

    if let Some(exact) = jobs.iter().find(|j| j.id.as_str().eq_ignore_ascii_case(prefix)) {
        return Ok(exact.id.clone());
    }

    let matches: Vec<_> = jobs
        .iter()
        .filter(|j| j.id.as_str().to_lowercase().starts_with(prefix))
        .collect();

    match matches.len() {
        0 => Err(anyhow!("No job found with ID starting with '{}'", prefix)),
        1 => Ok(matches[0].id.clone()),
        _ => {
            let ids: Vec<&str> = matches.iter().map(|j| j.id.as_str()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
