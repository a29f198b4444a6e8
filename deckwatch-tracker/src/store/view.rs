//! Read-only views handed to observers and renderers

use std::sync::Arc;

use deckwatch_core::domain::job::{Job, JobId};

/// A condition renderers should show next to (not instead of) the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshNotice {
    /// Refreshes have kept failing; the snapshot shown is the last good one
    Unavailable {
        consecutive_failures: u32,
        message: String,
    },
    /// The service does not know this job
    NotFound,
}

impl std::fmt::Display for RefreshNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshNotice::Unavailable {
                consecutive_failures,
                message,
            } => write!(
                f,
                "Temporarily unable to refresh ({} failed attempts): {}",
                consecutive_failures, message
            ),
            RefreshNotice::NotFound => write!(f, "Not found"),
        }
    }
}

/// Current state of one job as seen by a renderer
#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub id: JobId,
    /// Latest snapshot, if one has arrived
    pub job: Option<Arc<Job>>,
    pub notice: Option<RefreshNotice>,
}

impl JobView {
    /// True only until the first snapshot (or a not-found answer) arrives
    pub fn is_loading(&self) -> bool {
        self.job.is_none() && self.notice.is_none()
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.notice, Some(RefreshNotice::NotFound))
    }

    pub fn is_terminal(&self) -> bool {
        self.job.as_ref().is_some_and(|job| job.is_terminal())
    }
}

/// Current state of the job list as seen by a renderer
#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    /// Jobs in server order
    pub jobs: Vec<Arc<Job>>,
    pub notice: Option<RefreshNotice>,
    pub(crate) loaded: bool,
}

impl ListView {
    pub fn is_loading(&self) -> bool {
        !self.loaded && self.notice.is_none()
    }

    /// Whether every listed job has reached a terminal state
    pub fn all_terminal(&self) -> bool {
        self.jobs.iter().all(|job| job.is_terminal())
    }
}
