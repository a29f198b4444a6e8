//! Terminal rendering surfaces
//!
//! Print status transitions as they arrive and the full result once a job
//! settles. Each surface flips a watch channel when there is nothing left
//! to wait for.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Local;
use colored::*;
use deckwatch_core::domain::job::{JobId, JobStatus};
use deckwatch_tracker::{JobSurface, JobView, ListSurface, ListView, RefreshNotice};
use tokio::sync::watch;

use crate::render::{colorize_status, print_job_details};

/// How a watched job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
    NotFound,
}

/// Follows one job until it settles
pub struct TerminalJobSurface {
    last_status: Mutex<Option<JobStatus>>,
    last_notice: Mutex<Option<RefreshNotice>>,
    done: watch::Sender<Option<Outcome>>,
}

impl TerminalJobSurface {
    pub fn new() -> (Self, watch::Receiver<Option<Outcome>>) {
        let (done, rx) = watch::channel(None);
        let surface = Self {
            last_status: Mutex::new(None),
            last_notice: Mutex::new(None),
            done,
        };
        (surface, rx)
    }
}

impl JobSurface for TerminalJobSurface {
    fn render(&self, view: &JobView) {
        let notice_changed = {
            let mut last = self.last_notice.lock().unwrap_or_else(|e| e.into_inner());
            let changed = *last != view.notice;
            *last = view.notice.clone();
            changed
        };

        if notice_changed {
            match &view.notice {
                Some(RefreshNotice::NotFound) => {
                    eprintln!("{} Job {} not found", "✗".red(), view.id);
                    self.done.send_replace(Some(Outcome::NotFound));
                    return;
                }
                Some(notice @ RefreshNotice::Unavailable { .. }) => {
                    eprintln!("{} {}", "⚠".yellow(), notice.to_string().yellow());
                }
                None => {}
            }
        }

        let Some(job) = &view.job else {
            return;
        };

        let status_changed = {
            let mut last = self.last_status.lock().unwrap_or_else(|e| e.into_inner());
            let changed = *last != Some(job.status);
            *last = Some(job.status);
            changed
        };
        if !status_changed {
            return;
        }

        println!(
            "{} {} {}",
            Local::now().format("%H:%M:%S").to_string().dimmed(),
            job.display_name(),
            colorize_status(job.status)
        );

        let outcome = match job.status {
            JobStatus::Completed => Outcome::Completed,
            JobStatus::Failed => Outcome::Failed,
            _ => return,
        };
        println!();
        print_job_details(job);
        self.done.send_replace(Some(outcome));
    }
}

/// Follows the job list until every job has settled
pub struct TerminalListSurface {
    seen: Mutex<HashMap<JobId, JobStatus>>,
    done: watch::Sender<bool>,
}

impl TerminalListSurface {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (done, rx) = watch::channel(false);
        let surface = Self {
            seen: Mutex::new(HashMap::new()),
            done,
        };
        (surface, rx)
    }
}

impl ListSurface for TerminalListSurface {
    fn render(&self, view: &ListView) {
        if let Some(notice) = &view.notice {
            eprintln!("{} {}", "⚠".yellow(), notice.to_string().yellow());
        }
        if view.is_loading() {
            return;
        }

        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        for job in &view.jobs {
            if seen.get(&job.id) == Some(&job.status) {
                continue;
            }
            seen.insert(job.id.clone(), job.status);
            println!(
                "{} {:<36} {:<24} {}",
                Local::now().format("%H:%M:%S").to_string().dimmed(),
                job.id.to_string().dimmed(),
                job.display_name(),
                colorize_status(job.status)
            );
        }

        if view.all_terminal() {
            self.done.send_replace(true);
        }
    }
}
