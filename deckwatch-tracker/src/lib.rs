//! Deckwatch job tracker
//!
//! Keeps a consistent, race-free picture of remote analysis jobs for a
//! rendering layer:
//!
//! - [`store`]: the one authoritative cache of job snapshots, with observer
//!   subscriptions and deduplicated fetches
//! - [`poller`]: per-target polling state machines with an adaptive interval
//!   policy
//! - [`binder`]: ties rendering surfaces to jobs and releases polling when
//!   nothing is watching
//! - [`Tracker`]: one session owning all three
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use deckwatch_client::DocumentUpload;
//! use deckwatch_tracker::{Config, JobSurface, JobView, Tracker};
//!
//! struct Printer;
//!
//! impl JobSurface for Printer {
//!     fn render(&self, view: &JobView) {
//!         if let Some(job) = &view.job {
//!             println!("{} is {}", job.id, job.status);
//!         }
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let tracker = Tracker::connect(&Config::from_env()?)?;
//!
//!     let job = tracker.submit(DocumentUpload::from_path("deck.pdf").await?).await?;
//!     let _binding = tracker.watch(&job.id, Arc::new(Printer));
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     Ok(())
//! }
//! ```

pub mod binder;
pub mod config;
pub mod poller;
pub mod store;
mod tracker;

#[cfg(test)]
mod testing;

pub use binder::{JobBinding, JobSurface, ListBinding, ListSurface, ViewBinder};
pub use config::Config;
pub use poller::policy::{Backoff, IntervalPolicy, PollOutcome};
pub use poller::{PollLease, PollState, PollTarget, Poller};
pub use store::{JobObserver, JobStore, JobView, ListObserver, ListView, RefreshNotice, Subscription};
pub use tracker::Tracker;
