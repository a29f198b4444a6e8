//! Tracking session
//!
//! Owns one store, one poller and one binder, constructed together at start
//! and torn down together. Tests build as many isolated sessions as they
//! like.

use std::sync::Arc;

use anyhow::Context;
use deckwatch_client::{AnalysisClient, ClientError, DocumentUpload, JobTransport};
use deckwatch_core::domain::job::{Job, JobId};
use tracing::info;

use crate::binder::{JobBinding, JobSurface, ListBinding, ListSurface, ViewBinder};
use crate::config::Config;
use crate::poller::Poller;
use crate::store::JobStore;

pub struct Tracker {
    store: JobStore,
    poller: Poller,
    binder: ViewBinder,
}

impl Tracker {
    /// Creates a session over an existing transport
    pub fn new(config: &Config, transport: Arc<dyn JobTransport>) -> Self {
        let store = JobStore::new(transport);
        let poller = Poller::new(store.clone(), config.interval_policy());
        let binder = ViewBinder::new(
            store.clone(),
            poller.clone(),
            config.detail_interval,
            config.list_interval,
        );

        Self {
            store,
            poller,
            binder,
        }
    }

    /// Validates `config` and creates a session talking HTTP to the service
    pub fn connect(config: &Config) -> anyhow::Result<Self> {
        config.validate().context("Invalid tracker configuration")?;

        let client = match config.request_timeout {
            Some(timeout) => AnalysisClient::with_timeout(&config.api_url, timeout)
                .context("Failed to build HTTP client")?,
            None => AnalysisClient::new(&config.api_url),
        }
        .with_collection(&config.collection)
        .with_max_upload_bytes(config.max_upload_bytes);

        info!("Tracking jobs at {}", client.collection_url());
        Ok(Self::new(config, Arc::new(client)))
    }

    /// Submits a document and stores the created job
    ///
    /// Errors come back to the caller as they are; the upload is never
    /// retried.
    pub async fn submit(&self, upload: DocumentUpload) -> Result<Arc<Job>, ClientError> {
        info!("Submitting {} ({} bytes)", upload.file_name(), upload.len());

        let job = self.store.transport().create_job(upload).await?;
        info!("Created job {} ({})", job.id, job.status);

        Ok(self.store.upsert(job))
    }

    /// Binds a surface to a job; see [`ViewBinder::bind_job`]
    pub fn watch(&self, id: &JobId, surface: Arc<dyn JobSurface>) -> JobBinding {
        self.binder.bind_job(id, surface)
    }

    /// Binds a surface to the job list; see [`ViewBinder::bind_list`]
    pub fn watch_list(&self, surface: Arc<dyn ListSurface>) -> ListBinding {
        self.binder.bind_list(surface)
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn binder(&self) -> &ViewBinder {
        &self.binder
    }

    /// Stops all polling and drops every cached snapshot
    pub fn shutdown(&self) {
        self.poller.shutdown();
        self.store.clear();
        info!("Tracker shut down");
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("store", &self.store)
            .field("poller", &self.poller)
            .finish()
    }
}
