//! Deckwatch HTTP Client
//!
//! A small, type-safe HTTP client for the pitch deck analysis service.
//!
//! The client exposes the service's request/response contract (create a job,
//! fetch one, list them, check status) and surfaces every failure as a typed
//! [`ClientError`]. The [`JobTransport`] trait abstracts it so the tracker
//! can be driven by any implementation.
//!
//! # Example
//!
//! ```no_run
//! use deckwatch_client::{AnalysisClient, DocumentUpload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AnalysisClient::new("http://localhost:8000/api");
//!
//!     let upload = DocumentUpload::from_path("deck.pdf").await?;
//!     let job = client.create_job(upload).await?;
//!
//!     println!("Submitted job: {} ({})", job.id, job.status);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
pub mod transport;
pub mod upload;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use transport::JobTransport;
pub use upload::{DEFAULT_MAX_UPLOAD_BYTES, DocumentUpload};

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::extract_error_message;

/// Collection segment the deployed service mounts its jobs under
pub const DEFAULT_COLLECTION: &str = "deals";

/// HTTP client for the analysis service API
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    /// Base URL of the API (e.g., "http://localhost:8000/api")
    base_url: String,
    /// Path segment holding the job resources
    collection: String,
    /// Upload size limit enforced before sending
    max_upload_bytes: u64,
    /// HTTP client instance
    client: Client,
}

impl AnalysisClient {
    /// Create a new client
    ///
    /// # Example
    /// ```
    /// use deckwatch_client::AnalysisClient;
    ///
    /// let client = AnalysisClient::new("http://localhost:8000/api");
    /// assert_eq!(client.collection_url(), "http://localhost:8000/api/deals/");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            client,
        }
    }

    /// Create a new client whose requests give up after `timeout`
    ///
    /// A timed-out request surfaces as [`ClientError::Network`].
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Use a different collection segment (e.g. `jobs`)
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into().trim_matches('/').to_string();
        self
    }

    /// Override the upload size limit
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// URL of the job collection, with the trailing slash the service expects
    pub fn collection_url(&self) -> String {
        format!("{}/{}/", self.base_url, self.collection)
    }

    fn job_url(&self, id: &deckwatch_core::domain::job::JobId) -> String {
        format!("{}/{}/{}/", self.base_url, self.collection, id)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// Unsuccessful statuses are classified with [`ClientError::from_status`],
    /// using whatever message the service put in the body.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(
                status.as_u16(),
                extract_error_message(&body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("Failed to parse JSON response: {}", e)))
    }
}
