//! Job-related API endpoints

use deckwatch_core::domain::job::{Job, JobId};
use deckwatch_core::dto::job::{JobListResponse, JobStatusSummary};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::AnalysisClient;
use crate::error::Result;
use crate::upload::DocumentUpload;

impl AnalysisClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Submit a document and create a new analysis job
    ///
    /// The upload is validated locally first; a rejected file never reaches
    /// the network.
    ///
    /// # Returns
    /// The initial job snapshot (usually `submitted`)
    pub async fn create_job(&self, upload: DocumentUpload) -> Result<Job> {
        upload.validate(self.max_upload_bytes)?;

        let (file_name, bytes) = upload.into_parts();
        debug!("Uploading {} ({} bytes)", file_name, bytes.len());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new().part("pitch_deck", part);

        let url = self.collection_url();
        let response = self.client.post(&url).multipart(form).send().await?;

        self.handle_response(response).await
    }

    /// Get a job by ID
    ///
    /// Safe to call repeatedly; it has no effect on the remote job.
    pub async fn get_job(&self, job_id: &JobId) -> Result<Job> {
        let url = self.job_url(job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List jobs, most recent first
    ///
    /// Returns the first page when the service paginates.
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let url = self.collection_url();
        let response = self.client.get(&url).send().await?;

        let body: JobListResponse = self.handle_response(response).await?;
        Ok(body.into_jobs())
    }

    /// Get the lightweight processing status of a job
    pub async fn get_job_status(&self, job_id: &JobId) -> Result<JobStatusSummary> {
        let url = format!("{}status/", self.job_url(job_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use axum::{
        Json, Router,
        extract::{Multipart, Path},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
    };
    use deckwatch_core::domain::job::JobStatus;
    use serde_json::json;

    fn job_json(id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "status": status,
            "company_name": "",
            "created_at": "2024-05-01T10:00:00Z"
        })
    }

    async fn create_deal(mut multipart: Multipart) -> Response {
        while let Ok(Some(field)) = multipart.next_field().await {
            if field.name() != Some("pitch_deck") {
                continue;
            }
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap_or_default();

            if file_name == "reject.pdf" {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"errors": {"pitch_deck": ["Only PDF files are allowed"]}})),
                )
                    .into_response();
            }

            let mut body = job_json("abc", "uploaded");
            body["message"] = json!(format!("received {} bytes", bytes.len()));
            return (StatusCode::CREATED, Json(body)).into_response();
        }

        (StatusCode::BAD_REQUEST, "missing pitch_deck").into_response()
    }

    async fn list_deals() -> Json<serde_json::Value> {
        Json(json!({
            "count": 2,
            "next": null,
            "previous": null,
            "results": [job_json("b", "processing"), job_json("a", "completed")]
        }))
    }

    async fn get_deal(Path(id): Path<String>) -> Response {
        match id.as_str() {
            "missing" => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
            "boom" => (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response(),
            "garbled" => (StatusCode::OK, "not json").into_response(),
            _ => Json(job_json(&id, "processing")).into_response(),
        }
    }

    async fn get_deal_status(Path(id): Path<String>) -> Json<serde_json::Value> {
        Json(json!({
            "id": id,
            "status": "failed",
            "company_name": null,
            "error_message": "Could not read PDF",
            "processed_at": null
        }))
    }

    async fn spawn_service() -> String {
        let router = Router::new()
            .route("/api/deals/", get(list_deals).post(create_deal))
            .route("/api/deals/{id}/", get(get_deal))
            .route("/api/deals/{id}/status/", get(get_deal_status));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        format!("http://{}/api", addr)
    }

    #[tokio::test]
    async fn test_create_job_uploads_multipart() {
        let client = AnalysisClient::new(spawn_service().await);

        let job = client
            .create_job(DocumentUpload::new("deck.pdf", b"%PDF-1.4 test".to_vec()))
            .await
            .unwrap();

        assert_eq!(job.id, JobId::from("abc"));
        assert_eq!(job.status, JobStatus::Submitted);
    }

    #[tokio::test]
    async fn test_create_job_surfaces_server_validation() {
        let client = AnalysisClient::new(spawn_service().await);

        let err = client
            .create_job(DocumentUpload::new("reject.pdf", b"%PDF-1.4".to_vec()))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ClientError::Validation("pitch_deck: Only PDF files are allowed".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_job_rejects_locally() {
        // Unroutable address: a network attempt would fail differently
        let client = AnalysisClient::new("http://127.0.0.1:1/api");

        let err = client
            .create_job(DocumentUpload::new("deck.docx", b"data".to_vec()))
            .await
            .unwrap_err();

        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_get_job_classifies_failures() {
        let client = AnalysisClient::new(spawn_service().await);

        let job = client.get_job(&JobId::from("xyz")).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.company_name, None);

        let err = client.get_job(&JobId::from("missing")).await.unwrap_err();
        assert_eq!(err, ClientError::NotFound("Not found.".to_string()));

        let err = client.get_job(&JobId::from("boom")).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Server {
                status: 500,
                message: "database unavailable".to_string()
            }
        );
        assert!(err.is_transient());

        let err = client.get_job(&JobId::from("garbled")).await.unwrap_err();
        assert!(matches!(err, ClientError::Parse(_)));
    }

    #[tokio::test]
    async fn test_list_jobs_keeps_server_order() {
        let client = AnalysisClient::new(spawn_service().await);

        let jobs = client.list_jobs().await.unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_get_job_status() {
        let client = AnalysisClient::new(spawn_service().await);

        let summary = client.get_job_status(&JobId::from("xyz")).await.unwrap();
        assert_eq!(summary.id, JobId::from("xyz"));
        assert_eq!(summary.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let client = AnalysisClient::new("http://127.0.0.1:1/api");

        let err = client.get_job(&JobId::from("abc")).await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }
}
