//! Scripted in-memory transport and helpers shared by the tracker tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use deckwatch_client::{ClientError, DocumentUpload, JobTransport, Result};
use deckwatch_core::domain::assessment::Assessment;
use deckwatch_core::domain::job::{Job, JobId, JobStatus, Person};
use deckwatch_core::dto::job::JobStatusSummary;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::binder::{JobSurface, ListSurface};
use crate::store::{JobView, ListView};

/// Minimal snapshot with the given id and status
pub(crate) fn job(id: &str, status: JobStatus) -> Job {
    Job {
        id: JobId::from(id),
        status,
        company_name: None,
        website: None,
        location: None,
        technology_description: None,
        funding_ask: None,
        people: Vec::new(),
        assessment: None,
        error_message: None,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        updated_at: None,
        processed_at: None,
    }
}

/// Completed snapshot as the detail endpoint returns it
pub(crate) fn analysed_job(id: &str) -> Job {
    let mut job = job(id, JobStatus::Completed);
    job.company_name = Some("Acme Robotics".to_string());
    job.website = Some("https://acme.example".to_string());
    job.people.push(Person {
        name: "Ada Lovelace".to_string(),
        title: "CEO".to_string(),
        background: "Previously at Analytical Engines".to_string(),
        linkedin_url: None,
        order: 0,
    });
    job.assessment = Some(Assessment {
        team_strength: 8,
        market_opportunity: 7,
        product_innovation: 9,
        business_model: 6,
        overall_score: 7.5,
        strengths: vec!["Experienced team".to_string()],
        concerns: vec!["Crowded market".to_string()],
        investment_thesis: "Worth a second meeting".to_string(),
    });
    job.processed_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 2, 0).unwrap());
    job
}

/// Row as the list endpoint returns it: no founders, website or assessment
pub(crate) fn list_row(id: &str, status: JobStatus) -> Job {
    let mut job = job(id, status);
    job.company_name = Some("Acme Robotics".to_string());
    job
}

/// Replays scripted responses in order; the last one repeats forever
///
/// Ids with no script answer `NotFound`. A gated transport holds every
/// request after recording it until [`ScriptedTransport::open_gate`].
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    jobs: Mutex<HashMap<JobId, VecDeque<Result<Job>>>>,
    lists: Mutex<VecDeque<Result<Vec<Job>>>>,
    creates: Mutex<VecDeque<Result<Job>>>,
    get_calls: Mutex<Vec<(JobId, Instant)>>,
    list_calls: Mutex<Vec<Instant>>,
    gate: Option<Semaphore>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub(crate) fn script_job(&self, id: &str, responses: Vec<Result<Job>>) {
        self.jobs
            .lock()
            .unwrap()
            .insert(JobId::from(id), responses.into());
    }

    pub(crate) fn script_list(&self, responses: Vec<Result<Vec<Job>>>) {
        *self.lists.lock().unwrap() = responses.into();
    }

    pub(crate) fn script_create(&self, responses: Vec<Result<Job>>) {
        *self.creates.lock().unwrap() = responses.into();
    }

    pub(crate) fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1 << 20);
        }
    }

    pub(crate) fn get_calls(&self, id: &JobId) -> usize {
        self.get_call_times(id).len()
    }

    pub(crate) fn get_call_times(&self, id: &JobId) -> Vec<Instant> {
        self.get_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| called == id)
            .map(|(_, at)| *at)
            .collect()
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.lock().unwrap().len()
    }

    pub(crate) fn list_call_times(&self) -> Vec<Instant> {
        self.list_calls.lock().unwrap().clone()
    }

    /// Waits until at least `n` job fetches have been issued
    ///
    /// Sleeps rather than yields so a paused clock can advance meanwhile.
    pub(crate) async fn wait_for_get_calls(&self, n: usize) {
        while self.get_calls.lock().unwrap().len() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
    }

    fn next<T: Clone>(queue: &mut VecDeque<Result<T>>) -> Option<Result<T>> {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl JobTransport for ScriptedTransport {
    async fn create_job(&self, upload: DocumentUpload) -> Result<Job> {
        upload.validate(deckwatch_client::DEFAULT_MAX_UPLOAD_BYTES)?;
        let response = Self::next(&mut self.creates.lock().unwrap());
        response.unwrap_or_else(|| Err(ClientError::Internal("no create scripted".to_string())))
    }

    async fn get_job(&self, id: &JobId) -> Result<Job> {
        self.get_calls
            .lock()
            .unwrap()
            .push((id.clone(), Instant::now()));
        self.pass_gate().await;

        let response = self
            .jobs
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(|queue| Self::next(queue));
        response.unwrap_or_else(|| Err(ClientError::NotFound("Not found.".to_string())))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.list_calls.lock().unwrap().push(Instant::now());
        self.pass_gate().await;

        let response = Self::next(&mut self.lists.lock().unwrap());
        response.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_job_status(&self, id: &JobId) -> Result<JobStatusSummary> {
        let job = self.get_job(id).await?;
        Ok(JobStatusSummary {
            id: job.id,
            status: job.status,
            company_name: job.company_name,
            error_message: job.error_message,
            processed_at: job.processed_at,
        })
    }
}

/// Surface that keeps every view it was asked to render
#[derive(Default)]
pub(crate) struct RecordingSurface {
    jobs: Mutex<Vec<JobView>>,
    lists: Mutex<Vec<ListView>>,
}

impl RecordingSurface {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn job_renders(&self) -> Vec<JobView> {
        self.jobs.lock().unwrap().clone()
    }

    pub(crate) fn list_renders(&self) -> Vec<ListView> {
        self.lists.lock().unwrap().clone()
    }

    /// Statuses rendered so far, skipping loading and notice-only views
    pub(crate) fn statuses(&self) -> Vec<JobStatus> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter_map(|view| view.job.as_ref().map(|job| job.status))
            .collect()
    }
}

impl JobSurface for RecordingSurface {
    fn render(&self, view: &JobView) {
        self.jobs.lock().unwrap().push(view.clone());
    }
}

impl ListSurface for RecordingSurface {
    fn render(&self, view: &ListView) {
        self.lists.lock().unwrap().push(view.clone());
    }
}
