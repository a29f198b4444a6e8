//! Job domain types
//!
//! A job is one submitted pitch deck and its analysis lifecycle. The service
//! calls it a "deal"; the wire field names follow the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assessment::Assessment;
use super::serde_helpers::{blank_as_none, null_as_empty};

/// Opaque job identifier assigned by the analysis service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId(s)
    }
}

/// Snapshot of a job as last reported by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,

    #[serde(default, deserialize_with = "blank_as_none")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub technology_description: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub funding_ask: Option<String>,

    /// Founders and key people extracted from the deck
    #[serde(default, rename = "founders")]
    pub people: Vec<Person>,

    #[serde(default)]
    pub assessment: Option<Assessment>,

    #[serde(default, deserialize_with = "blank_as_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Job processing status
///
/// Variants are declared in lifecycle order; see [`JobStatus::rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    /// The service reports this state as `uploaded`
    #[serde(alias = "uploaded")]
    Submitted,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Submitted,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// Position along `pending -> submitted -> processing -> completed|failed`
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Submitted => 1,
            JobStatus::Processing => 2,
            JobStatus::Completed | JobStatus::Failed => 3,
        }
    }

    /// Terminal jobs are never polled again
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` goes backwards in the lifecycle
    pub fn is_regression_to(self, next: JobStatus) -> bool {
        next.rank() < self.rank() || (self.is_terminal() && next.is_terminal() && self != next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Submitted => "submitted",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "Pending"),
            JobStatus::Submitted => write!(f, "Submitted"),
            JobStatus::Processing => write!(f, "Processing"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// A person named in the deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,

    /// Role or title, e.g. "CEO"
    #[serde(default, alias = "role", deserialize_with = "null_as_empty")]
    pub title: String,

    /// Education and prior experience
    #[serde(default, deserialize_with = "null_as_empty")]
    pub background: String,

    #[serde(default, deserialize_with = "blank_as_none")]
    pub linkedin_url: Option<String>,

    /// Position in the deck
    #[serde(default)]
    pub order: i32,
}

/// Company information extracted from the deck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedFields<'a> {
    pub company_name: Option<&'a str>,
    pub website: Option<&'a str>,
    pub location: Option<&'a str>,
    pub description: Option<&'a str>,
    pub funding_ask: Option<&'a str>,
}

/// A snapshot that breaks one of the status/payload pairing rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyIssue {
    /// An assessment is attached before the job completed
    PrematureAssessment,
    /// The job completed but the service sent no assessment
    MissingAssessment,
    /// The job failed without saying why
    MissingErrorMessage,
    /// An error message is attached to a job that has not failed
    UnexpectedErrorMessage,
    /// A score lies outside 1..=10
    ScoreOutOfRange,
}

impl std::fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyIssue::PrematureAssessment => {
                write!(f, "assessment present before completion")
            }
            ConsistencyIssue::MissingAssessment => write!(f, "completed without an assessment"),
            ConsistencyIssue::MissingErrorMessage => write!(f, "failed without an error message"),
            ConsistencyIssue::UnexpectedErrorMessage => {
                write!(f, "error message present on a job that has not failed")
            }
            ConsistencyIssue::ScoreOutOfRange => write!(f, "assessment score outside 1..=10"),
        }
    }
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns the extracted company fields, or `None` before extraction ran
    pub fn extracted_fields(&self) -> Option<ExtractedFields<'_>> {
        let fields = ExtractedFields {
            company_name: self.company_name.as_deref(),
            website: self.website.as_deref(),
            location: self.location.as_deref(),
            description: self.technology_description.as_deref(),
            funding_ask: self.funding_ask.as_deref(),
        };

        let any = fields.company_name.is_some()
            || fields.website.is_some()
            || fields.location.is_some()
            || fields.description.is_some()
            || fields.funding_ask.is_some();

        any.then_some(fields)
    }

    /// People in deck order
    pub fn people_in_order(&self) -> Vec<&Person> {
        let mut people: Vec<&Person> = self.people.iter().collect();
        people.sort_by_key(|p| p.order);
        people
    }

    /// Name to show for the job, falling back while extraction is pending
    pub fn display_name(&self) -> &str {
        self.company_name.as_deref().unwrap_or("Processing...")
    }

    /// Checks the pairing of status with assessment and error message
    ///
    /// Violations are reported, never rejected: the service is the source of
    /// truth and renderers must cope with whatever it sends.
    pub fn consistency_issues(&self) -> Vec<ConsistencyIssue> {
        let mut issues = Vec::new();

        match (self.status, self.assessment.is_some()) {
            (JobStatus::Completed, false) => issues.push(ConsistencyIssue::MissingAssessment),
            (status, true) if status != JobStatus::Completed => {
                issues.push(ConsistencyIssue::PrematureAssessment)
            }
            _ => {}
        }

        match (self.status, self.error_message.is_some()) {
            (JobStatus::Failed, false) => issues.push(ConsistencyIssue::MissingErrorMessage),
            (status, true) if status != JobStatus::Failed => {
                issues.push(ConsistencyIssue::UnexpectedErrorMessage)
            }
            _ => {}
        }

        if self.assessment.as_ref().is_some_and(|a| !a.scores_in_range()) {
            issues.push(ConsistencyIssue::ScoreOutOfRange);
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail_json() -> serde_json::Value {
        serde_json::json!({
            "id": "7b1f0c2e-8d7a-4f43-9a55-1b2c3d4e5f60",
            "status": "completed",
            "company_name": "Acme Robotics",
            "website": "https://acme.example",
            "location": "Berlin",
            "technology_description": "Warehouse picking robots",
            "funding_ask": "$2M seed",
            "founders": [
                {"id": "2", "name": "Bo", "title": "CTO", "background": "", "linkedin_url": "", "order": 1},
                {"id": "1", "name": "Al", "title": "CEO", "background": "Ex-Google", "linkedin_url": "https://linkedin.com/in/al", "order": 0}
            ],
            "assessment": {
                "team_strength": 8,
                "market_opportunity": 7,
                "product_innovation": 6,
                "business_model": 7,
                "overall_score": 7.0,
                "strengths": ["Team"],
                "concerns": ["Capex"],
                "investment_thesis": "Solid."
            },
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:02:00Z",
            "processed_at": "2024-05-01T10:02:00Z",
            "error_message": ""
        })
    }

    #[test]
    fn test_decode_detail_payload() {
        let job: Job = serde_json::from_value(detail_json()).unwrap();

        assert_eq!(job.id.as_str(), "7b1f0c2e-8d7a-4f43-9a55-1b2c3d4e5f60");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.error_message, None);
        assert_eq!(job.people.len(), 2);
        assert_eq!(job.people[0].linkedin_url, None);
        assert!(job.assessment.is_some());
        assert!(job.consistency_issues().is_empty());

        let names: Vec<&str> = job.people_in_order().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Al", "Bo"]);
    }

    #[test]
    fn test_decode_creation_response() {
        // Creation answers with a partial body
        let json = serde_json::json!({
            "id": "abc",
            "status": "uploaded",
            "message": "Pitch deck uploaded successfully. Processing started.",
            "task_id": "celery-1",
            "created_at": "2024-05-01T10:00:00Z"
        });

        let job: Job = serde_json::from_value(json).unwrap();
        assert_eq!(job.id, JobId::from("abc"));
        assert_eq!(job.status, JobStatus::Submitted);
        assert!(job.extracted_fields().is_none());
        assert!(job.people.is_empty());
        assert_eq!(job.display_name(), "Processing...");
        assert_eq!(job.updated_at, None);
    }

    #[test]
    fn test_status_wire_names() {
        for status in JobStatus::ALL {
            let encoded = serde_json::to_value(status).unwrap();
            assert_eq!(encoded, serde_json::json!(status.as_str()));
        }
        let status: JobStatus = serde_json::from_str("\"submitted\"").unwrap();
        assert_eq!(status, JobStatus::Submitted);
        assert!(serde_json::from_str::<JobStatus>("\"archived\"").is_err());
    }

    #[test]
    fn test_status_ordering() {
        assert!(JobStatus::Pending.rank() < JobStatus::Submitted.rank());
        assert!(JobStatus::Submitted.rank() < JobStatus::Processing.rank());
        assert_eq!(JobStatus::Completed.rank(), JobStatus::Failed.rank());

        assert!(JobStatus::Processing.is_regression_to(JobStatus::Submitted));
        assert!(JobStatus::Completed.is_regression_to(JobStatus::Failed));
        assert!(!JobStatus::Submitted.is_regression_to(JobStatus::Processing));
        assert!(!JobStatus::Processing.is_regression_to(JobStatus::Processing));

        let terminal: Vec<_> = JobStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&JobStatus::Completed, &JobStatus::Failed]);
    }

    #[test]
    fn test_consistency_issues() {
        let mut job: Job = serde_json::from_value(detail_json()).unwrap();

        job.assessment = None;
        assert_eq!(
            job.consistency_issues(),
            vec![ConsistencyIssue::MissingAssessment]
        );

        job.status = JobStatus::Failed;
        assert_eq!(
            job.consistency_issues(),
            vec![ConsistencyIssue::MissingErrorMessage]
        );

        job.error_message = Some("PDF could not be parsed".to_string());
        assert!(job.consistency_issues().is_empty());

        job.status = JobStatus::Processing;
        assert_eq!(
            job.consistency_issues(),
            vec![ConsistencyIssue::UnexpectedErrorMessage]
        );
    }

    #[test]
    fn test_consistency_issues_flags_out_of_range_scores() {
        let mut job: Job = serde_json::from_value(detail_json()).unwrap();
        assert!(job.consistency_issues().is_empty());

        if let Some(assessment) = job.assessment.as_mut() {
            assessment.team_strength = 12;
        }
        assert_eq!(
            job.consistency_issues(),
            vec![ConsistencyIssue::ScoreOutOfRange]
        );
    }

    #[test]
    fn test_extracted_fields_partial() {
        let mut job: Job = serde_json::from_value(detail_json()).unwrap();
        job.website = None;
        job.funding_ask = None;

        let fields = job.extracted_fields().unwrap();
        assert_eq!(fields.company_name, Some("Acme Robotics"));
        assert_eq!(fields.website, None);
        assert_eq!(fields.description, Some("Warehouse picking robots"));
    }
}
