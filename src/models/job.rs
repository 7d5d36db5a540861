//! Job domain models, lifecycle state machine, and DTOs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::progress;

/// Lifecycle phase of an analysis job.
///
/// Phases only move forward along `pending -> crawling -> analyzing -> generating -> completed`.
/// `failed` is reachable from every non-terminal phase and is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Job created, no work started.
    Pending,
    /// Site crawling and element extraction in progress.
    Crawling,
    /// Extracted elements are being turned into test cases.
    Analyzing,
    /// Result documents are being assembled.
    Generating,
    /// Terminal success.
    Completed,
    /// Terminal failure.
    Failed,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::Analyzing => "analyzing",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "crawling" => Some(Self::Crawling),
            "analyzing" => Some(Self::Analyzing),
            "generating" => Some(Self::Generating),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position along the forward path. `Failed` sits outside it.
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Crawling => Some(1),
            Self::Analyzing => Some(2),
            Self::Generating => Some(3),
            Self::Completed => Some(4),
            Self::Failed => None,
        }
    }

    /// Whether a job in this phase may move to `next`.
    pub fn can_transition_to(&self, next: JobPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(target)) => target > current,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected state machine operation. The job is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Illegal phase transition from {from} to {to}")]
    Illegal { from: JobPhase, to: JobPhase },

    #[error("Job is already {0}")]
    Terminal(JobPhase),
}

/// Work counters used to compute progress.
///
/// Every counter is monotonically non-decreasing within a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobCounters {
    pub total_elements: u64,
    pub processed_elements: u64,
    pub total_test_cases: u64,
    pub generated_test_cases: u64,
}

/// Authentication method for the crawled site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Basic,
    Session,
}

/// Credentials forwarded to the crawler as-is.
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// "cookie" or "bearer" for session tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("auth_type", &self.auth_type)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Optional hints about the site under analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WebsiteContext {
    /// Kind of site, e.g. "E-commerce Platform".
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub site_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_goal_on_page: Option<String>,
}

/// One timestamped entry of a job's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Documents produced by a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobResult {
    /// Raw Markdown, one `Test Case ID:` block per test case.
    pub markdown: String,
    /// Structured document built from the same analysis.
    #[schema(value_type = Object)]
    pub json: JsonValue,
}

/// An analysis job and its lifecycle state.
///
/// Only the pipeline mutates a job; everyone else reads [`JobSnapshot`]s.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub url: String,
    pub auth: Option<AuthConfig>,
    pub website_context: Option<WebsiteContext>,
    phase: JobPhase,
    failed_during: Option<JobPhase>,
    counters: JobCounters,
    phase_progress: f64,
    logs: Vec<JobLogEntry>,
    error: Option<String>,
    result: Option<JobResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a job in the `pending` phase.
    pub fn new(
        url: impl Into<String>,
        auth: Option<AuthConfig>,
        website_context: Option<WebsiteContext>,
    ) -> Self {
        let now = Utc::now();
        let url = url.into();
        let created = format!("Job created for {}", url);
        let mut job = Self {
            id: Uuid::now_v7(),
            url,
            auth,
            website_context,
            phase: JobPhase::Pending,
            failed_during: None,
            counters: JobCounters::default(),
            phase_progress: 0.0,
            logs: Vec::new(),
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        };
        job.log(created);
        job
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Phase the job was in when it failed.
    pub fn failed_during(&self) -> Option<JobPhase> {
        self.failed_during
    }

    pub fn counters(&self) -> &JobCounters {
        &self.counters
    }

    pub fn phase_progress(&self) -> f64 {
        self.phase_progress
    }

    pub fn logs(&self) -> &[JobLogEntry] {
        &self.logs
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    /// Append a timestamped entry to the job log.
    pub fn log(&mut self, message: impl Into<String>) {
        let now = Utc::now();
        self.logs.push(JobLogEntry {
            timestamp: now,
            message: message.into(),
        });
        self.updated_at = now;
    }

    fn ensure_active(&self) -> Result<(), TransitionError> {
        if self.phase.is_terminal() {
            return Err(TransitionError::Terminal(self.phase));
        }
        Ok(())
    }

    /// Move to a later working phase. Terminal phases go through
    /// [`Job::complete`] and [`Job::fail`].
    pub fn advance(&mut self, next: JobPhase) -> Result<(), TransitionError> {
        self.ensure_active()?;
        if next.is_terminal() || !self.phase.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                from: self.phase,
                to: next,
            });
        }

        let previous = self.phase;
        self.phase = next;
        self.phase_progress = 0.0;
        self.log(format!("Phase changed: {} -> {}", previous, next));
        Ok(())
    }

    /// Record intra-phase progress (0-100). Lower values than the current one are ignored.
    pub fn set_phase_progress(&mut self, value: f64) -> Result<(), TransitionError> {
        self.ensure_active()?;
        let value = if value.is_finite() {
            value.clamp(0.0, 100.0)
        } else {
            0.0
        };
        if value > self.phase_progress {
            self.phase_progress = value;
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    pub fn set_total_elements(&mut self, total: u64) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.counters.total_elements = self.counters.total_elements.max(total);
        self.sync_analysis_progress();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// While analyzing, `phase_progress` follows the element counters.
    fn sync_analysis_progress(&mut self) {
        if self.phase != JobPhase::Analyzing || self.counters.total_elements == 0 {
            return;
        }
        let ratio = self.counters.processed_elements as f64
            / self.counters.total_elements as f64
            * 100.0;
        self.phase_progress = self.phase_progress.max(ratio.min(100.0));
    }

    /// Count one more processed element. The total grows if it was underestimated.
    pub fn record_processed_element(&mut self) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.counters.processed_elements += 1;
        self.counters.total_elements = self
            .counters
            .total_elements
            .max(self.counters.processed_elements);
        self.sync_analysis_progress();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_total_test_cases(&mut self, total: u64) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.counters.total_test_cases = self.counters.total_test_cases.max(total);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_generated_test_case(&mut self) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.counters.generated_test_cases += 1;
        self.counters.total_test_cases = self
            .counters
            .total_test_cases
            .max(self.counters.generated_test_cases);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Terminal success. The result is stored once and never replaced.
    pub fn complete(&mut self, result: JobResult) -> Result<(), TransitionError> {
        self.ensure_active()?;
        let previous = self.phase;
        self.phase = JobPhase::Completed;
        self.phase_progress = 100.0;
        self.result = Some(result);
        self.log(format!("Phase changed: {} -> {}", previous, JobPhase::Completed));
        Ok(())
    }

    /// Terminal failure. Counters and intra-phase progress are kept for diagnostics.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_active()?;
        let error = error.into();
        self.failed_during = Some(self.phase);
        self.phase = JobPhase::Failed;
        self.log(format!("Job failed: {}", error));
        self.error = Some(error);
        Ok(())
    }

    /// Overall progress in `[0, 100]`.
    pub fn progress_percent(&self) -> f64 {
        match (self.phase, self.failed_during) {
            (JobPhase::Failed, Some(last)) => {
                progress::failed_percent(last, self.phase_progress, &self.counters)
            }
            (phase, _) => progress::overall_percent(phase, self.phase_progress, &self.counters),
        }
    }

    /// Read-only view handed to pollers.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            url: self.url.clone(),
            phase: self.phase,
            failed_during: self.failed_during,
            counters: self.counters,
            phase_progress: self.phase_progress,
            progress_percent: self.progress_percent(),
            logs: self.logs.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id,
            url: self.url.clone(),
            phase: self.phase,
            progress_percent: self.progress_percent(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Job status snapshot returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub url: String,
    pub phase: JobPhase,
    /// Phase the job was in when it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_during: Option<JobPhase>,
    pub counters: JobCounters,
    pub phase_progress: f64,
    /// Overall progress in `[0, 100]`.
    pub progress_percent: f64,
    pub logs: Vec<JobLogEntry>,
    /// Error message if failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to start a new analysis job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateJobRequest {
    /// Target URL (http or https).
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_context: Option<WebsiteContext>,
}

impl CreateJobRequest {
    /// Validate the request, returning the rejection reason if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err("url must not be empty".to_string());
        }

        let parsed =
            reqwest::Url::parse(url).map_err(|e| format!("url '{}' is invalid: {}", url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(format!(
                "url scheme '{}' is not supported, use http or https",
                parsed.scheme()
            ));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(format!("url '{}' has no host", url));
        }

        if let Some(auth) = &self.auth {
            match auth.auth_type {
                AuthType::Basic if auth.username.is_none() || auth.password.is_none() => {
                    return Err("basic auth requires username and password".to_string());
                }
                AuthType::Session if auth.token.is_none() => {
                    return Err("session auth requires a token".to_string());
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Response after creating a job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateJobResponse {
    /// Job UUID (UUIDv7, time-ordered).
    pub job_id: Uuid,
    pub phase: JobPhase,
    pub created_at: DateTime<Utc>,
}

/// Job summary for list responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub url: String,
    pub phase: JobPhase,
    pub progress_percent: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job list response with pagination.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<JobSummary>,
    /// Total number of jobs matching the filter.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Query parameters for listing jobs.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QueryJobsParams {
    /// Filter by phase.
    #[serde(default)]
    pub phase: Option<JobPhase>,
    /// Maximum results to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination.
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

impl QueryJobsParams {
    /// Clamp limit to the maximum allowed value.
    pub fn clamped_limit(&self) -> usize {
        self.limit.clamp(1, 100)
    }
}
