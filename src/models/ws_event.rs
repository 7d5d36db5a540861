//! WebSocket event types for real-time job updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::{Job, JobCounters, JobPhase};

/// WebSocket event sent to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum WsEvent {
    /// A new job was submitted.
    JobCreated(JobCreatedPayload),
    /// A job moved to a new working phase.
    PhaseChanged(JobProgressPayload),
    /// Counters or intra-phase progress changed.
    ProgressUpdated(JobProgressPayload),
    /// A job finished successfully.
    JobCompleted(JobCompletedPayload),
    /// A job failed.
    JobFailed(JobFailedPayload),
}

/// Payload for job_created event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreatedPayload {
    pub job_id: Uuid,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Payload for phase_changed and progress_updated events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgressPayload {
    pub job_id: Uuid,
    pub phase: JobPhase,
    pub progress_percent: f64,
    pub counters: JobCounters,
}

/// Payload for job_completed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCompletedPayload {
    pub job_id: Uuid,
    pub test_case_count: u64,
}

/// Payload for job_failed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailedPayload {
    pub job_id: Uuid,
    pub error: String,
    /// Progress frozen at the point of failure.
    pub progress_percent: f64,
}

/// Wrapper that includes timestamp with every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEventMessage {
    #[serde(flatten)]
    pub event: WsEvent,
    pub timestamp: DateTime<Utc>,
}

impl WsEventMessage {
    /// Create a new event message with the current timestamp.
    pub fn new(event: WsEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

impl WsEvent {
    pub fn job_created(job: &Job) -> Self {
        WsEvent::JobCreated(JobCreatedPayload {
            job_id: job.id,
            url: job.url.clone(),
            created_at: job.created_at,
        })
    }

    pub fn phase_changed(job: &Job) -> Self {
        WsEvent::PhaseChanged(Self::progress_payload(job))
    }

    pub fn progress_updated(job: &Job) -> Self {
        WsEvent::ProgressUpdated(Self::progress_payload(job))
    }

    fn progress_payload(job: &Job) -> JobProgressPayload {
        JobProgressPayload {
            job_id: job.id,
            phase: job.phase(),
            progress_percent: job.progress_percent(),
            counters: *job.counters(),
        }
    }

    /// Build the terminal event for a finished job, if it is finished.
    pub fn terminal(job: &Job) -> Option<Self> {
        match job.phase() {
            JobPhase::Completed => Some(WsEvent::JobCompleted(JobCompletedPayload {
                job_id: job.id,
                test_case_count: job.counters().generated_test_cases,
            })),
            JobPhase::Failed => Some(WsEvent::JobFailed(JobFailedPayload {
                job_id: job.id,
                error: job.error().unwrap_or_default().to_string(),
                progress_percent: job.progress_percent(),
            })),
            _ => None,
        }
    }

    /// Job the event refers to.
    pub fn job_id(&self) -> Uuid {
        match self {
            WsEvent::JobCreated(p) => p.job_id,
            WsEvent::PhaseChanged(p) | WsEvent::ProgressUpdated(p) => p.job_id,
            WsEvent::JobCompleted(p) => p.job_id,
            WsEvent::JobFailed(p) => p.job_id,
        }
    }
}
