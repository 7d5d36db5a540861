//! Polling coordinator.
//!
//! A [`JobPoller`] watches one job until it reaches a terminal phase. It owns
//! all of its state, never writes to the job, and stops on cancellation.
//!
//! - Snapshots are fetched on a fixed interval; the first fetch is immediate.
//! - Fetch errors are logged and retried on the next tick.
//! - A snapshot whose phase moves backwards is logged and ignored.
//! - On `completed` the results are fetched exactly once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{JobPhase, JobResult, JobSnapshot};

/// Default time between two status fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Shortest accepted interval; shorter ones are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Errors from a [`JobSource`].
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Results for job {0} are not available yet")]
    NotReady(Uuid),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// Read-only access to job state, local or remote.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn fetch_job(&self, job_id: Uuid) -> Result<JobSnapshot, PollError>;

    async fn fetch_results(&self, job_id: Uuid) -> Result<JobResult, PollError>;
}

/// How a poll loop ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// The job completed and its results were fetched.
    Completed {
        snapshot: JobSnapshot,
        result: JobResult,
    },
    /// The job completed but fetching its results failed.
    ResultsUnavailable {
        snapshot: JobSnapshot,
        error: PollError,
    },
    /// The job failed. `snapshot` keeps the progress reached before failing.
    Failed {
        snapshot: JobSnapshot,
        error: String,
    },
    /// Cancelled before a terminal phase was observed.
    Cancelled { last: Option<JobSnapshot> },
}

/// Watches a single job until it finishes.
pub struct JobPoller {
    job_id: Uuid,
    source: Arc<dyn JobSource>,
    interval: Duration,
    cancel: CancellationToken,
    updates: watch::Sender<Option<JobSnapshot>>,
    last_seen: Option<JobSnapshot>,
}

impl JobPoller {
    pub fn new(job_id: Uuid, source: Arc<dyn JobSource>, interval: Duration) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            job_id,
            source,
            interval: interval.max(MIN_POLL_INTERVAL),
            cancel: CancellationToken::new(),
            updates,
            last_seen: None,
        }
    }

    /// Token that stops this poller when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Receiver of every accepted snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<JobSnapshot>> {
        self.updates.subscribe()
    }

    /// Run the poll loop on a new task.
    pub fn spawn(self) -> PollHandle {
        let cancel = self.cancel.clone();
        let updates = self.subscribe();
        let task = tokio::spawn(self.run());
        PollHandle {
            cancel,
            updates,
            task,
        }
    }

    /// Poll until the job is terminal or the poller is cancelled.
    pub async fn run(mut self) -> PollOutcome {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(),
                _ = ticker.tick() => {}
            }

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(),
                fetched = self.source.fetch_job(self.job_id) => fetched,
            };

            let snapshot = match fetched {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(job_id = %self.job_id, error = %e, "Job poll failed, retrying");
                    continue;
                }
            };

            if !self.accept(&snapshot) {
                continue;
            }

            match snapshot.phase {
                JobPhase::Completed => return self.fetch_results(snapshot).await,
                JobPhase::Failed => {
                    let error = snapshot
                        .error
                        .clone()
                        .unwrap_or_else(|| "Job failed without an error message".to_string());
                    info!(
                        job_id = %self.job_id,
                        progress = snapshot.progress_percent,
                        error = %error,
                        "Job failed"
                    );
                    return PollOutcome::Failed { snapshot, error };
                }
                _ => {}
            }
        }
    }

    /// Record `snapshot` unless it moves the phase backwards.
    fn accept(&mut self, snapshot: &JobSnapshot) -> bool {
        if let Some(previous) = &self.last_seen {
            if previous.phase != snapshot.phase && !previous.phase.can_transition_to(snapshot.phase)
            {
                warn!(
                    job_id = %self.job_id,
                    from = %previous.phase,
                    to = %snapshot.phase,
                    "Ignoring phase regression"
                );
                return false;
            }
            if previous.phase != snapshot.phase {
                info!(job_id = %self.job_id, phase = %snapshot.phase, "Job phase changed");
            }
        }

        self.last_seen = Some(snapshot.clone());
        self.updates.send_replace(Some(snapshot.clone()));
        true
    }

    async fn fetch_results(&self, snapshot: JobSnapshot) -> PollOutcome {
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return PollOutcome::Cancelled { last: Some(snapshot) },
            fetched = self.source.fetch_results(self.job_id) => fetched,
        };

        match fetched {
            Ok(result) => PollOutcome::Completed { snapshot, result },
            Err(error) => {
                warn!(job_id = %self.job_id, error = %error, "Fetching job results failed");
                PollOutcome::ResultsUnavailable { snapshot, error }
            }
        }
    }

    fn cancelled(&self) -> PollOutcome {
        info!(job_id = %self.job_id, "Job polling cancelled");
        PollOutcome::Cancelled {
            last: self.last_seen.clone(),
        }
    }
}

/// Handle to a spawned [`JobPoller`].
pub struct PollHandle {
    cancel: CancellationToken,
    updates: watch::Receiver<Option<JobSnapshot>>,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// Stop polling. The job itself is not touched.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn updates(&self) -> watch::Receiver<Option<JobSnapshot>> {
        self.updates.clone()
    }

    /// Wait for the loop to finish.
    pub async fn outcome(self) -> Result<PollOutcome, tokio::task::JoinError> {
        self.task.await
    }
}
