//! Job queries.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Job, JobPhase, TransitionError};

use super::JobStore;

impl JobStore {
    /// Insert a new job.
    pub async fn insert_job(&self, job: Job) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(AppError::Internal(format!("Job {} already exists", job.id)));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    /// Get a copy of a job by ID.
    pub async fn get_job(&self, id: Uuid) -> AppResult<Option<Job>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    /// Get a copy of a job by ID, or `NotFound`.
    pub async fn require_job(&self, id: Uuid) -> AppResult<Job> {
        self.get_job(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))
    }

    /// List jobs newest first, optionally filtered by phase.
    ///
    /// Returns the requested page and the total number of matching jobs.
    pub async fn list_jobs(
        &self,
        phase: Option<JobPhase>,
        limit: usize,
        offset: usize,
    ) -> AppResult<(Vec<Job>, usize)> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<&Job> = jobs
            .values()
            .filter(|job| phase.is_none_or(|p| job.phase() == p))
            .collect();
        // UUIDv7 is time-ordered; the id breaks ties between equal timestamps
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    /// Delete completed and failed jobs last updated before `cutoff`.
    ///
    /// Returns the number of jobs removed. Active jobs are never removed.
    pub async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !(job.phase().is_terminal() && job.updated_at < cutoff));
        Ok(before - jobs.len())
    }

    /// Apply `update` to a job under the write lock.
    ///
    /// A rejected update leaves the job as it was.
    pub async fn update_job<T>(
        &self,
        id: Uuid,
        update: impl FnOnce(&mut Job) -> Result<T, TransitionError>,
    ) -> AppResult<T> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))?;

        let mut draft = job.clone();
        let value = update(&mut draft)?;
        *job = draft;
        Ok(value)
    }
}
