//! [`JobSource`] implementations.
//!
//! The in-process [`JobStore`] serves pollers running inside the server;
//! [`HttpJobSource`] talks to a server over its REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use uuid::Uuid;

use super::poller::{JobSource, PollError};
use crate::db::JobStore;
use crate::error::ErrorResponse;
use crate::models::{CreateJobRequest, CreateJobResponse, JobPhase, JobResult, JobSnapshot};

#[async_trait]
impl JobSource for JobStore {
    async fn fetch_job(&self, job_id: Uuid) -> Result<JobSnapshot, PollError> {
        self.get_job(job_id)
            .await
            .map_err(|e| PollError::Transport(e.to_string()))?
            .map(|job| job.snapshot())
            .ok_or(PollError::NotFound(job_id))
    }

    async fn fetch_results(&self, job_id: Uuid) -> Result<JobResult, PollError> {
        let job = self
            .get_job(job_id)
            .await
            .map_err(|e| PollError::Transport(e.to_string()))?
            .ok_or(PollError::NotFound(job_id))?;

        match (job.phase(), job.result()) {
            (JobPhase::Completed, Some(result)) => Ok(result.clone()),
            _ => Err(PollError::NotReady(job_id)),
        }
    }
}

/// HTTP timeouts for the REST client.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a remote server's job API.
#[derive(Clone)]
pub struct HttpJobSource {
    api_base: String,
    http_client: reqwest::Client,
}

impl HttpJobSource {
    /// `server_url` is the server root, e.g. `http://127.0.0.1:8080`.
    pub fn new(server_url: &str) -> Result<Self, PollError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PollError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_base: format!("{}/api/v1", server_url.trim_end_matches('/')),
            http_client,
        })
    }

    /// Submit a new job.
    pub async fn submit_job(
        &self,
        request: &CreateJobRequest,
    ) -> Result<CreateJobResponse, PollError> {
        let url = format!("{}/jobs", self.api_base);
        debug!(%url, "Submitting job");
        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(PollError::InvalidResponse(error_message(response).await));
        }
        response.json().await.map_err(invalid)
    }

    async fn get(&self, job_id: Uuid, path: &str) -> Result<reqwest::Response, PollError> {
        let url = format!("{}/jobs/{}/{}", self.api_base, job_id, path);
        debug!(%url, "Fetching");
        self.http_client.get(&url).send().await.map_err(transport)
    }
}

#[async_trait]
impl JobSource for HttpJobSource {
    async fn fetch_job(&self, job_id: Uuid) -> Result<JobSnapshot, PollError> {
        let response = self.get(job_id, "status").await?;
        match response.status() {
            status if status.is_success() => response.json().await.map_err(invalid),
            StatusCode::NOT_FOUND => Err(PollError::NotFound(job_id)),
            _ => Err(PollError::Transport(error_message(response).await)),
        }
    }

    async fn fetch_results(&self, job_id: Uuid) -> Result<JobResult, PollError> {
        let response = self.get(job_id, "results").await?;
        match response.status() {
            status if status.is_success() => response.json().await.map_err(invalid),
            StatusCode::NOT_FOUND => Err(PollError::NotFound(job_id)),
            StatusCode::CONFLICT => Err(PollError::NotReady(job_id)),
            _ => Err(PollError::Transport(error_message(response).await)),
        }
    }
}

fn transport(e: reqwest::Error) -> PollError {
    PollError::Transport(e.to_string())
}

fn invalid(e: reqwest::Error) -> PollError {
    PollError::InvalidResponse(e.to_string())
}

/// `"<status>: <message>"`, using the server's error body when it has one.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) => format!("{}: {}", status, body),
        Err(_) => status.to_string(),
    }
}
