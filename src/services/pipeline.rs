//! Job pipeline.
//!
//! One task per job walks it through crawling, analyzing and generating.
//! The pipeline is the only writer of job state; every change goes through
//! the [`JobStore`] and is broadcast as a [`WsEvent`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::collaborators::{CollaboratorError, SiteCrawler, TestCaseWriter, with_timeout};
use super::document::{AnalysisOutcome, render_result};
use super::event_broadcaster::EventBroadcaster;
use crate::db::JobStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateJobRequest, Job, JobPhase, TransitionError, UiElement, WebsiteContext, WsEvent,
};

/// Limits applied to every job.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Bound on each collaborator call.
    pub step_timeout: Duration,
    /// Concurrent writer calls within one job.
    pub analyze_concurrency: usize,
    /// Jobs allowed to run at once; the rest wait in `pending`.
    pub max_concurrent_jobs: usize,
}

/// Errors that end a pipeline run. Each becomes the job's `error`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Crawling failed: {0}")]
    Crawl(#[source] CollaboratorError),

    #[error("Analysis failed: all {attempted} test case writer calls failed, last error: {last}")]
    Analysis {
        attempted: usize,
        last: CollaboratorError,
    },

    #[error("Document generation failed: {0}")]
    Render(#[from] serde_json::Error),

    #[error("Job store error: {0}")]
    Store(#[from] AppError),

    #[error("Pipeline is shutting down")]
    Shutdown,
}

/// Runs analysis jobs against the configured collaborators.
#[derive(Clone)]
pub struct Pipeline {
    store: JobStore,
    crawler: Arc<dyn SiteCrawler>,
    writer: Arc<dyn TestCaseWriter>,
    broadcaster: EventBroadcaster,
    settings: PipelineSettings,
    permits: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(
        store: JobStore,
        crawler: Arc<dyn SiteCrawler>,
        writer: Arc<dyn TestCaseWriter>,
        broadcaster: EventBroadcaster,
        settings: PipelineSettings,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1)));
        Self {
            store,
            crawler,
            writer,
            broadcaster,
            settings,
            permits,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// Validate and store a new job, then start its pipeline in the background.
    pub async fn submit(&self, request: CreateJobRequest) -> AppResult<Job> {
        request.validate().map_err(AppError::InvalidInput)?;

        let job = Job::new(
            request.url.trim(),
            request.auth,
            request.website_context,
        );
        self.store.insert_job(job.clone()).await?;
        self.broadcaster.publish(WsEvent::job_created(&job));
        info!(job_id = %job.id, url = %job.url, "Job submitted");

        self.spawn(job.id);
        Ok(job)
    }

    /// Run the pipeline for an already stored job on a new task.
    pub fn spawn(&self, job_id: Uuid) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run(job_id).await })
    }

    /// Run the pipeline to a terminal phase. Any error fails the job.
    pub async fn run(&self, job_id: Uuid) {
        let started = std::time::Instant::now();
        match self.execute(job_id).await {
            Ok(()) => info!(
                job_id = %job_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job completed"
            ),
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Job failed");
                self.fail_job(job_id, e.to_string()).await;
            }
        }
    }

    async fn execute(&self, job_id: Uuid) -> Result<(), PipelineError> {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::Shutdown)?;

        let job = self.store.require_job(job_id).await?;

        // Crawling
        self.transition(job_id, JobPhase::Crawling).await?;
        let crawl = with_timeout(
            "crawl",
            self.settings.step_timeout,
            self.crawler.crawl(&job.url, job.auth.as_ref()),
        )
        .await
        .map_err(PipelineError::Crawl)?;

        let element_count = crawl.elements.len() as u64;
        self.update(job_id, |job| {
            job.set_total_elements(element_count)?;
            job.set_phase_progress(100.0)?;
            job.log(format!(
                "Found {} interactive elements on '{}'",
                element_count, crawl.page_title
            ));
            Ok(())
        })
        .await?;

        let context = page_context(job.website_context.clone(), &crawl.page_title);

        // Analyzing
        self.transition(job_id, JobPhase::Analyzing).await?;
        let blocks = self
            .analyze(job_id, &crawl.elements, context.as_ref())
            .await?;

        // Generating
        self.transition(job_id, JobPhase::Generating).await?;
        let block_count = blocks.len() as u64;
        self.update(job_id, |job| job.set_total_test_cases(block_count))
            .await?;
        for generated in 1..=block_count {
            self.update(job_id, |job| {
                job.record_generated_test_case()?;
                job.set_phase_progress(generated as f64 / block_count as f64 * 100.0)
            })
            .await?;
        }

        let outcome = AnalysisOutcome {
            source_url: job.url.clone(),
            analysis_timestamp: Utc::now(),
            page_title: crawl.page_title,
            website_context: context,
            elements: crawl.elements,
            blocks,
        };
        let result = render_result(&outcome)?;

        let completed = self
            .store
            .update_job(job_id, |job| {
                job.complete(result)?;
                Ok(job.clone())
            })
            .await?;
        if let Some(event) = WsEvent::terminal(&completed) {
            self.broadcaster.publish(event);
        }
        Ok(())
    }

    /// Write one test case block per element.
    ///
    /// A failed element is logged and skipped; it still counts as processed.
    /// The phase fails only when every element failed.
    async fn analyze(
        &self,
        job_id: Uuid,
        elements: &[UiElement],
        context: Option<&WebsiteContext>,
    ) -> Result<Vec<String>, PipelineError> {
        let timeout = self.settings.step_timeout;
        let writes: Vec<_> = elements
            .iter()
            .enumerate()
            .map(|(index, element)| async move {
                let written = with_timeout(
                    "test case writing",
                    timeout,
                    self.writer.write_test_case(element, context),
                )
                .await;
                (index, element, written)
            })
            .collect();
        let mut pending =
            stream::iter(writes).buffer_unordered(self.settings.analyze_concurrency.max(1));

        let mut blocks = Vec::with_capacity(elements.len());
        let mut last_error = None;

        while let Some((index, element, written)) = pending.next().await {
            let message = match written {
                Ok(markdown) => {
                    debug!(job_id = %job_id, element = %element.element_id, "Test case written");
                    blocks.push((index, markdown));
                    None
                }
                Err(e) => {
                    warn!(
                        job_id = %job_id,
                        element = %element.element_id,
                        error = %e,
                        "Skipping element"
                    );
                    let message = format!("Skipped {}: {}", element.label(), e);
                    last_error = Some(e);
                    Some(message)
                }
            };

            self.update(job_id, |job| {
                if let Some(message) = message {
                    job.log(message);
                }
                job.record_processed_element()
            })
            .await?;
        }

        if blocks.is_empty()
            && let Some(last) = last_error
        {
            return Err(PipelineError::Analysis {
                attempted: elements.len(),
                last,
            });
        }

        blocks.sort_by_key(|(index, _)| *index);
        Ok(blocks.into_iter().map(|(_, markdown)| markdown).collect())
    }

    async fn transition(&self, job_id: Uuid, next: JobPhase) -> Result<(), PipelineError> {
        let job = self
            .store
            .update_job(job_id, |job| {
                job.advance(next)?;
                Ok(job.clone())
            })
            .await?;
        info!(job_id = %job_id, phase = %next, "Job phase changed");
        self.broadcaster.publish(WsEvent::phase_changed(&job));
        Ok(())
    }

    async fn update(
        &self,
        job_id: Uuid,
        change: impl FnOnce(&mut Job) -> Result<(), TransitionError>,
    ) -> Result<(), PipelineError> {
        let job = self
            .store
            .update_job(job_id, |job| {
                change(job)?;
                Ok(job.clone())
            })
            .await?;
        self.broadcaster.publish(WsEvent::progress_updated(&job));
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, message: String) {
        let failed = self
            .store
            .update_job(job_id, |job| {
                job.fail(message)?;
                Ok(job.clone())
            })
            .await;

        match failed {
            Ok(job) => {
                if let Some(event) = WsEvent::terminal(&job) {
                    self.broadcaster.publish(event);
                }
            }
            Err(e) => warn!(job_id = %job_id, error = %e, "Could not record job failure"),
        }
    }
}

/// Fill the page description from the crawled title when the submitter left it out.
fn page_context(context: Option<WebsiteContext>, page_title: &str) -> Option<WebsiteContext> {
    let title = page_title.trim();
    if title.is_empty() {
        return context;
    }

    let mut context = context.unwrap_or_default();
    if context
        .current_page_description
        .as_deref()
        .is_none_or(|d| d.trim().is_empty())
    {
        context.current_page_description = Some(title.to_string());
    }
    Some(context)
}
