//! Shared helpers for job flow tests.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, dev::ServiceResponse, test, web};
use qadoc_lib::api::{self, PdfExport};
use qadoc_lib::db::JobStore;
use qadoc_lib::models::{CreateJobRequest, Job};
use qadoc_lib::services::{
    EventBroadcaster, JobPoller, PdfRenderer, Pipeline, PipelineSettings, PollOutcome,
    SiteCrawler, TestCaseWriter,
};
use uuid::Uuid;

pub const TEST_URL: &str = "https://shop.example.com/products";

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        step_timeout: Duration::from_secs(5),
        analyze_concurrency: 4,
        max_concurrent_jobs: 2,
    }
}

pub fn create_pipeline(
    crawler: impl SiteCrawler + 'static,
    writer: Arc<dyn TestCaseWriter>,
    settings: PipelineSettings,
) -> Pipeline {
    Pipeline::new(
        JobStore::new(),
        Arc::new(crawler),
        writer,
        EventBroadcaster::new(),
        settings,
    )
}

pub fn request(url: &str) -> CreateJobRequest {
    CreateJobRequest {
        url: url.to_string(),
        auth: None,
        website_context: None,
    }
}

/// Store a job and run its pipeline to the end on the current task.
pub async fn run_job(pipeline: &Pipeline) -> Job {
    let job = Job::new(TEST_URL, None, None);
    let id = job.id;
    pipeline.store().insert_job(job).await.unwrap();
    pipeline.run(id).await;
    pipeline.store().require_job(id).await.unwrap()
}

/// Follow a job through the store until it is terminal.
pub async fn wait_for_outcome(store: &JobStore, job_id: Uuid) -> PollOutcome {
    let poller = JobPoller::new(job_id, Arc::new(store.clone()), Duration::from_millis(10));
    tokio::time::timeout(Duration::from_secs(10), poller.run())
        .await
        .expect("job did not finish in time")
}

/// Create a test app serving the job API for `pipeline`.
pub async fn create_test_app(
    pipeline: &Pipeline,
    pdf_renderer: Option<Arc<dyn PdfRenderer>>,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = ServiceResponse,
    Error = actix_web::Error,
> {
    let pdf = PdfExport::new(pdf_renderer, Duration::from_secs(5));

    test::init_service(
        App::new()
            .app_data(web::Data::new(pipeline.store().clone()))
            .app_data(web::Data::new(pipeline.broadcaster().clone()))
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(pdf))
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_job_routes),
            ),
    )
    .await
}
