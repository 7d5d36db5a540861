//! Job API handlers.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{HttpResponse, http::header, web};
use tracing::info;
use uuid::Uuid;

use crate::db::JobStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateJobRequest, CreateJobResponse, Job, JobListResponse, JobPhase, JobResult, JobSnapshot,
    JobSummary, QueryJobsParams, TestCaseFilter, TestCaseListResponse, TestCaseSummary,
};
use crate::services::collaborators::with_timeout;
use crate::services::test_cases::parse_test_cases;
use crate::services::{PdfRenderer, Pipeline};

/// PDF export settings shared with the handlers. Export is disabled without a renderer.
#[derive(Clone)]
pub struct PdfExport {
    renderer: Option<Arc<dyn PdfRenderer>>,
    timeout: Duration,
}

impl PdfExport {
    pub fn new(renderer: Option<Arc<dyn PdfRenderer>>, timeout: Duration) -> Self {
        Self { renderer, timeout }
    }

    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(60))
    }

    pub fn is_enabled(&self) -> bool {
        self.renderer.is_some()
    }
}

/// Result of a job that must already be completed.
fn completed_result(job: &Job) -> AppResult<&JobResult> {
    match (job.phase(), job.result()) {
        (JobPhase::Completed, Some(result)) => Ok(result),
        (JobPhase::Failed, _) => Err(AppError::JobNotReady(format!(
            "Job {} failed: {}",
            job.id,
            job.error().unwrap_or("unknown error")
        ))),
        (phase, _) => Err(AppError::JobNotReady(format!(
            "Job {} is still {}",
            job.id, phase
        ))),
    }
}

/// Submit a URL for analysis.
///
/// Creates a job in the `pending` phase and starts its pipeline in the background.
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "Jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created", body = CreateJobResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_job(
    pipeline: web::Data<Pipeline>,
    body: web::Json<CreateJobRequest>,
) -> AppResult<HttpResponse> {
    let job = pipeline.submit(body.into_inner()).await?;

    let response = CreateJobResponse {
        job_id: job.id,
        phase: job.phase(),
        created_at: job.created_at,
    };

    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, format!("/api/v1/jobs/{}/status", job.id)))
        .json(response))
}

/// List jobs with filtering and pagination.
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "Jobs",
    params(
        ("phase" = Option<JobPhase>, Query, description = "Filter by phase"),
        ("limit" = Option<usize>, Query, description = "Results per page (default 20, max 100)"),
        ("offset" = Option<usize>, Query, description = "Pagination offset")
    ),
    responses(
        (status = 200, description = "List of jobs", body = JobListResponse),
    )
)]
pub async fn list_jobs(
    store: web::Data<JobStore>,
    query: web::Query<QueryJobsParams>,
) -> AppResult<HttpResponse> {
    let params = query.into_inner();
    let limit = params.clamped_limit();
    let (jobs, total) = store.list_jobs(params.phase, limit, params.offset).await?;

    let response = JobListResponse {
        jobs: jobs.iter().map(Job::summary).collect::<Vec<JobSummary>>(),
        total,
        limit,
        offset: params.offset,
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Get the current status snapshot of a job.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}/status",
    tag = "Jobs",
    params(
        ("job_id" = Uuid, Path, description = "Job UUID")
    ),
    responses(
        (status = 200, description = "Job status", body = JobSnapshot),
        (status = 404, description = "Job not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_job_status(
    store: web::Data<JobStore>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let job = store.require_job(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(job.snapshot()))
}

/// Get the Markdown and JSON documents of a completed job.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}/results",
    tag = "Jobs",
    params(
        ("job_id" = Uuid, Path, description = "Job UUID")
    ),
    responses(
        (status = 200, description = "Job results", body = JobResult),
        (status = 404, description = "Job not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Job is not completed", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_job_results(
    store: web::Data<JobStore>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let job = store.require_job(path.into_inner()).await?;
    let result = completed_result(&job)?;
    Ok(HttpResponse::Ok().json(result))
}

/// Get the parsed test cases of a completed job.
///
/// The summary always covers every parsed case; the list honours the filter.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}/test-cases",
    tag = "Jobs",
    params(
        ("job_id" = Uuid, Path, description = "Job UUID"),
        ("priority" = Option<String>, Query, description = "High, Medium or Low"),
        ("type" = Option<String>, Query, description = "Test type (case-insensitive)"),
        ("feature" = Option<String>, Query, description = "Feature (case-insensitive)"),
        ("search" = Option<String>, Query, description = "Substring of title or description")
    ),
    responses(
        (status = 200, description = "Parsed test cases", body = TestCaseListResponse),
        (status = 404, description = "Job not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Job is not completed", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_job_test_cases(
    store: web::Data<JobStore>,
    path: web::Path<Uuid>,
    query: web::Query<TestCaseFilter>,
) -> AppResult<HttpResponse> {
    let job = store.require_job(path.into_inner()).await?;
    let result = completed_result(&job)?;

    let cases = parse_test_cases(&result.markdown);
    let filter = query.into_inner();
    let response = TestCaseListResponse {
        job_id: job.id,
        summary: TestCaseSummary::from_cases(&cases),
        test_cases: filter.apply(&cases).into_iter().cloned().collect(),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Render a completed job as PDF.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}/pdf",
    tag = "Jobs",
    params(
        ("job_id" = Uuid, Path, description = "Job UUID")
    ),
    responses(
        (status = 200, description = "PDF document", content_type = "application/pdf"),
        (status = 404, description = "Job not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Job is not completed", body = crate::error::ErrorResponse),
        (status = 501, description = "PDF export is not configured", body = crate::error::ErrorResponse),
        (status = 502, description = "Renderer failed", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_job_pdf(
    store: web::Data<JobStore>,
    pdf: web::Data<PdfExport>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let job = store.require_job(path.into_inner()).await?;
    let result = completed_result(&job)?;

    let renderer = pdf
        .renderer
        .as_ref()
        .ok_or_else(|| AppError::NotImplemented("PDF export is not configured".to_string()))?;

    let bytes = with_timeout("pdf rendering", pdf.timeout, renderer.render(result)).await?;
    info!(job_id = %job.id, size = bytes.len(), "PDF rendered");

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"qa-test-documentation-{}.pdf\"", job.id),
        ))
        .body(bytes))
}

/// Configure job routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/jobs")
            .route(web::get().to(list_jobs))
            .route(web::post().to(create_job)),
    )
    .service(web::resource("/jobs/{job_id}/status").route(web::get().to(get_job_status)))
    .service(web::resource("/jobs/{job_id}/results").route(web::get().to(get_job_results)))
    .service(web::resource("/jobs/{job_id}/test-cases").route(web::get().to(get_job_test_cases)))
    .service(web::resource("/jobs/{job_id}/pdf").route(web::get().to(get_job_pdf)));
}
