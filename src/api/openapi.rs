//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "QA Documentation Generator Server",
        version = "0.1.0",
        description = "API server that crawls a URL, writes QA test cases for its interactive elements, and serves the result as Markdown, JSON, parsed test cases or PDF"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Job endpoints
        api::jobs::create_job,
        api::jobs::list_jobs,
        api::jobs::get_job_status,
        api::jobs::get_job_results,
        api::jobs::get_job_test_cases,
        api::jobs::get_job_pdf,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Jobs
            models::JobPhase,
            models::JobCounters,
            models::JobLogEntry,
            models::AuthType,
            models::AuthConfig,
            models::WebsiteContext,
            models::CreateJobRequest,
            models::CreateJobResponse,
            models::JobSnapshot,
            models::JobSummary,
            models::JobListResponse,
            models::JobResult,
            // Test cases
            models::Priority,
            models::PrimaryElement,
            models::TestStep,
            models::TestCase,
            models::TestCaseSummary,
            models::TestCaseListResponse,
            // Crawl output
            models::Position,
            models::UiElement,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Jobs", description = "Analysis job submission, status and results")
    )
)]
pub struct ApiDoc;
