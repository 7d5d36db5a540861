//! Health check endpoints.

use std::time::Duration;

use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::jobs::PdfExport;
use crate::db::JobStore;

const STORE_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Health check response.
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

/// Readiness check response.
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    status: &'static str,
    /// Jobs currently held by the store.
    jobs: usize,
    pdf_export: &'static str,
}

/// Health check endpoint.
///
/// Returns 200 if the service is running.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check endpoint.
///
/// Returns 200 if the service is ready to accept jobs (job store reachable).
#[utoipa::path(
    get,
    path = "/api/v1/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service unavailable")
    )
)]
#[get("/ready")]
pub async fn ready(store: web::Data<JobStore>, pdf: web::Data<PdfExport>) -> HttpResponse {
    // A store whose lock cannot be taken promptly is not ready
    match tokio::time::timeout(STORE_PROBE_TIMEOUT, store.len()).await {
        Ok(jobs) => HttpResponse::Ok().json(ReadyResponse {
            status: "ready",
            jobs,
            pdf_export: if pdf.is_enabled() { "enabled" } else { "disabled" },
        }),
        Err(_) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "error": "NOT_READY",
            "message": "Job store is not responding"
        })),
    }
}

/// Configure health routes.
pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(ready);
}
