//! QA Documentation Generator Server - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::{App, HttpRequest, HttpServer, Result as ActixResult, http::header, web};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use qadoc_lib::api::{self, ApiDoc, PdfExport};
use qadoc_lib::config::Config;
use qadoc_lib::db::JobStore;
use qadoc_lib::error::AppError;
use qadoc_lib::middleware::{REQUEST_ID_HEADER, RequestLogger};
use qadoc_lib::services::{
    ChatCompletionsWriter, CleanupConfig, CollaboratorError, EventBroadcaster, PdfRenderer,
    Pipeline, PipelineSettings, RemoteCrawler, RemotePdfRenderer, start_cleanup_task,
};

/// Largest accepted JSON request body.
const MAX_JSON_BODY: usize = 64 * 1024;

/// SPA fallback handler - serves index.html for client-side routing.
async fn spa_fallback(req: HttpRequest) -> ActixResult<NamedFile> {
    let static_dir = req
        .app_data::<web::Data<PathBuf>>()
        .ok_or_else(|| AppError::Internal("Static dir not configured".to_string()))?;
    Ok(NamedFile::open(static_dir.join("index.html"))?)
}

/// Perform health check (for Docker healthcheck).
fn health_check() -> bool {
    // Simple check - just verify we can load config
    Config::from_env().is_ok()
}

fn io_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Check for --health-check flag (used by Docker HEALTHCHECK)
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|arg| arg == "--health-check") {
        dotenvy::dotenv().ok();
        std::process::exit(if health_check() { 0 } else { 1 });
    }

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| io_error("Failed to set tracing subscriber", e))?;

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, QADOC_CRAWLER_URL, QADOC_LLM_API_URL and QADOC_LLM_API_KEY must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  QA Documentation Generator Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
        info!("Using development defaults for the crawler and LLM endpoints");
    }

    // Collaborators
    let crawler_url = config.crawler_url.as_deref().ok_or_else(|| {
        io_error("QADOC_CRAWLER_URL", CollaboratorError::NotConfigured("crawler"))
    })?;
    let crawler =
        RemoteCrawler::new(crawler_url).map_err(|e| io_error("Failed to create crawler", e))?;
    info!("Crawler service: {}", crawler_url);

    let writer = ChatCompletionsWriter::new(
        &config.llm.api_url,
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    )
    .map_err(|e| io_error("Failed to create test case writer", e))?;
    info!(
        "Test case writer: {} (model {})",
        config.llm.api_url, config.llm.model
    );
    if config.llm.api_key.is_none() {
        warn!("QADOC_LLM_API_KEY is not set - requests to the LLM endpoint are unauthenticated");
    }

    let pdf_renderer: Option<Arc<dyn PdfRenderer>> = match config.pdf_renderer_url.as_deref() {
        Some(url) => {
            let renderer = RemotePdfRenderer::new(url)
                .map_err(|e| io_error("Failed to create PDF renderer", e))?;
            info!("PDF export enabled via {}", url);
            Some(Arc::new(renderer))
        }
        None => {
            info!("PDF export disabled (QADOC_PDF_RENDERER_URL not set)");
            None
        }
    };
    let pdf_export = PdfExport::new(pdf_renderer, config.step_timeout());

    // Prepare shared state
    let store = JobStore::new();
    let broadcaster = EventBroadcaster::new();
    let settings = PipelineSettings {
        step_timeout: config.step_timeout(),
        analyze_concurrency: config.analyze_concurrency,
        max_concurrent_jobs: config.max_concurrent_jobs,
    };
    let pipeline = Pipeline::new(
        store.clone(),
        Arc::new(crawler),
        Arc::new(writer),
        broadcaster.clone(),
        settings,
    );
    info!(
        "Job limits: {} concurrent jobs, {} concurrent writer calls per job, {}s step timeout",
        settings.max_concurrent_jobs, settings.analyze_concurrency, config.step_timeout_secs
    );

    // Start the cleanup background task
    start_cleanup_task(
        store.clone(),
        CleanupConfig {
            retention_hours: config.job_retention_hours,
            interval_secs: config.cleanup_interval_secs,
        },
    );

    let bind_address = config.bind_address();
    let static_dir = config.static_dir.clone();
    let is_development = config.is_development();

    if static_dir.is_some() {
        info!("Static file serving enabled from {:?}", static_dir);
    }

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    let openapi = ApiDoc::openapi();
    let request_id = header::HeaderName::from_static(REQUEST_ID_HEADER);

    // Start HTTP server
    let server = HttpServer::new(move || {
        // Configure CORS
        let cors = if is_development {
            // Permissive CORS for development
            Cors::default()
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![
                    header::ACCEPT,
                    header::CONTENT_TYPE,
                    request_id.clone(),
                ])
                .expose_headers(vec![header::LOCATION, request_id.clone()])
                .max_age(3600)
        } else {
            // Restrictive CORS for production (same-origin only)
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![
                    header::ACCEPT,
                    header::CONTENT_TYPE,
                    request_id.clone(),
                ])
                .max_age(3600)
        };

        let mut app = App::new()
            // Add CORS middleware (must be before other middleware)
            .wrap(cors)
            // Add request logging middleware
            .wrap(RequestLogger)
            // Add shared state
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(broadcaster.clone()))
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(pdf_export.clone()))
            .app_data(web::JsonConfig::default().limit(MAX_JSON_BODY))
            // Configure API routes
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_job_routes)
                    .configure(api::configure_websocket_routes),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            );

        // Serve static files in production (when STATIC_DIR is set)
        if let Some(ref dir) = static_dir {
            app = app
                .app_data(web::Data::new(dir.clone()))
                // Serve static assets (js, css, images)
                .service(Files::new("/assets", dir.join("assets")).prefer_utf8(true))
                // Serve favicon
                .service(Files::new("/favicon", dir.clone()).index_file("favicon.ico"))
                // SPA fallback - serve index.html for all other routes
                .default_service(web::route().to(spa_fallback));
        }

        app
    });

    // Set worker count
    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}
