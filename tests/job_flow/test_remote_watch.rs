//! Polling a job over HTTP against an in-process server.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use qadoc_lib::api::{self, PdfExport};
use qadoc_lib::models::JobPhase;
use qadoc_lib::services::test_cases::parse_test_cases;
use qadoc_lib::services::{
    HttpJobSource, JobPoller, JobSource, Pipeline, PollError, PollOutcome,
};
use uuid::Uuid;

use super::fakes::{FakeCrawler, FakeWriter, shop_page};
use super::test_helpers::*;

/// Serve the job API for `pipeline` on an ephemeral port. Returns the server root URL.
fn start_server(pipeline: &Pipeline) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
    let port = listener.local_addr().unwrap().port();

    let pipeline = pipeline.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pipeline.store().clone()))
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(PdfExport::disabled()))
            .service(web::scope("/api/v1").configure(api::configure_job_routes))
    })
    .workers(1)
    .listen(listener)
    .expect("failed to listen")
    .disable_signals()
    .run();

    tokio::spawn(server);
    format!("http://127.0.0.1:{}", port)
}

#[actix_rt::test]
async fn test_watch_job_to_completion_over_http() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(2)),
        Arc::new(FakeWriter::new().with_delay(Duration::from_millis(30))),
        settings(),
    );
    let source = HttpJobSource::new(&start_server(&pipeline)).unwrap();

    let created = source.submit_job(&request(TEST_URL)).await.unwrap();
    let handle = JobPoller::new(
        created.job_id,
        Arc::new(source),
        Duration::from_millis(20),
    )
    .spawn();

    let outcome = tokio::time::timeout(Duration::from_secs(10), handle.outcome())
        .await
        .expect("poller did not finish")
        .unwrap();

    match outcome {
        PollOutcome::Completed { snapshot, result } => {
            assert_eq!(snapshot.job_id, created.job_id);
            assert_eq!(snapshot.phase, JobPhase::Completed);
            assert_eq!(parse_test_cases(&result.markdown).len(), 2);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[actix_rt::test]
async fn test_watch_reports_failure_over_http() {
    let pipeline = create_pipeline(
        FakeCrawler::failing("blocked by robots"),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let source = HttpJobSource::new(&start_server(&pipeline)).unwrap();

    let created = source.submit_job(&request(TEST_URL)).await.unwrap();
    let poller = JobPoller::new(created.job_id, Arc::new(source), Duration::from_millis(20));
    let outcome = tokio::time::timeout(Duration::from_secs(10), poller.run())
        .await
        .expect("poller did not finish");

    match outcome {
        PollOutcome::Failed { snapshot, error } => {
            assert_eq!(snapshot.failed_during, Some(JobPhase::Crawling));
            assert!(error.contains("blocked by robots"), "{}", error);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[actix_rt::test]
async fn test_http_source_maps_status_codes() {
    let pipeline = create_pipeline(
        FakeCrawler::hanging(Duration::from_secs(3600)),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let source = HttpJobSource::new(&start_server(&pipeline)).unwrap();

    let missing = Uuid::now_v7();
    assert!(matches!(
        source.fetch_job(missing).await,
        Err(PollError::NotFound(id)) if id == missing
    ));

    let created = source.submit_job(&request(TEST_URL)).await.unwrap();
    let snapshot = source.fetch_job(created.job_id).await.unwrap();
    assert!(!snapshot.phase.is_terminal());
    assert!(matches!(
        source.fetch_results(created.job_id).await,
        Err(PollError::NotReady(_))
    ));

    let rejected = source.submit_job(&request("mailto:qa@example.com")).await;
    assert!(matches!(rejected, Err(PollError::InvalidResponse(message)) if message.starts_with("400")));
}

#[actix_rt::test]
async fn test_cancelled_watch_leaves_job_running() {
    let pipeline = create_pipeline(
        FakeCrawler::hanging(Duration::from_secs(3600)),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let source = HttpJobSource::new(&start_server(&pipeline)).unwrap();
    let created = source.submit_job(&request(TEST_URL)).await.unwrap();

    let handle = JobPoller::new(created.job_id, Arc::new(source), Duration::from_millis(20)).spawn();
    let mut updates = handle.updates();
    tokio::time::timeout(Duration::from_secs(10), updates.changed())
        .await
        .expect("no snapshot received")
        .unwrap();

    handle.cancel();
    let outcome = handle.outcome().await.unwrap();
    assert!(matches!(outcome, PollOutcome::Cancelled { last: Some(_) }));

    let job = pipeline.store().require_job(created.job_id).await.unwrap();
    assert!(!job.phase().is_terminal());
}
