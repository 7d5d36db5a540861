//! Pipeline scenarios: whole jobs run against fake collaborators.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use qadoc_lib::error::AppError;
use qadoc_lib::models::{Job, JobPhase, WsEvent};
use qadoc_lib::services::PollOutcome;
use qadoc_lib::services::test_cases::parse_test_cases;

use super::fakes::{FakeCrawler, FakeWriter, shop_page};
use super::test_helpers::*;

#[tokio::test]
async fn test_job_completes_with_one_test_case_per_element() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(3)),
        Arc::new(FakeWriter::new()),
        settings(),
    );

    let job = run_job(&pipeline).await;

    assert_eq!(job.phase(), JobPhase::Completed);
    assert_eq!(job.progress_percent(), 100.0);
    let counters = job.counters();
    assert_eq!(counters.total_elements, 3);
    assert_eq!(counters.processed_elements, 3);
    assert_eq!(counters.total_test_cases, 3);
    assert_eq!(counters.generated_test_cases, 3);

    let result = job.result().unwrap();
    assert!(
        result
            .markdown
            .starts_with("# QA Test Documentation: https://shop.example.com/products")
    );
    assert!(result.markdown.contains("## Page: Example Shop"));

    let cases = parse_test_cases(&result.markdown);
    let ids: Vec<&str> = cases.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["TC_ELEMENT_1-1", "TC_ELEMENT_2-2", "TC_ELEMENT_3-3"]);
    assert_eq!(cases[0].title, "Press Button 1");
    assert_eq!(cases[0].steps.len(), 1);

    let json = &result.json;
    assert_eq!(json["sourceUrl"], TEST_URL);
    assert_eq!(json["pageTitle"], "Example Shop");
    assert_eq!(json["identifiedElements"].as_array().unwrap().len(), 3);
    assert_eq!(json["generatedTestCases"].as_array().unwrap().len(), 3);
    assert_eq!(
        json["websiteContext"]["current_page_description"],
        "Example Shop"
    );
}

#[tokio::test]
async fn test_spawned_job_runs_on_its_own_task() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(5)),
        Arc::new(FakeWriter::new().with_delay(Duration::from_millis(5))),
        settings(),
    );
    let job = Job::new(TEST_URL, None, None);
    let id = job.id;
    pipeline.store().insert_job(job).await.unwrap();

    pipeline.spawn(id).await.unwrap();

    let job = pipeline.store().require_job(id).await.unwrap();
    assert_eq!(job.phase(), JobPhase::Completed);
    assert_eq!(job.counters().processed_elements, 5);
    assert_eq!(job.result().map(|r| parse_test_cases(&r.markdown).len()), Some(5));
}

#[tokio::test]
async fn test_progress_events_never_go_backwards() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(4)),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let mut events = pipeline.broadcaster().subscribe();

    let job = pipeline.submit(request(TEST_URL)).await.unwrap();
    let outcome = wait_for_outcome(pipeline.store(), job.id).await;
    assert!(matches!(outcome, PollOutcome::Completed { .. }));

    let mut received = Vec::new();
    while let Ok(message) = events.try_recv() {
        received.push(message.event);
    }

    assert!(matches!(received.first(), Some(WsEvent::JobCreated(_))));
    assert!(matches!(received.last(), Some(WsEvent::JobCompleted(p)) if p.test_case_count == 4));

    let percents: Vec<f64> = received
        .iter()
        .filter_map(|event| match event {
            WsEvent::PhaseChanged(p) | WsEvent::ProgressUpdated(p) => Some(p.progress_percent),
            _ => None,
        })
        .collect();
    assert!(!percents.is_empty());
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {:?}",
        percents
    );
    assert!(percents.iter().all(|p| *p < 100.0));

    let phases: Vec<JobPhase> = received
        .iter()
        .filter_map(|event| match event {
            WsEvent::PhaseChanged(p) => Some(p.phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        [JobPhase::Crawling, JobPhase::Analyzing, JobPhase::Generating]
    );
}

#[tokio::test]
async fn test_failed_elements_are_skipped() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(3)),
        Arc::new(FakeWriter::failing_for(&["btn-2"])),
        settings(),
    );

    let job = run_job(&pipeline).await;

    assert_eq!(job.phase(), JobPhase::Completed);
    assert_eq!(job.counters().processed_elements, 3);
    assert_eq!(job.counters().generated_test_cases, 2);
    assert!(
        job.logs()
            .iter()
            .any(|entry| entry.message.starts_with("Skipped button 'Button 2'"))
    );

    let cases = parse_test_cases(&job.result().unwrap().markdown);
    let titles: Vec<&str> = cases.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, ["Press Button 1", "Press Button 3"]);
}

#[tokio::test]
async fn test_job_fails_when_every_element_fails() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(3)),
        Arc::new(FakeWriter::failing_for(&["btn-1", "btn-2", "btn-3"])),
        settings(),
    );

    let job = run_job(&pipeline).await;

    assert_eq!(job.phase(), JobPhase::Failed);
    assert_eq!(job.failed_during(), Some(JobPhase::Analyzing));
    assert!(job.error().unwrap().starts_with("Analysis failed"));
    assert!(job.result().is_none());
    // Frozen at the top of the analyzing band, never 100
    assert_eq!(job.progress_percent(), 75.0);
}

#[tokio::test]
async fn test_crawl_error_fails_job_in_crawling() {
    let pipeline = create_pipeline(
        FakeCrawler::failing("connection refused"),
        Arc::new(FakeWriter::new()),
        settings(),
    );

    let job = run_job(&pipeline).await;

    assert_eq!(job.phase(), JobPhase::Failed);
    assert_eq!(job.failed_during(), Some(JobPhase::Crawling));
    assert_eq!(job.progress_percent(), 25.0);
    let error = job.error().unwrap();
    assert!(error.contains("Crawling failed"), "{}", error);
    assert!(error.contains("connection refused"), "{}", error);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_crawler_times_out() {
    let mut limits = settings();
    limits.step_timeout = Duration::from_secs(30);
    let pipeline = create_pipeline(
        FakeCrawler::hanging(Duration::from_secs(3600)),
        Arc::new(FakeWriter::new()),
        limits,
    );

    let job = run_job(&pipeline).await;

    assert_eq!(job.phase(), JobPhase::Failed);
    assert_eq!(job.failed_during(), Some(JobPhase::Crawling));
    assert!(job.error().unwrap().contains("crawl timed out after 30s"));
}

#[tokio::test]
async fn test_page_without_elements_completes_empty() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(0)),
        Arc::new(FakeWriter::new()),
        settings(),
    );

    let job = run_job(&pipeline).await;

    assert_eq!(job.phase(), JobPhase::Completed);
    assert_eq!(job.progress_percent(), 100.0);
    let result = job.result().unwrap();
    assert!(parse_test_cases(&result.markdown).is_empty());
    assert_eq!(
        result.json["generatedTestCases"].as_array().unwrap().len(),
        0
    );
}

#[tokio::test]
async fn test_writer_calls_respect_concurrency_limit() {
    let writer = Arc::new(FakeWriter::new().with_delay(Duration::from_millis(20)));
    let mut limits = settings();
    limits.analyze_concurrency = 2;
    let pipeline = create_pipeline(FakeCrawler::returning(shop_page(8)), writer.clone(), limits);

    let job = run_job(&pipeline).await;

    assert_eq!(job.phase(), JobPhase::Completed);
    assert_eq!(writer.calls.load(Ordering::SeqCst), 8);
    assert!(writer.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_invalid_submission_is_not_stored() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(1)),
        Arc::new(FakeWriter::new()),
        settings(),
    );

    for url in ["", "ftp://example.com", "not a url"] {
        let err = pipeline.submit(request(url)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)), "{url}: {err:?}");
    }
    assert!(pipeline.store().is_empty().await);
}
