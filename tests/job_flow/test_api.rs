//! REST API tests over a real pipeline with fake collaborators.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::StatusCode, test};
use qadoc_lib::models::{
    CreateJobResponse, JobListResponse, JobPhase, JobResult, JobSnapshot, Priority,
    TestCaseListResponse,
};
use serde_json::{Value, json};
use uuid::Uuid;

use super::fakes::{FakeCrawler, FakePdfRenderer, FakeWriter, shop_page};
use super::test_helpers::*;

async fn submit<S>(app: &S, body: Value) -> (StatusCode, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/jobs")
        .set_json(body)
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    (status, test::read_body_json(resp).await)
}

async fn get<S>(app: &S, uri: &str) -> (StatusCode, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::get().uri(uri).to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    (status, test::read_body_json(resp).await)
}

#[actix_rt::test]
async fn test_submit_and_fetch_results() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(2)),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let app = create_test_app(&pipeline, None).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/jobs")
        .set_json(json!({
            "url": TEST_URL,
            "website_context": { "type": "E-commerce Platform" }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let location = resp
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let created: CreateJobResponse = test::read_body_json(resp).await;
    assert_eq!(created.phase, JobPhase::Pending);
    assert_eq!(location, format!("/api/v1/jobs/{}/status", created.job_id));

    wait_for_outcome(pipeline.store(), created.job_id).await;

    let (status, body) = get(&app, &location).await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: JobSnapshot = serde_json::from_value(body).unwrap();
    assert_eq!(snapshot.phase, JobPhase::Completed);
    assert_eq!(snapshot.progress_percent, 100.0);
    assert_eq!(snapshot.counters.generated_test_cases, 2);
    assert!(!snapshot.logs.is_empty());

    let (status, body) = get(&app, &format!("/api/v1/jobs/{}/results", created.job_id)).await;
    assert_eq!(status, StatusCode::OK);
    let result: JobResult = serde_json::from_value(body).unwrap();
    assert!(result.markdown.contains("### Test Case ID: TC_ELEMENT_2"));
    assert_eq!(result.json["websiteContext"]["type"], "E-commerce Platform");
}

#[actix_rt::test]
async fn test_test_cases_endpoint_filters_but_summarizes_all() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(3)),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let app = create_test_app(&pipeline, None).await;

    let (_, body) = submit(&app, json!({ "url": TEST_URL })).await;
    let job_id: Uuid = serde_json::from_value(body["job_id"].clone()).unwrap();
    wait_for_outcome(pipeline.store(), job_id).await;

    let (status, body) = get(&app, &format!("/api/v1/jobs/{}/test-cases", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    let all: TestCaseListResponse = serde_json::from_value(body).unwrap();
    assert_eq!(all.test_cases.len(), 3);
    assert_eq!(all.summary.total, 3);
    assert_eq!(all.summary.high, 3);
    assert!(all.test_cases.iter().all(|c| c.priority == Priority::High));

    let (_, body) = get(
        &app,
        &format!("/api/v1/jobs/{}/test-cases?priority=Low", job_id),
    )
    .await;
    let low: TestCaseListResponse = serde_json::from_value(body).unwrap();
    assert!(low.test_cases.is_empty());
    assert_eq!(low.summary.total, 3);

    let (_, body) = get(
        &app,
        &format!("/api/v1/jobs/{}/test-cases?search=button%202", job_id),
    )
    .await;
    let searched: TestCaseListResponse = serde_json::from_value(body).unwrap();
    assert_eq!(searched.test_cases.len(), 1);
    assert_eq!(searched.test_cases[0].title, "Press Button 2");
}

#[actix_rt::test]
async fn test_results_conflict_until_completed() {
    let pipeline = create_pipeline(
        FakeCrawler::hanging(Duration::from_secs(3600)),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let app = create_test_app(&pipeline, None).await;

    let (status, body) = submit(&app, json!({ "url": TEST_URL })).await;
    assert_eq!(status, StatusCode::CREATED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    for path in ["results", "test-cases", "pdf"] {
        let (status, body) = get(&app, &format!("/api/v1/jobs/{}/{}", job_id, path)).await;
        assert_eq!(status, StatusCode::CONFLICT, "{path}");
        assert_eq!(body["error"], "JOB_NOT_READY");
    }
}

#[actix_rt::test]
async fn test_failed_job_results_report_the_error() {
    let pipeline = create_pipeline(
        FakeCrawler::failing("DNS lookup failed"),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let app = create_test_app(&pipeline, None).await;

    let (_, body) = submit(&app, json!({ "url": TEST_URL })).await;
    let job_id: Uuid = serde_json::from_value(body["job_id"].clone()).unwrap();
    wait_for_outcome(pipeline.store(), job_id).await;

    let (status, body) = get(&app, &format!("/api/v1/jobs/{}/status", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "failed");
    assert_eq!(body["failed_during"], "crawling");
    assert_eq!(body["progress_percent"], 25.0);

    let (status, body) = get(&app, &format!("/api/v1/jobs/{}/results", job_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("DNS lookup failed"));
}

#[actix_rt::test]
async fn test_unknown_job_is_not_found() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(1)),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let app = create_test_app(&pipeline, None).await;

    let (status, body) = get(&app, &format!("/api/v1/jobs/{}/status", Uuid::now_v7())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[actix_rt::test]
async fn test_invalid_url_is_rejected() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(1)),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let app = create_test_app(&pipeline, None).await;

    let (status, body) = submit(&app, json!({ "url": "javascript:alert(1)" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_INPUT");
    assert!(pipeline.store().is_empty().await);
}

#[actix_rt::test]
async fn test_list_jobs_filters_by_phase() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(1)),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let app = create_test_app(&pipeline, None).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (_, body) = submit(&app, json!({ "url": TEST_URL })).await;
        ids.push(serde_json::from_value::<Uuid>(body["job_id"].clone()).unwrap());
    }
    for id in &ids {
        wait_for_outcome(pipeline.store(), *id).await;
    }

    let (status, body) = get(&app, "/api/v1/jobs?phase=completed&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let list: JobListResponse = serde_json::from_value(body).unwrap();
    assert_eq!(list.total, 3);
    assert_eq!(list.limit, 2);
    assert_eq!(list.jobs.len(), 2);
    // Newest first
    assert_eq!(list.jobs[0].job_id, ids[2]);

    let (_, body) = get(&app, "/api/v1/jobs?phase=failed").await;
    let list: JobListResponse = serde_json::from_value(body).unwrap();
    assert_eq!(list.total, 0);
}

#[actix_rt::test]
async fn test_pdf_export() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(1)),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let (_, body) = {
        let app = create_test_app(&pipeline, None).await;
        submit(&app, json!({ "url": TEST_URL })).await
    };
    let job_id: Uuid = serde_json::from_value(body["job_id"].clone()).unwrap();
    wait_for_outcome(pipeline.store(), job_id).await;
    let uri = format!("/api/v1/jobs/{}/pdf", job_id);

    // Without a renderer
    let app = create_test_app(&pipeline, None).await;
    let (status, body) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["error"], "NOT_IMPLEMENTED");

    // With a renderer
    let app = create_test_app(&pipeline, Some(Arc::new(FakePdfRenderer))).await;
    let req = test::TestRequest::get().uri(&uri).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/pdf"
    );
    let bytes = test::read_body(resp).await;
    assert!(bytes.starts_with(b"%PDF-1.7\n# QA Test Documentation"));
}

#[actix_rt::test]
async fn test_health_and_ready() {
    let pipeline = create_pipeline(
        FakeCrawler::returning(shop_page(1)),
        Arc::new(FakeWriter::new()),
        settings(),
    );
    let app = create_test_app(&pipeline, None).await;

    let (status, body) = get(&app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = get(&app, "/api/v1/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"], 0);
    assert_eq!(body["pdf_export"], "disabled");
}
