//! Run API tests against the real router with mock generators.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{fixtures, TestFixture};

const WAIT: Duration = Duration::from_secs(5);

fn run_body(tier: &str, mode: &str, features: Value, wait: bool) -> Value {
    json!({
        "owner_id": "owner-api",
        "tier": tier,
        "mode": mode,
        "features": features,
        "source_text": fixtures::SOURCE_TEXT,
        "wait": wait,
    })
}

fn full_body(mode: &str, wait: bool) -> Value {
    run_body("premium", mode, json!(["outline", "narration", "audio"]), wait)
}

/// Resume, retrying while the previous execution still holds the run.
async fn resume_when_idle(fixture: &TestFixture, run_id: &str, body: Value) -> common::TestResponse {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let response = fixture
            .post(&format!("/api/v1/runs/{}/resume", run_id), body.clone())
            .await;
        if response.status != StatusCode::CONFLICT || tokio::time::Instant::now() >= deadline {
            return response;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_endpoint() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["server"]["port"], 8080);
    assert_eq!(
        response.body["orchestrator"]["review_pause_reason"],
        "review_required"
    );
}

#[tokio::test]
async fn test_create_run_and_wait() {
    let fixture = TestFixture::new();
    let response = fixture.post("/api/v1/runs", full_body("auto", true)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["status"], "succeeded");
    assert_eq!(response.body["progress"], 100);
    assert_eq!(response.body["outputs"]["outline"]["slides"].as_array().unwrap().len(), 3);
    assert!(response.body["outputs"]["audio"]["uri"]
        .as_str()
        .unwrap()
        .starts_with("mock://audio/"));
}

#[tokio::test]
async fn test_create_run_in_background() {
    let fixture = TestFixture::new();
    let response = fixture.post("/api/v1/runs", full_body("auto", false)).await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["owner_id"], "owner-api");
    let run_id = response.body["id"].as_str().unwrap().to_string();

    let status = fixture.wait_for_status(&run_id, "succeeded", WAIT).await;
    assert_eq!(status["progress"], 100);
    assert_eq!(status["current_step"], "complete");

    let run = fixture.get(&format!("/api/v1/runs/{}", run_id)).await;
    assert_eq!(run.status, StatusCode::OK);
    assert_eq!(run.body["status"]["type"], "succeeded");
    let links = run.body["linked_artifacts"].as_object().unwrap();
    assert_eq!(links.len(), 3);

    let artifacts = fixture
        .get(&format!("/api/v1/runs/{}/artifacts", run_id))
        .await;
    assert_eq!(artifacts.status, StatusCode::OK);
    assert_eq!(artifacts.body["total"], 3);
    let kinds: Vec<&str> = artifacts.body["artifacts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["content"]["type"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"outline"));
    assert!(kinds.contains(&"narration"));
    assert!(kinds.contains(&"audio"));
}

#[tokio::test]
async fn test_tier_violation_is_forbidden() {
    let fixture = TestFixture::new();
    let response = fixture
        .post(
            "/api/v1/runs",
            run_body("basic", "auto", json!(["outline", "audio"]), true),
        )
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.body["error"].as_str().unwrap().contains("audio"));
    assert_eq!(fixture.pipeline.runs.create_count(), 0);
}

#[tokio::test]
async fn test_empty_features_are_forbidden() {
    let fixture = TestFixture::new();
    let response = fixture
        .post("/api/v1/runs", run_body("premium", "auto", json!([]), true))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(fixture.pipeline.runs.create_count(), 0);
}

#[tokio::test]
async fn test_blank_owner_is_bad_request() {
    let fixture = TestFixture::new();
    let mut body = full_body("auto", true);
    body["owner_id"] = json!("  ");
    let response = fixture.post("/api/v1/runs", body).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let fixture = TestFixture::new();
    let response = fixture.post_raw("/api/v1/runs", "{not json").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_feature_is_rejected() {
    let fixture = TestFixture::new();
    let response = fixture
        .post(
            "/api/v1/runs",
            run_body("premium", "auto", json!(["outline", "video"]), true),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let fixture = TestFixture::new();
    for path in [
        "/api/v1/runs/missing",
        "/api/v1/runs/missing/status",
        "/api/v1/runs/missing/artifacts",
    ] {
        let response = fixture.get(path).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{}", path);
    }

    let response = fixture.post_empty("/api/v1/runs/missing/pause").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_runs_requires_owner() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/runs").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_runs_by_owner() {
    let fixture = TestFixture::new();
    for _ in 0..3 {
        let response = fixture.post("/api/v1/runs", full_body("auto", true)).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let response = fixture.get("/api/v1/runs?owner_id=owner-api&limit=2").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["runs"].as_array().unwrap().len(), 2);
    assert_eq!(response.body["limit"], 2);

    let response = fixture.get("/api/v1/runs?owner_id=someone-else").await;
    assert!(response.body["runs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_review_pause_and_resume_with_edit() {
    let fixture = TestFixture::new();
    let response = fixture.post("/api/v1/runs", full_body("hybrid", true)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "paused");
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["progress"], 45);
    assert!(response.body["outputs"]["audio"].is_null());
    let run_id = response.body["run_id"].as_str().unwrap().to_string();

    let status = fixture.get(&format!("/api/v1/runs/{}/status", run_id)).await;
    assert_eq!(status.body["pause_reason"], "review_required");

    let edited = fixtures::edited_narration();
    let response = fixture
        .post(
            &format!("/api/v1/runs/{}/resume", run_id),
            json!({ "edited_narration": edited }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "succeeded");
    assert_eq!(
        response.body["outputs"]["narration"]["segments"][0]["text"],
        "Edited opening."
    );

    let narrations = fixture.pipeline.audio.recorded_narrations().await;
    assert_eq!(narrations.last(), Some(&edited));
}

#[tokio::test]
async fn test_resume_without_body() {
    let fixture = TestFixture::new();
    let response = fixture.post("/api/v1/runs", full_body("manual", true)).await;
    let run_id = response.body["run_id"].as_str().unwrap().to_string();

    let response = fixture
        .post_empty(&format!("/api/v1/runs/{}/resume", run_id))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "succeeded");
}

#[tokio::test]
async fn test_resume_finished_run_conflicts() {
    let fixture = TestFixture::new();
    let response = fixture.post("/api/v1/runs", full_body("auto", true)).await;
    let run_id = response.body["run_id"].as_str().unwrap().to_string();

    let response = fixture
        .post_empty(&format!("/api/v1/runs/{}/resume", run_id))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_external_pause_and_resume() {
    let fixture = TestFixture::new();
    let gate = fixture.pipeline.outline.hold().await;

    let response = fixture.post("/api/v1/runs", full_body("auto", false)).await;
    let run_id = response.body["id"].as_str().unwrap().to_string();
    fixture.wait_for_status(&run_id, "running", WAIT).await;

    let response = fixture
        .post(
            &format!("/api/v1/runs/{}/pause", run_id),
            json!({ "reason": "operator hold" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"]["type"], "paused");
    assert_eq!(response.body["status"]["reason"], "operator hold");

    gate.release();
    let status = fixture.wait_for_status(&run_id, "paused", WAIT).await;
    assert_eq!(status["pause_reason"], "operator hold");

    let response = resume_when_idle(&fixture, &run_id, json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "succeeded");
    assert_eq!(fixture.pipeline.outline.call_count().await, 1);
}

#[tokio::test]
async fn test_pause_finished_run_conflicts() {
    let fixture = TestFixture::new();
    let response = fixture.post("/api/v1/runs", full_body("auto", true)).await;
    let run_id = response.body["run_id"].as_str().unwrap().to_string();

    let response = fixture
        .post_empty(&format!("/api/v1/runs/{}/pause", run_id))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_stage_failure_reports_failed_outcome() {
    let fixture = TestFixture::new();
    fixture.pipeline.audio.set_always_fail(true).await;

    let response = fixture.post("/api/v1/runs", full_body("auto", true)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["status"], "failed");
    assert!(!response.body["errors"].as_array().unwrap().is_empty());

    let run_id = response.body["run_id"].as_str().unwrap();
    let artifacts = fixture
        .get(&format!("/api/v1/runs/{}/artifacts", run_id))
        .await;
    assert_eq!(artifacts.body["total"], 0);
}

#[tokio::test]
async fn test_status_cleanup() {
    let fixture = TestFixture::new();
    let response = fixture.post("/api/v1/runs", full_body("auto", true)).await;
    let run_id = response.body["run_id"].as_str().unwrap().to_string();
    let path = format!("/api/v1/runs/{}/status", run_id);

    assert_eq!(fixture.delete(&path).await.status, StatusCode::NO_CONTENT);
    assert_eq!(fixture.delete(&path).await.status, StatusCode::NOT_FOUND);

    let status = fixture.get(&path).await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.body["status"], "succeeded");
    assert_eq!(status.body["progress"], 100);
}

#[tokio::test]
async fn test_pipeline_metrics() {
    let fixture = TestFixture::new();
    fixture.post("/api/v1/runs", full_body("auto", true)).await;
    fixture
        .post(
            "/api/v1/runs",
            run_body("standard", "auto", json!(["outline", "narration"]), true),
        )
        .await;

    let response = fixture.get("/api/v1/metrics").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total_executions"], 2);
    assert_eq!(response.body["successful_executions"], 2);
    assert_eq!(response.body["by_mode"]["auto"], 2);
}

#[tokio::test]
async fn test_prometheus_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("deckcast_http_requests_total"));
    assert!(response.text.contains("deckcast_runs_by_state"));
}
