//! Common test utilities for API testing with mocks.
//!
//! Builds the real router over an engine wired to mock generators and
//! in-memory stores, so requests exercise every layer without a database.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use deckcast_core::testing::fixtures::TestPipeline;
use deckcast_core::{Config, OrchestratorConfig};

/// Re-export fixtures for test convenience
pub use deckcast_core::testing::fixtures;

/// In-process server with controllable generators.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Engine and mocks behind the router
    pub pipeline: TestPipeline,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    pub fn with_config(orchestrator: OrchestratorConfig) -> Self {
        let pipeline = TestPipeline::with_config(orchestrator.clone());
        let config = Config {
            orchestrator,
            ..Default::default()
        };

        let state = Arc::new(deckcast_server::state::AppState::new(
            config,
            Arc::clone(&pipeline.engine),
        ));
        let router = deckcast_server::api::create_router(state);

        Self { router, pipeline }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Poll a run's status until it reaches `status` or `timeout` passes.
    pub async fn wait_for_status(&self, run_id: &str, status: &str, timeout: Duration) -> Value {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let response = self.get(&format!("/api/v1/runs/{}/status", run_id)).await;
            if response.status == StatusCode::OK && response.body["status"] == status {
                return response.body;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "run {} did not reach {} (last: {})",
                    run_id, status, response.body
                );
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = match body {
            Some(json) => {
                request_builder = request_builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_string(&json).unwrap())
            }
            None => Body::empty(),
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
