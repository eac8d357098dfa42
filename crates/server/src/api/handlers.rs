use axum::{extract::State, http::header, response::IntoResponse, Json};
use deckcast_core::{Config, PipelineMetrics};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

/// Totals over every run that reached a terminal state.
pub async fn pipeline_metrics(State(state): State<Arc<AppState>>) -> Json<PipelineMetrics> {
    Json(state.engine().metrics())
}

/// Prometheus text exposition.
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
