//! Run API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use deckcast_core::run::LinkedArtifacts;
use deckcast_core::{
    FeatureSet, OrchestratorError, PipelineOutcome, ResumeOverrides, Run, RunMode, RunStatus,
    StartRequest, StatusSnapshot, StoredArtifact, Tier,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::state::AppState;

/// Maximum allowed limit for run listings
const MAX_LIMIT: usize = 500;

/// Pause reason recorded when the caller gives none
const DEFAULT_PAUSE_REASON: &str = "paused_by_user";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a run
#[derive(Debug, Deserialize)]
pub struct CreateRunBody {
    pub owner_id: String,
    #[serde(default)]
    pub mode: RunMode,
    pub features: FeatureSet,
    pub source_text: String,
    pub tier: Tier,
    /// Run to completion (or pause) before responding
    #[serde(default)]
    pub wait: bool,
}

/// Query parameters for listing runs
#[derive(Debug, Deserialize)]
pub struct ListRunsParams {
    /// Owner whose runs to list (required)
    pub owner_id: Option<String>,
    /// Maximum number of runs to return
    pub limit: Option<usize>,
}

/// Request body for pausing a run
#[derive(Debug, Default, Deserialize)]
pub struct PauseRunBody {
    pub reason: Option<String>,
}

/// Response for run operations
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub id: String,
    pub owner_id: String,
    pub tier: Tier,
    pub mode: RunMode,
    pub requested_features: FeatureSet,
    pub status: RunStatus,
    pub current_step: String,
    pub progress: u8,
    pub linked_artifacts: LinkedArtifacts,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Run> for RunResponse {
    fn from(run: Run) -> Self {
        Self {
            id: run.id,
            owner_id: run.owner_id,
            tier: run.tier,
            mode: run.mode,
            requested_features: run.requested_features,
            status: run.status,
            current_step: run.current_step,
            progress: run.progress,
            linked_artifacts: run.linked_artifacts,
            created_at: run.created_at.to_rfc3339(),
            updated_at: run.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing runs
#[derive(Debug, Serialize)]
pub struct ListRunsResponse {
    pub runs: Vec<RunResponse>,
    pub limit: usize,
}

/// Response for listing artifacts
#[derive(Debug, Serialize)]
pub struct ListArtifactsResponse {
    pub artifacts: Vec<StoredArtifact>,
    pub total: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn engine_error(e: OrchestratorError) -> ApiError {
    let status = match &e {
        OrchestratorError::Tier(_) => StatusCode::FORBIDDEN,
        OrchestratorError::RunNotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::InvalidState { .. } | OrchestratorError::RunBusy(_) => {
            StatusCode::CONFLICT
        }
        OrchestratorError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::Persistence(_) => {
            error!("Run store error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a run.
///
/// Returns 202 with the pending run, or 200 with the outcome when `wait`
/// is set.
pub async fn create_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRunBody>,
) -> Result<Response, ApiError> {
    if body.owner_id.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "owner_id must not be empty"));
    }

    let request = StartRequest {
        owner_id: body.owner_id,
        mode: body.mode,
        features: body.features,
        source_text: body.source_text,
        tier: body.tier,
    };

    let engine = state.engine();
    if body.wait {
        let outcome = engine.start(request).await.map_err(engine_error)?;
        Ok((StatusCode::OK, Json(outcome)).into_response())
    } else {
        let run = engine.submit(request).await.map_err(engine_error)?;
        Ok((StatusCode::ACCEPTED, Json(RunResponse::from(run))).into_response())
    }
}

/// List an owner's runs, newest first
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListRunsParams>,
) -> Result<Json<ListRunsResponse>, ApiError> {
    let owner_id = params
        .owner_id
        .filter(|o| !o.trim().is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "owner_id is required"))?;

    let engine = state.engine();
    let limit = params
        .limit
        .unwrap_or(engine.config().default_list_limit)
        .min(MAX_LIMIT);

    let runs = engine
        .list_runs(&owner_id, Some(limit))
        .map_err(engine_error)?;

    Ok(Json(ListRunsResponse {
        runs: runs.into_iter().map(RunResponse::from).collect(),
        limit,
    }))
}

/// Get a run by ID
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RunResponse>, ApiError> {
    let run = state.engine().get_run(&id).map_err(engine_error)?;
    Ok(Json(run.into()))
}

/// Current status of a run
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    let snapshot = state.engine().status(&id).await.map_err(engine_error)?;
    Ok(Json(snapshot))
}

/// Drop a run's cached status
pub async fn cleanup_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.engine().cleanup_status(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("no cached status for run {}", id),
        ))
    }
}

/// Pause a running run after its current stage
pub async fn pause_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<PauseRunBody>>,
) -> Result<Json<RunResponse>, ApiError> {
    let reason = body
        .and_then(|Json(b)| b.reason)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PAUSE_REASON.to_string());

    let run = state
        .engine()
        .pause(&id, &reason)
        .await
        .map_err(engine_error)?;
    Ok(Json(run.into()))
}

/// Resume a paused run and drive it until it finishes or pauses again
pub async fn resume_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<ResumeOverrides>>,
) -> Result<Json<PipelineOutcome>, ApiError> {
    let overrides = body.map(|Json(o)| o).unwrap_or_default();

    let outcome = state
        .engine()
        .resume(&id, overrides)
        .await
        .map_err(engine_error)?;
    Ok(Json(outcome))
}

/// Artifacts stored for a run
pub async fn list_artifacts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ListArtifactsResponse>, ApiError> {
    let artifacts = state.engine().list_artifacts(&id).map_err(engine_error)?;
    Ok(Json(ListArtifactsResponse {
        total: artifacts.len(),
        artifacts,
    }))
}
