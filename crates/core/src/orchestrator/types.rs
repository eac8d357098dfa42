//! Types for the pipeline engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::NarrationArtifact;
use crate::persistence::PersistenceError;
use crate::run::{Run, RunMode};
use crate::stage::StageOutputs;
use crate::tier::{FeatureSet, Tier, TierError};

/// Errors returned by engine operations.
///
/// Stage validation and execution failures are not here: they fail the run
/// and are reported through [`PipelineOutcome`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The tier does not allow the requested features. No run was created.
    #[error(transparent)]
    Tier(#[from] TierError),

    /// Run not found.
    #[error("run not found: {0}")]
    RunNotFound(String),

    /// Invalid run state for operation.
    #[error("invalid run state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Another start or resume of the same run is in progress.
    #[error("run {0} is already executing")]
    RunBusy(String),

    /// The engine has stopped accepting work.
    #[error("engine is shutting down")]
    ShuttingDown,

    /// Run or artifact store error.
    #[error("persistence error: {0}")]
    Persistence(PersistenceError),
}

impl From<PersistenceError> for OrchestratorError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::NotFound { kind: "run", id } => OrchestratorError::RunNotFound(id),
            PersistenceError::InvalidTransition { from, to, .. } => {
                OrchestratorError::InvalidState {
                    expected: format!("a state that may become {}", to),
                    actual: from.to_string(),
                }
            }
            other => OrchestratorError::Persistence(other),
        }
    }
}

/// A request to run the pipeline, however the caller parsed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub owner_id: String,
    #[serde(default)]
    pub mode: RunMode,
    pub features: FeatureSet,
    pub source_text: String,
    pub tier: Tier,
}

/// Inputs injected when a paused run is resumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeOverrides {
    /// Replaces the stored narration before the remaining stages run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_narration: Option<NarrationArtifact>,
}

/// What an execution produced, as reported to the caller.
///
/// `success` is false only when the run failed; a paused run reports
/// `success = true` with the partial outputs produced so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineOutcome {
    pub run_id: String,
    /// Status type after the call, e.g. "paused".
    pub status: String,
    pub success: bool,
    pub current_step: String,
    pub progress: u8,
    pub outputs: StageOutputs,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl PipelineOutcome {
    pub(crate) fn from_run(run: &Run, outputs: StageOutputs, errors: Vec<String>) -> Self {
        Self {
            run_id: run.id.clone(),
            status: run.status.state_type().to_string(),
            success: errors.is_empty(),
            current_step: run.current_step.clone(),
            progress: run.progress,
            outputs,
            errors,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.status == "paused"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::Feature;

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::RunNotFound("run-456".to_string());
        assert_eq!(err.to_string(), "run not found: run-456");

        let err = OrchestratorError::InvalidState {
            expected: "paused".to_string(),
            actual: "succeeded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid run state: expected paused, got succeeded"
        );
    }

    #[test]
    fn test_persistence_not_found_maps_to_run_not_found() {
        let err: OrchestratorError = PersistenceError::run_not_found("run-1").into();
        assert!(matches!(err, OrchestratorError::RunNotFound(id) if id == "run-1"));

        let err: OrchestratorError = PersistenceError::artifact_not_found("a-1").into();
        assert!(matches!(err, OrchestratorError::Persistence(_)));
    }

    #[test]
    fn test_start_request_from_json() {
        let json = r#"{
            "owner_id": "user-1",
            "features": ["outline", "narration"],
            "source_text": "Hello.",
            "tier": "standard"
        }"#;
        let request: StartRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.mode, RunMode::Auto);
        assert!(request.features.contains(Feature::Narration));
        assert_eq!(request.tier, Tier::Standard);
    }

    #[test]
    fn test_resume_overrides_default() {
        let overrides: ResumeOverrides = serde_json::from_str("{}").unwrap();
        assert!(overrides.edited_narration.is_none());
    }
}
