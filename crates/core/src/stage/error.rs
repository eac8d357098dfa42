//! Stage error taxonomy.

use thiserror::Error;

use crate::persistence::PersistenceError;

use super::StageKind;

/// A stage's input failed its precondition check. No artifact was produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{stage}: source text is empty")]
    EmptySource { stage: StageKind },

    #[error("{stage}: missing {required} output")]
    MissingPrerequisite {
        stage: StageKind,
        required: StageKind,
    },

    #[error("{stage}: {required} output is empty")]
    EmptyPrerequisite {
        stage: StageKind,
        required: StageKind,
    },
}

/// Failure reported by an external content generator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{generator}: {message}")]
pub struct GeneratorError {
    pub generator: String,
    pub message: String,
}

impl GeneratorError {
    pub fn new(generator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            generator: generator.into(),
            message: message.into(),
        }
    }
}

/// A stage failed while executing.
#[derive(Debug, Error)]
pub enum StageError {
    /// The content generator failed.
    #[error("{stage} generation failed: {source}")]
    Generator {
        stage: StageKind,
        #[source]
        source: GeneratorError,
    },

    /// The generated artifact could not be stored.
    #[error("{stage} artifact could not be stored: {source}")]
    Persistence {
        stage: StageKind,
        #[source]
        source: PersistenceError,
    },

    /// The stage was invoked without the output it consumes.
    #[error("{stage}: missing {required} output")]
    MissingInput {
        stage: StageKind,
        required: StageKind,
    },
}

impl StageError {
    pub fn stage(&self) -> StageKind {
        match self {
            StageError::Generator { stage, .. }
            | StageError::Persistence { stage, .. }
            | StageError::MissingInput { stage, .. } => *stage,
        }
    }
}

/// Best-effort undo failed. Logged and noted on the run, never fatal.
#[derive(Debug, Error)]
#[error("compensation of {stage} artifact {artifact_id} failed: {reason}")]
pub struct CompensationError {
    pub stage: StageKind,
    pub artifact_id: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValidationError::MissingPrerequisite {
            stage: StageKind::Audio,
            required: StageKind::Narration,
        };
        assert_eq!(err.to_string(), "audio: missing narration output");

        let err = StageError::Generator {
            stage: StageKind::Audio,
            source: GeneratorError::new("tts", "voice unavailable"),
        };
        assert_eq!(
            err.to_string(),
            "audio generation failed: tts: voice unavailable"
        );
        assert_eq!(err.stage(), StageKind::Audio);

        let err = CompensationError {
            stage: StageKind::Outline,
            artifact_id: "a-1".to_string(),
            reason: "locked".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "compensation of outline artifact a-1 failed: locked"
        );
    }
}
