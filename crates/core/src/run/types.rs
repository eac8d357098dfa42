//! Core run data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::StageKind;
use crate::tier::{FeatureSet, Tier};

/// How much human review a run gets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Run straight through.
    #[default]
    Auto,
    /// Pause for review after narration when audio is requested.
    Hybrid,
    /// Same pause point as hybrid; the caller drives every resume.
    Manual,
}

impl RunMode {
    pub const ALL: [RunMode; 3] = [RunMode::Auto, RunMode::Hybrid, RunMode::Manual];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Auto => "auto",
            RunMode::Hybrid => "hybrid",
            RunMode::Manual => "manual",
        }
    }

    /// Whether the run stops for review after narration.
    pub fn pauses_for_review(&self) -> bool {
        matches!(self, RunMode::Hybrid | RunMode::Manual)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(RunMode::Auto),
            "hybrid" => Ok(RunMode::Hybrid),
            "manual" => Ok(RunMode::Manual),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// State of a run. Per-state data lives on the variant, so an error message
/// can only exist on a failed run and a pause reason only on a paused one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet started.
    Pending,

    /// Stages are executing.
    Running { started_at: DateTime<Utc> },

    /// Suspended between stages until resumed.
    Paused {
        reason: String,
        paused_at: DateTime<Utc>,
    },

    /// Every requested stage completed.
    Succeeded { completed_at: DateTime<Utc> },

    /// A stage failed. Compensation notes are appended to `error_detail`.
    Failed {
        error_message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_detail: Option<String>,
        failed_at: DateTime<Utc>,
    },
}

impl RunStatus {
    /// Every value [`Self::state_type`] can return.
    pub const STATE_TYPES: [&'static str; 5] =
        ["pending", "running", "paused", "succeeded", "failed"];

    /// Returns the state type as a string (for filtering).
    pub fn state_type(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running { .. } => "running",
            RunStatus::Paused { .. } => "paused",
            RunStatus::Succeeded { .. } => "succeeded",
            RunStatus::Failed { .. } => "failed",
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded { .. } | RunStatus::Failed { .. })
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, RunStatus::Paused { .. })
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Self-transitions on running and paused runs are allowed so progress
    /// can be written without changing state. A paused run may still fail:
    /// a stage that was in flight when the pause arrived can finish badly.
    pub fn can_transition_to(&self, next: &RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, next),
            (Pending, Running { .. })
                | (Running { .. }, Running { .. })
                | (Running { .. }, Paused { .. })
                | (Running { .. }, Succeeded { .. })
                | (Running { .. }, Failed { .. })
                | (Paused { .. }, Paused { .. })
                | (Paused { .. }, Running { .. })
                | (Paused { .. }, Failed { .. })
        )
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            RunStatus::Failed { error_message, .. } => Some(error_message),
            _ => None,
        }
    }

    pub fn pause_reason(&self) -> Option<&str> {
        match self {
            RunStatus::Paused { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Ids of the artifacts a run has produced, one slot per stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedArtifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

impl LinkedArtifacts {
    pub fn get(&self, stage: StageKind) -> Option<&str> {
        match stage {
            StageKind::Outline => self.outline.as_deref(),
            StageKind::Narration => self.narration.as_deref(),
            StageKind::Audio => self.audio.as_deref(),
        }
    }

    pub fn set(&mut self, stage: StageKind, artifact_id: impl Into<String>) {
        let slot = self.slot_mut(stage);
        *slot = Some(artifact_id.into());
    }

    pub fn clear(&mut self, stage: StageKind) {
        *self.slot_mut(stage) = None;
    }

    pub fn len(&self) -> usize {
        StageKind::ORDER
            .iter()
            .filter(|s| self.get(**s).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_mut(&mut self, stage: StageKind) -> &mut Option<String> {
        match stage {
            StageKind::Outline => &mut self.outline,
            StageKind::Narration => &mut self.narration,
            StageKind::Audio => &mut self.audio,
        }
    }
}

/// A pipeline run as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    /// Unique identifier (UUID).
    pub id: String,

    /// Who submitted the run.
    pub owner_id: String,

    /// Entitlement the request was gated against.
    pub tier: Tier,

    pub mode: RunMode,

    /// Features that passed the tier gate.
    pub requested_features: FeatureSet,

    pub status: RunStatus,

    /// Free-text checkpoint label.
    pub current_step: String,

    /// 0-100, never decreases.
    pub progress: u8,

    #[serde(default)]
    pub linked_artifacts: LinkedArtifacts,

    /// The submitted document. Kept so a resumed run can regenerate a
    /// missing outline.
    pub source_text: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub fn error_message(&self) -> Option<&str> {
        self.status.error_message()
    }

    pub fn pause_reason(&self) -> Option<&str> {
        self.status.pause_reason()
    }
}
