//! Types shared by all stages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactContent, AudioArtifact, NarrationArtifact, OutlineArtifact};
use crate::orchestrator::checkpoints;
use crate::tier::Feature;

/// A pipeline stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Outline,
    Narration,
    Audio,
}

impl StageKind {
    /// Fixed execution order.
    pub const ORDER: [StageKind; 3] = [StageKind::Outline, StageKind::Narration, StageKind::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Outline => "outline",
            StageKind::Narration => "narration",
            StageKind::Audio => "audio",
        }
    }

    /// The feature that requests this stage.
    pub fn feature(&self) -> Feature {
        match self {
            StageKind::Outline => Feature::Outline,
            StageKind::Narration => Feature::Narration,
            StageKind::Audio => Feature::Audio,
        }
    }

    pub fn from_feature(feature: Feature) -> Self {
        match feature {
            Feature::Outline => StageKind::Outline,
            Feature::Narration => StageKind::Narration,
            Feature::Audio => StageKind::Audio,
        }
    }

    /// The stage whose output this stage consumes, if any.
    pub fn prerequisite(&self) -> Option<StageKind> {
        match self {
            StageKind::Outline => None,
            StageKind::Narration => Some(StageKind::Outline),
            StageKind::Audio => Some(StageKind::Narration),
        }
    }

    /// Progress reported once this stage completes.
    pub fn checkpoint(&self) -> u8 {
        match self {
            StageKind::Outline => checkpoints::OUTLINE,
            StageKind::Narration => checkpoints::NARRATION,
            StageKind::Audio => checkpoints::AUDIO,
        }
    }

    /// `current_step` label written while this stage runs.
    pub fn running_step(&self) -> &'static str {
        match self {
            StageKind::Outline => "generating_outline",
            StageKind::Narration => "generating_narration",
            StageKind::Audio => "generating_audio",
        }
    }

    /// `current_step` label written once this stage completes.
    pub fn completed_step(&self) -> &'static str {
        match self {
            StageKind::Outline => "outline_ready",
            StageKind::Narration => "narration_ready",
            StageKind::Audio => "audio_ready",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options handed to the content generators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    /// Upper bound on slides in an outline.
    #[serde(default = "default_max_slides")]
    pub max_slides: usize,

    /// Speaking rate used to time narration audio.
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,

    /// Voice identifier passed to the audio generator.
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Audio container format.
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Optional BCP-47 language hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

fn default_max_slides() -> usize {
    12
}

fn default_words_per_minute() -> u32 {
    150
}

fn default_voice() -> String {
    "narrator".to_string()
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_slides: default_max_slides(),
            words_per_minute: default_words_per_minute(),
            voice: default_voice(),
            audio_format: default_audio_format(),
            language: None,
        }
    }
}

/// Outputs produced so far in a run. Doubles as the `outputs` section of the
/// result reported to callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<OutlineArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<NarrationArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioArtifact>,
}

impl StageOutputs {
    pub fn has(&self, kind: StageKind) -> bool {
        match kind {
            StageKind::Outline => self.outline.is_some(),
            StageKind::Narration => self.narration.is_some(),
            StageKind::Audio => self.audio.is_some(),
        }
    }

    /// Forget a stage's output.
    pub fn clear(&mut self, kind: StageKind) {
        match kind {
            StageKind::Outline => self.outline = None,
            StageKind::Narration => self.narration = None,
            StageKind::Audio => self.audio = None,
        }
    }

    /// Record a stage output, replacing any previous output of the same stage.
    pub fn set(&mut self, content: ArtifactContent) {
        match content {
            ArtifactContent::Outline(a) => self.outline = Some(a),
            ArtifactContent::Narration(a) => self.narration = Some(a),
            ArtifactContent::Audio(a) => self.audio = Some(a),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.outline.is_none() && self.narration.is_none() && self.audio.is_none()
    }
}

/// What a stage gets to look at: the run's source text and everything
/// produced before it.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub source_text: &'a str,
    pub outputs: &'a StageOutputs,
}

/// Per-execution context.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub run_id: String,
    pub options: GenerationOptions,
}

/// Counts describing a produced artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_count: Option<usize>,
    /// Length of produced media, for audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_duration_ms: Option<u64>,
}

impl StageMetadata {
    pub fn describe(content: &ArtifactContent) -> Self {
        match content {
            ArtifactContent::Outline(outline) => Self {
                slide_count: Some(outline.slide_count()),
                word_count: Some(outline.word_count()),
                ..Default::default()
            },
            ArtifactContent::Narration(narration) => Self {
                word_count: Some(narration.word_count()),
                segment_count: Some(narration.segments.len()),
                ..Default::default()
            },
            ArtifactContent::Audio(audio) => Self {
                segment_count: Some(audio.segments.len()),
                media_duration_ms: Some(audio.total_duration_ms),
                ..Default::default()
            },
        }
    }
}

/// Result of a successful stage execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageResult {
    pub stage: StageKind,
    /// Id of the persisted artifact.
    pub artifact_id: String,
    pub output: ArtifactContent,
    pub metadata: StageMetadata,
    /// Wall time spent in `execute`.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::NarrationArtifact;

    #[test]
    fn test_prerequisite_chain() {
        assert_eq!(StageKind::Outline.prerequisite(), None);
        assert_eq!(StageKind::Narration.prerequisite(), Some(StageKind::Outline));
        assert_eq!(StageKind::Audio.prerequisite(), Some(StageKind::Narration));
    }

    #[test]
    fn test_checkpoints_increase_in_order() {
        let values: Vec<u8> = StageKind::ORDER.iter().map(|s| s.checkpoint()).collect();
        assert_eq!(values, vec![15, 45, 75]);
    }

    #[test]
    fn test_feature_round_trip() {
        for kind in StageKind::ORDER {
            assert_eq!(StageKind::from_feature(kind.feature()), kind);
        }
    }

    #[test]
    fn test_outputs_set_and_has() {
        let mut outputs = StageOutputs::default();
        assert!(outputs.is_empty());

        outputs.set(ArtifactContent::Narration(NarrationArtifact::from_texts(["Hi"])));
        assert!(outputs.has(StageKind::Narration));
        assert!(!outputs.has(StageKind::Outline));

        let json = serde_json::to_value(&outputs).unwrap();
        assert!(json.get("audio").is_none());
        assert!(json.get("narration").is_some());
    }

    #[test]
    fn test_default_generation_options() {
        let options = GenerationOptions::default();
        assert_eq!(options.max_slides, 12);
        assert_eq!(options.words_per_minute, 150);

        let parsed: GenerationOptions = toml::from_str("voice = \"alto\"").unwrap();
        assert_eq!(parsed.voice, "alto");
        assert_eq!(parsed.audio_format, "mp3");
    }
}
