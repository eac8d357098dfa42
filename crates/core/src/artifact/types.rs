//! Artifact data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::StageKind;

/// A single slide in an outline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slide {
    /// Zero-based position in the deck.
    pub index: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bullets: Vec<String>,
}

/// Output of the outline stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutlineArtifact {
    pub title: String,
    pub slides: Vec<Slide>,
}

impl OutlineArtifact {
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn word_count(&self) -> usize {
        self.slides
            .iter()
            .map(|s| {
                count_words(&s.title) + s.bullets.iter().map(|b| count_words(b)).sum::<usize>()
            })
            .sum()
    }
}

/// Narration for one slide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NarrationSegment {
    pub slide_index: u32,
    pub text: String,
}

/// Output of the narration stage: the script read over the slides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NarrationArtifact {
    pub segments: Vec<NarrationSegment>,
}

impl NarrationArtifact {
    /// Build a narration from plain per-slide texts, in slide order.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: texts
                .into_iter()
                .enumerate()
                .map(|(i, text)| NarrationSegment {
                    slide_index: i as u32,
                    text: text.into(),
                })
                .collect(),
        }
    }

    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|s| count_words(&s.text)).sum()
    }

    /// True when there is nothing to read.
    pub fn is_blank(&self) -> bool {
        self.segments.iter().all(|s| s.text.trim().is_empty())
    }
}

/// One timed segment of the audio track, aligned to a slide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioSegment {
    pub slide_index: u32,
    pub start_ms: u64,
    pub duration_ms: u64,
}

/// Output of the audio stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioArtifact {
    /// Where the rendered audio lives.
    pub uri: String,
    /// Container/codec, e.g. "mp3".
    pub format: String,
    pub voice: String,
    pub segments: Vec<AudioSegment>,
    pub total_duration_ms: u64,
}

/// Content of a stored artifact, tagged by the stage that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactContent {
    Outline(OutlineArtifact),
    Narration(NarrationArtifact),
    Audio(AudioArtifact),
}

impl ArtifactContent {
    pub fn kind(&self) -> StageKind {
        match self {
            ArtifactContent::Outline(_) => StageKind::Outline,
            ArtifactContent::Narration(_) => StageKind::Narration,
            ArtifactContent::Audio(_) => StageKind::Audio,
        }
    }
}

/// An artifact as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredArtifact {
    pub id: String,
    pub run_id: String,
    pub content: ArtifactContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredArtifact {
    pub fn kind(&self) -> StageKind {
        self.content.kind()
    }
}

pub(crate) fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
