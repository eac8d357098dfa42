//! Template-based content generators.
//!
//! Deterministic generators that need no external service. They shape the
//! source text into slides, read the slides back as a script, and time that
//! script at a fixed speaking rate. Real deployments plug in their own
//! generators through the same traits.

use async_trait::async_trait;

use crate::artifact::{
    count_words, AudioArtifact, AudioSegment, NarrationArtifact, NarrationSegment,
    OutlineArtifact, Slide,
};

use super::error::GeneratorError;
use super::traits::{AudioGenerator, NarrationGenerator, OutlineGenerator};
use super::types::GenerationOptions;

const GENERATOR_NAME: &str = "template";

/// Longest slide title kept before truncation.
const MAX_TITLE_CHARS: usize = 80;

/// Most bullets kept per slide.
const MAX_BULLETS: usize = 5;

/// One slide per paragraph; the first sentence titles the slide.
#[derive(Debug, Clone, Default)]
pub struct TemplateOutlineGenerator;

impl TemplateOutlineGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OutlineGenerator for TemplateOutlineGenerator {
    fn name(&self) -> &str {
        GENERATOR_NAME
    }

    async fn generate_outline(
        &self,
        source_text: &str,
        options: &GenerationOptions,
    ) -> Result<OutlineArtifact, GeneratorError> {
        let mut deck_title: Option<String> = None;
        let mut slides: Vec<Slide> = Vec::new();

        for paragraph in paragraphs(source_text) {
            if slides.len() >= options.max_slides {
                break;
            }

            let mut lines = paragraph.lines();
            let first = lines.next().unwrap_or_default().trim();

            let (title, body) = if let Some(heading) = strip_heading(first) {
                let body: Vec<&str> = lines.collect();
                if body.is_empty() && deck_title.is_none() && slides.is_empty() {
                    deck_title = Some(heading.to_string());
                    continue;
                }
                (heading.to_string(), body.join(" "))
            } else {
                let mut sentences = sentences(&paragraph).into_iter();
                let title = sentences.next().unwrap_or_default();
                (title, sentences.collect::<Vec<_>>().join(" "))
            };

            let bullets = sentences(&body)
                .into_iter()
                .take(MAX_BULLETS)
                .collect::<Vec<_>>();

            slides.push(Slide {
                index: slides.len() as u32,
                title: slide_title(&title),
                bullets,
            });
        }

        if slides.is_empty() {
            return Err(GeneratorError::new(
                GENERATOR_NAME,
                "source text has no usable content",
            ));
        }

        let title = deck_title.unwrap_or_else(|| slides[0].title.clone());
        Ok(OutlineArtifact { title, slides })
    }
}

/// Reads each slide aloud with a short transition.
#[derive(Debug, Clone, Default)]
pub struct TemplateNarrationGenerator;

impl TemplateNarrationGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NarrationGenerator for TemplateNarrationGenerator {
    fn name(&self) -> &str {
        GENERATOR_NAME
    }

    async fn generate_narration(
        &self,
        outline: &OutlineArtifact,
        _options: &GenerationOptions,
    ) -> Result<NarrationArtifact, GeneratorError> {
        if outline.slides.is_empty() {
            return Err(GeneratorError::new(GENERATOR_NAME, "outline has no slides"));
        }

        let last = outline.slides.len() - 1;
        let segments = outline
            .slides
            .iter()
            .enumerate()
            .map(|(i, slide)| {
                let mut parts = Vec::with_capacity(slide.bullets.len() + 2);
                if i == 0 {
                    parts.push(format!(
                        "Welcome to {}. We begin with {}.",
                        trim_end_punctuation(&outline.title),
                        trim_end_punctuation(&slide.title)
                    ));
                } else {
                    parts.push(format!("Next, {}.", trim_end_punctuation(&slide.title)));
                }
                parts.extend(slide.bullets.iter().map(|b| as_sentence(b)));
                if i == last {
                    parts.push(format!(
                        "That concludes {}.",
                        trim_end_punctuation(&outline.title)
                    ));
                }

                NarrationSegment {
                    slide_index: slide.index,
                    text: parts.join(" "),
                }
            })
            .collect();

        Ok(NarrationArtifact { segments })
    }
}

/// Times narration at `words_per_minute` and returns a synthetic track.
#[derive(Debug, Clone, Default)]
pub struct TemplateAudioGenerator;

impl TemplateAudioGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioGenerator for TemplateAudioGenerator {
    fn name(&self) -> &str {
        GENERATOR_NAME
    }

    async fn generate_audio(
        &self,
        narration: &NarrationArtifact,
        options: &GenerationOptions,
    ) -> Result<AudioArtifact, GeneratorError> {
        if options.words_per_minute == 0 {
            return Err(GeneratorError::new(
                GENERATOR_NAME,
                "words_per_minute must be positive",
            ));
        }

        let ms_per_word = 60_000 / u64::from(options.words_per_minute);
        let mut cursor = 0u64;
        let segments = narration
            .segments
            .iter()
            .map(|segment| {
                let words = count_words(&segment.text).max(1) as u64;
                let duration_ms = words * ms_per_word;
                let audio_segment = AudioSegment {
                    slide_index: segment.slide_index,
                    start_ms: cursor,
                    duration_ms,
                };
                cursor += duration_ms;
                audio_segment
            })
            .collect();

        Ok(AudioArtifact {
            uri: format!(
                "synthetic://audio/{}.{}",
                uuid::Uuid::new_v4(),
                options.audio_format
            ),
            format: options.audio_format.clone(),
            voice: options.voice.clone(),
            segments,
            total_duration_ms: cursor,
        })
    }
}

/// Non-empty paragraphs separated by blank lines.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

/// Split on sentence-ending punctuation followed by whitespace.
fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(if c == '\n' { ' ' } else { c });
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            push_sentence(&mut out, &current);
            current.clear();
        }
    }
    push_sentence(&mut out, &current);
    out
}

fn push_sentence(out: &mut Vec<String>, raw: &str) {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.is_empty() {
        out.push(collapsed);
    }
}

fn strip_heading(line: &str) -> Option<&str> {
    let stripped = line.trim_start_matches('#');
    if stripped.len() == line.len() {
        return None;
    }
    let heading = stripped.trim();
    (!heading.is_empty()).then_some(heading)
}

fn slide_title(raw: &str) -> String {
    let title = trim_end_punctuation(raw);
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let truncated: String = title.chars().take(MAX_TITLE_CHARS).collect();
    match truncated.rfind(' ') {
        Some(pos) if pos > 0 => format!("{}...", &truncated[..pos]),
        _ => format!("{}...", truncated),
    }
}

fn trim_end_punctuation(text: &str) -> &str {
    text.trim().trim_end_matches(['.', '!', '?', ':', ';', ','])
}

fn as_sentence(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.ends_with(['.', '!', '?']) {
        trimmed.to_string()
    } else {
        format!("{}.", trimmed)
    }
}
