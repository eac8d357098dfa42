//! Mock content generators for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};

use crate::artifact::{
    AudioArtifact, AudioSegment, NarrationArtifact, OutlineArtifact, Slide,
};
use crate::stage::{
    AudioGenerator, GenerationOptions, GeneratorError, NarrationGenerator, OutlineGenerator,
};

/// Behaviour shared by every mock generator.
#[derive(Debug)]
struct MockBehavior {
    /// Number of generate calls made so far.
    calls: RwLock<usize>,
    /// If set, the next call fails with this error.
    next_error: RwLock<Option<GeneratorError>>,
    /// If true, every call fails.
    always_fail: RwLock<bool>,
    /// Simulated generation time.
    delay: RwLock<Duration>,
    /// If set, calls wait for a permit before producing output.
    gate: RwLock<Option<Arc<Semaphore>>>,
}

impl MockBehavior {
    fn new() -> Self {
        Self {
            calls: RwLock::new(0),
            next_error: RwLock::new(None),
            always_fail: RwLock::new(false),
            delay: RwLock::new(Duration::ZERO),
            gate: RwLock::new(None),
        }
    }

    /// Count the call, wait as configured, then report any injected failure.
    async fn enter(&self, generator: &str) -> Result<(), GeneratorError> {
        *self.calls.write().await += 1;

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let gate = self.gate.read().await.clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if *self.always_fail.read().await {
            return Err(GeneratorError::new(generator, "mock failure"));
        }
        Ok(())
    }

    async fn hold(&self) -> GateHandle {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.write().await = Some(Arc::clone(&gate));
        GateHandle { gate }
    }
}

/// Releases calls held by a mock generator's gate.
#[derive(Debug, Clone)]
pub struct GateHandle {
    gate: Arc<Semaphore>,
}

impl GateHandle {
    /// Let one held (or future) call proceed.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

macro_rules! behavior_controls {
    () => {
        /// Number of generate calls made so far.
        pub async fn call_count(&self) -> usize {
            *self.behavior.calls.read().await
        }

        /// Configure the next call to fail with the given error.
        pub async fn set_next_error(&self, error: GeneratorError) {
            *self.behavior.next_error.write().await = Some(error);
        }

        /// Make every call fail (or stop doing so).
        pub async fn set_always_fail(&self, fail: bool) {
            *self.behavior.always_fail.write().await = fail;
        }

        /// Set the simulated generation time.
        pub async fn set_delay(&self, delay: Duration) {
            *self.behavior.delay.write().await = delay;
        }

        /// Hold every call until released through the returned handle.
        pub async fn hold(&self) -> GateHandle {
            self.behavior.hold().await
        }
    };
}

/// Mock implementation of [`OutlineGenerator`].
///
/// Produces one slide per non-empty line of the source text and records every
/// source it was given.
#[derive(Debug)]
pub struct MockOutlineGenerator {
    behavior: MockBehavior,
    sources: RwLock<Vec<String>>,
}

impl Default for MockOutlineGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOutlineGenerator {
    pub fn new() -> Self {
        Self {
            behavior: MockBehavior::new(),
            sources: RwLock::new(Vec::new()),
        }
    }

    behavior_controls!();

    /// Source texts received, in call order.
    pub async fn recorded_sources(&self) -> Vec<String> {
        self.sources.read().await.clone()
    }
}

#[async_trait]
impl OutlineGenerator for MockOutlineGenerator {
    fn name(&self) -> &str {
        "mock-outline"
    }

    async fn generate_outline(
        &self,
        source_text: &str,
        options: &GenerationOptions,
    ) -> Result<OutlineArtifact, GeneratorError> {
        self.sources.write().await.push(source_text.to_string());
        self.behavior.enter(self.name()).await?;

        let slides = source_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(options.max_slides)
            .enumerate()
            .map(|(i, line)| Slide {
                index: i as u32,
                title: line.to_string(),
                bullets: vec![format!("point {}", i + 1)],
            })
            .collect();

        Ok(OutlineArtifact {
            title: "Mock Deck".to_string(),
            slides,
        })
    }
}

/// Mock implementation of [`NarrationGenerator`].
///
/// Narrates each slide as "Slide N: title." and records every outline it saw.
#[derive(Debug)]
pub struct MockNarrationGenerator {
    behavior: MockBehavior,
    outlines: RwLock<Vec<OutlineArtifact>>,
}

impl Default for MockNarrationGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNarrationGenerator {
    pub fn new() -> Self {
        Self {
            behavior: MockBehavior::new(),
            outlines: RwLock::new(Vec::new()),
        }
    }

    behavior_controls!();

    /// Outlines received, in call order.
    pub async fn recorded_outlines(&self) -> Vec<OutlineArtifact> {
        self.outlines.read().await.clone()
    }
}

#[async_trait]
impl NarrationGenerator for MockNarrationGenerator {
    fn name(&self) -> &str {
        "mock-narration"
    }

    async fn generate_narration(
        &self,
        outline: &OutlineArtifact,
        _options: &GenerationOptions,
    ) -> Result<NarrationArtifact, GeneratorError> {
        self.outlines.write().await.push(outline.clone());
        self.behavior.enter(self.name()).await?;

        Ok(NarrationArtifact::from_texts(
            outline
                .slides
                .iter()
                .map(|slide| format!("Slide {}: {}.", slide.index + 1, slide.title)),
        ))
    }
}

/// Mock implementation of [`AudioGenerator`].
///
/// Gives every segment one second of audio. Records the narration it was asked
/// to render and every audio it was asked to discard.
#[derive(Debug)]
pub struct MockAudioGenerator {
    behavior: MockBehavior,
    narrations: RwLock<Vec<NarrationArtifact>>,
    discarded: RwLock<Vec<AudioArtifact>>,
    discard_error: RwLock<Option<GeneratorError>>,
}

impl Default for MockAudioGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAudioGenerator {
    pub fn new() -> Self {
        Self {
            behavior: MockBehavior::new(),
            narrations: RwLock::new(Vec::new()),
            discarded: RwLock::new(Vec::new()),
            discard_error: RwLock::new(None),
        }
    }

    behavior_controls!();

    /// Narrations received, in call order.
    pub async fn recorded_narrations(&self) -> Vec<NarrationArtifact> {
        self.narrations.read().await.clone()
    }

    /// Audio passed to `discard_audio`, in call order.
    pub async fn discarded(&self) -> Vec<AudioArtifact> {
        self.discarded.read().await.clone()
    }

    /// Configure the next `discard_audio` call to fail.
    pub async fn set_discard_error(&self, error: GeneratorError) {
        *self.discard_error.write().await = Some(error);
    }
}

#[async_trait]
impl AudioGenerator for MockAudioGenerator {
    fn name(&self) -> &str {
        "mock-audio"
    }

    async fn generate_audio(
        &self,
        narration: &NarrationArtifact,
        options: &GenerationOptions,
    ) -> Result<AudioArtifact, GeneratorError> {
        self.narrations.write().await.push(narration.clone());
        self.behavior.enter(self.name()).await?;

        let segments: Vec<AudioSegment> = narration
            .segments
            .iter()
            .enumerate()
            .map(|(i, segment)| AudioSegment {
                slide_index: segment.slide_index,
                start_ms: i as u64 * 1000,
                duration_ms: 1000,
            })
            .collect();
        let total_duration_ms = segments.len() as u64 * 1000;

        Ok(AudioArtifact {
            uri: format!("mock://audio/{}.{}", uuid::Uuid::new_v4(), options.audio_format),
            format: options.audio_format.clone(),
            voice: options.voice.clone(),
            segments,
            total_duration_ms,
        })
    }

    async fn discard_audio(&self, audio: &AudioArtifact) -> Result<(), GeneratorError> {
        self.discarded.write().await.push(audio.clone());
        match self.discard_error.write().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
