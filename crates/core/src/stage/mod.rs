//! Pipeline stages.
//!
//! Each stage (outline, narration, audio) wraps an external content
//! generator behind the uniform [`StageExecutor`] contract:
//! - `validate_input`: cheap precondition check on the previous output
//! - `execute`: run the generator and persist its artifact
//! - `compensate`: best-effort undo of what `execute` persisted
//!
//! Stage order is fixed: outline, then narration, then audio.

mod artifacts;
mod audio;
mod error;
mod narration;
mod outline;
mod registry;
mod template;
mod traits;
mod types;

pub use audio::AudioStage;
pub use error::{CompensationError, GeneratorError, StageError, ValidationError};
pub use narration::NarrationStage;
pub use outline::OutlineStage;
pub use registry::StageSet;
pub use template::{TemplateAudioGenerator, TemplateNarrationGenerator, TemplateOutlineGenerator};
pub use traits::{AudioGenerator, NarrationGenerator, OutlineGenerator, StageExecutor};
pub use types::{
    GenerationOptions, StageContext, StageInput, StageKind, StageMetadata, StageOutputs,
    StageResult,
};
