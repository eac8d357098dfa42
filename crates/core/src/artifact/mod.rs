//! Stage artifacts and their durable store.
//!
//! Every stage output (outline, narration, audio timeline) is written here
//! before its id is linked to the run. Compensation deletes from this store.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteArtifactStore;
pub use store::ArtifactStore;
pub(crate) use types::count_words;
pub use types::{
    ArtifactContent, AudioArtifact, AudioSegment, NarrationArtifact, NarrationSegment,
    OutlineArtifact, Slide, StoredArtifact,
};
