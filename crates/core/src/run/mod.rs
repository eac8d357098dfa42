//! Run records: the durable, authoritative state of each pipeline run.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteRunStore;
pub use store::{CreateRunRequest, RunStore};
pub use types::{LinkedArtifacts, Run, RunMode, RunStatus};
