//! Errors shared by the durable stores.

use thiserror::Error;

/// The durable store could not complete an operation.
///
/// The engine treats this as fatal for the call in progress: without the
/// store it cannot guarantee the run record matches what actually happened.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Record not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The requested status change is not a legal state-machine transition.
    #[error("run {run_id}: cannot transition from {from} to {to}")]
    InvalidTransition {
        run_id: String,
        from: &'static str,
        to: &'static str,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl PersistenceError {
    pub fn run_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "run",
            id: id.into(),
        }
    }

    pub fn artifact_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "artifact",
            id: id.into(),
        }
    }

    /// Whether this error means the record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
