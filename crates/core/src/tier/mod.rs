//! Tier-based feature gating.
//!
//! The gate is a pure function over a static entitlement table. It must pass
//! before a run record is created, so a rejected request leaves no trace in
//! the run store.

mod gate;
mod types;

pub use gate::{allowed_features, validate, TierError};
pub use types::{Feature, FeatureSet, Tier};
