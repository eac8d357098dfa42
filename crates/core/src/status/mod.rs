//! Ephemeral status cache for polling callers.
//!
//! The run store stays authoritative; snapshots here are a fast-path mirror
//! written alongside every engine transition.

mod cache;

pub use cache::{StatusCache, StatusSnapshot, StatusUpdate};
