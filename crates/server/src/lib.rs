//! HTTP surface for the deckcast pipeline engine.

pub mod api;
pub mod metrics;
pub mod state;
