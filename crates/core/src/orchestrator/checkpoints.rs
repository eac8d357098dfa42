//! Fixed progress values reported at each point of a run.
//!
//! These are part of the externally visible progress contract and are not
//! derived from the number of stages.

/// Run moved to running, before the first stage.
pub const STARTED: u8 = 5;

/// Outline stage complete.
pub const OUTLINE: u8 = 15;

/// Narration stage complete.
pub const NARRATION: u8 = 45;

/// Audio stage complete.
pub const AUDIO: u8 = 75;

/// All stages complete, writing the final record.
pub const FINALIZING: u8 = 95;

pub const COMPLETE: u8 = 100;
