//! Trailing stop ratchet.
//!
//! **Core Rule:** while the close stays on one side of the stop, the stop may
//! only move toward price, never away from it (even if ATR expands).

pub mod ratchet;

pub use ratchet::{compute_trailing_stop, trailing_stop_steps, RatchetState, StopSide, StopStep};
