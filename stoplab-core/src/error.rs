//! Errors raised by the core before any computation starts.
//!
//! Absent series values are not errors. They are `None` entries in the
//! returned vectors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("insufficient data: {required} bars required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("series length mismatch: {bars} bars but {atr} ATR values")]
    LengthMismatch { bars: usize, atr: usize },
}

impl CoreError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
