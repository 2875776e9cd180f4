//! StopLab Core — volatility-adaptive trailing stops.
//!
//! This crate contains the pure computation:
//! - Domain types (bars)
//! - True Range and Wilder-smoothed ATR with explicit warm-up absence
//! - Trailing stop ratchet that infers direction from close vs. previous stop
//! - Aligned (date, high, low, close, atr, stop) series with fingerprinting
//!
//! Nothing here performs I/O or holds state between invocations.

pub mod domain;
pub mod error;
pub mod indicators;
pub mod pipeline;
pub mod stops;

pub use domain::Bar;
pub use error::CoreError;
pub use pipeline::{compute_stop_series, StopParams, StopRow, StopSeries};
pub use stops::{compute_trailing_stop, RatchetState, StopSide, StopStep};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a caller may hand to another thread is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<StopParams>();
        require_sync::<StopParams>();
        require_send::<StopSeries>();
        require_sync::<StopSeries>();
        require_send::<RatchetState>();
        require_sync::<RatchetState>();
        require_send::<CoreError>();
        require_sync::<CoreError>();
        require_send::<indicators::Atr>();
        require_sync::<indicators::Atr>();
    }
}
