//! Ratchet state and the trailing-stop fold.
//!
//! Per bar: candidate_long = close - atr * multiplier,
//! candidate_short = close + atr * multiplier.
//! - no previous stop: stop = candidate_long
//! - close > previous: stop = max(previous, candidate_long)
//! - close < previous: stop = min(previous, candidate_short)
//! - close == previous: stop = previous
//!
//! Direction is never an input. It is read off the sign of
//! `close - previous_stop` on every bar.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::error::CoreError;

/// Which branch of the ratchet produced a stop level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopSide {
    /// Close above the previous stop (or the seeding bar).
    Long,
    /// Close below the previous stop.
    Short,
    /// Close exactly on the previous stop; level carried unchanged.
    Tied,
}

/// One emitted stop level and the branch that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopStep {
    pub level: f64,
    pub side: StopSide,
}

/// Explicit accumulator for the ratchet recurrence.
///
/// Holds only the last emitted stop. Bars that cannot produce a stop leave it
/// untouched, so the ratchet resumes from the last defined level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatchetState {
    previous_stop: Option<f64>,
}

impl RatchetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ratchet that continues from an existing level.
    pub fn with_previous(level: f64) -> Self {
        Self {
            previous_stop: Some(level),
        }
    }

    /// Last emitted stop, if any.
    pub fn current_level(&self) -> Option<f64> {
        self.previous_stop
    }

    /// Advance the ratchet by one bar.
    ///
    /// Returns `None` without touching the state when `atr` is absent or
    /// either input is non-finite.
    pub fn step(&mut self, close: f64, atr: Option<f64>, multiplier: f64) -> Option<StopStep> {
        let atr = atr.filter(|a| a.is_finite())?;
        if !close.is_finite() {
            return None;
        }

        let offset = atr * multiplier;
        let candidate_long = close - offset;
        let candidate_short = close + offset;

        let step = match self.previous_stop {
            None => StopStep {
                level: candidate_long,
                side: StopSide::Long,
            },
            Some(prev) if close > prev => StopStep {
                level: prev.max(candidate_long),
                side: StopSide::Long,
            },
            Some(prev) if close < prev => StopStep {
                level: prev.min(candidate_short),
                side: StopSide::Short,
            },
            Some(prev) => StopStep {
                level: prev,
                side: StopSide::Tied,
            },
        };

        self.previous_stop = Some(step.level);
        Some(step)
    }
}

fn validate_multiplier(multiplier: f64) -> Result<(), CoreError> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(CoreError::invalid(
            "multiplier",
            format!("must be a positive finite number, got {multiplier}"),
        ));
    }
    Ok(())
}

/// Run the ratchet over `bars` and return every step, aligned with `bars`.
///
/// Index 0 is always `None`: there is no prior stop to ratchet from.
pub fn trailing_stop_steps(
    bars: &[Bar],
    atr: &[Option<f64>],
    multiplier: f64,
) -> Result<Vec<Option<StopStep>>, CoreError> {
    validate_multiplier(multiplier)?;
    if atr.len() != bars.len() {
        return Err(CoreError::LengthMismatch {
            bars: bars.len(),
            atr: atr.len(),
        });
    }

    let mut state = RatchetState::new();
    Ok(bars
        .iter()
        .zip(atr)
        .enumerate()
        .map(|(i, (bar, &atr))| {
            if i == 0 {
                None
            } else {
                state.step(bar.close, atr, multiplier)
            }
        })
        .collect())
}

/// Stop levels only, aligned with `bars`.
pub fn compute_trailing_stop(
    bars: &[Bar],
    atr: &[Option<f64>],
    multiplier: f64,
) -> Result<Vec<Option<f64>>, CoreError> {
    Ok(trailing_stop_steps(bars, atr, multiplier)?
        .into_iter()
        .map(|s| s.map(|s| s.level))
        .collect())
}
