//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! TR[0] is absent: the first bar has no previous close.
//! ATR uses Wilder smoothing: seed = mean of the first `period` TR values,
//! then ATR[t] = (ATR[t-1] * (period-1) + TR[t]) / period.
//! Lookback: period (the seed lands on index `period`).

use super::Indicator;
use crate::domain::Bar;
use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    /// Panics on `period == 0`; use [`compute_atr`] for a checked entry point.
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// Compute the True Range series from bars.
///
/// A TR built from any non-finite input is `None`, as is TR[0].
pub fn true_range(bars: &[Bar]) -> Vec<Option<f64>> {
    let mut tr = Vec::with_capacity(bars.len());
    if bars.is_empty() {
        return tr;
    }
    tr.push(None);

    for pair in bars.windows(2) {
        let (h, l, pc) = (pair[1].high, pair[1].low, pair[0].close);
        if h.is_finite() && l.is_finite() && pc.is_finite() {
            tr.push(Some((h - l).max((h - pc).abs()).max((l - pc).abs())));
        } else {
            tr.push(None);
        }
    }

    tr
}

/// Apply Wilder smoothing to a series.
///
/// The seed is the mean of the first `period` consecutive defined values and
/// is written at the last index of that window. Once smoothing has started, a
/// `None` input ends it: that index and every later one are `None`.
pub fn wilder_smooth(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut result = vec![None; n];

    if period == 0 || n < period {
        return result;
    }

    // First window of `period` consecutive defined values.
    let mut run = 0;
    let mut seed_end = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_some() {
            run += 1;
            if run == period {
                seed_end = Some(i);
                break;
            }
        } else {
            run = 0;
        }
    }

    let Some(seed_end) = seed_end else {
        return result;
    };

    let window = &values[seed_end + 1 - period..=seed_end];
    let seed = window.iter().flatten().sum::<f64>() / period as f64;
    result[seed_end] = Some(seed);

    let p = period as f64;
    let mut prev = seed;
    for i in seed_end + 1..n {
        let Some(v) = values[i] else {
            break;
        };
        let smoothed = (prev * (p - 1.0) + v) / p;
        result[i] = Some(smoothed);
        prev = smoothed;
    }

    result
}

/// Checked ATR entry point.
///
/// Rejects `period == 0` and fewer bars than `period`. With exactly `period`
/// bars the call succeeds and every value is `None`.
pub fn compute_atr(bars: &[Bar], period: usize) -> Result<Vec<Option<f64>>, CoreError> {
    if period == 0 {
        return Err(CoreError::invalid("period", "must be a positive integer"));
    }
    if bars.is_empty() || bars.len() < period {
        return Err(CoreError::InsufficientData {
            required: period.max(1),
            available: bars.len(),
        });
    }
    Ok(Atr::new(period).compute(bars))
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        wilder_smooth(&true_range(bars), self.period)
    }
}
