//! Bars → ATR → ratchet, zipped into one aligned series.
//!
//! Parameters and input shape are checked up front. A rejected request
//! returns an error and no rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::error::CoreError;
use crate::indicators::{Atr, Indicator};
use crate::stops::{trailing_stop_steps, StopSide};

pub const DEFAULT_PERIOD: usize = 21;
pub const DEFAULT_MULTIPLIER: f64 = 3.0;

fn default_period() -> usize {
    DEFAULT_PERIOD
}

fn default_multiplier() -> f64 {
    DEFAULT_MULTIPLIER
}

/// Numeric parameters of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopParams {
    /// ATR window (Wilder).
    #[serde(default = "default_period")]
    pub period: usize,
    /// ATR multiple between close and stop.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for StopParams {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl StopParams {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self { period, multiplier }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.period == 0 {
            return Err(CoreError::invalid("period", "must be a positive integer"));
        }
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(CoreError::invalid(
                "multiplier",
                format!("must be a positive finite number, got {}", self.multiplier),
            ));
        }
        Ok(())
    }
}

/// One output row: the bar fields callers display plus ATR and stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRow {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub atr: Option<f64>,
    pub stop: Option<f64>,
    pub side: Option<StopSide>,
}

/// Aligned ATR and stop series, one row per input bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopSeries {
    params: StopParams,
    rows: Vec<StopRow>,
}

impl StopSeries {
    pub fn params(&self) -> StopParams {
        self.params
    }

    pub fn rows(&self) -> &[StopRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<StopRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&StopRow> {
        self.rows.last()
    }

    pub fn atr_values(&self) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.atr).collect()
    }

    pub fn stop_values(&self) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.stop).collect()
    }

    /// Number of leading rows without a stop.
    pub fn warmup_bars(&self) -> usize {
        self.rows.iter().take_while(|r| r.stop.is_none()).count()
    }

    /// Split the stop line into long and short legs.
    ///
    /// Each defined stop goes to the leg named by its side. A tied row stays
    /// on whichever leg was active before the tie.
    pub fn legs(&self) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
        let mut long = Vec::with_capacity(self.rows.len());
        let mut short = Vec::with_capacity(self.rows.len());
        let mut active = StopSide::Long;

        for row in &self.rows {
            if let Some(side) = row.side {
                if side != StopSide::Tied {
                    active = side;
                }
            }
            match (row.stop, active) {
                (Some(level), StopSide::Short) => {
                    long.push(None);
                    short.push(Some(level));
                }
                (Some(level), _) => {
                    long.push(Some(level));
                    short.push(None);
                }
                (None, _) => {
                    long.push(None);
                    short.push(None);
                }
            }
        }

        (long, short)
    }

    pub fn long_stop(&self) -> Vec<Option<f64>> {
        self.legs().0
    }

    pub fn short_stop(&self) -> Vec<Option<f64>> {
        self.legs().1
    }

    /// Keep only rows dated within `start..=end`.
    ///
    /// Values are not recomputed: rows keep what they had in the full series.
    pub fn within(self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            params: self.params,
            rows: self
                .rows
                .into_iter()
                .filter(|r| r.date >= start && r.date <= end)
                .collect(),
        }
    }

    /// BLAKE3 over the exact bit patterns of every row.
    ///
    /// Identical inputs and parameters always give the same fingerprint.
    pub fn fingerprint(&self) -> String {
        fn put(hasher: &mut blake3::Hasher, v: Option<f64>) {
            match v {
                Some(x) => {
                    hasher.update(&[1]);
                    hasher.update(&x.to_bits().to_le_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.params.period as u64).to_le_bytes());
        hasher.update(&self.params.multiplier.to_bits().to_le_bytes());
        for row in &self.rows {
            hasher.update(row.date.to_string().as_bytes());
            put(&mut hasher, Some(row.high));
            put(&mut hasher, Some(row.low));
            put(&mut hasher, Some(row.close));
            put(&mut hasher, row.atr);
            put(&mut hasher, row.stop);
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Compute the aligned ATR/stop series for `bars`.
///
/// # Errors
/// - `InvalidParameter` for a zero period or a non-positive multiplier
/// - `InsufficientData` when there are fewer bars than `period`
pub fn compute_stop_series(bars: &[Bar], params: &StopParams) -> Result<StopSeries, CoreError> {
    params.validate()?;
    if bars.is_empty() || bars.len() < params.period {
        return Err(CoreError::InsufficientData {
            required: params.period,
            available: bars.len(),
        });
    }

    let atr = Atr::new(params.period).compute(bars);
    let steps = trailing_stop_steps(bars, &atr, params.multiplier)?;

    let rows = bars
        .iter()
        .zip(atr)
        .zip(steps)
        .map(|((bar, atr), step)| StopRow {
            date: bar.date,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            atr,
            stop: step.map(|s| s.level),
            side: step.map(|s| s.side),
        })
        .collect();

    Ok(StopSeries {
        params: *params,
        rows,
    })
}
