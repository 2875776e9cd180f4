//! Date window resolution with an ATR warm-up buffer.
//!
//! Bars are fetched from `start - (period + buffer_days)` so that the ATR is
//! already seeded when the requested window begins. The pipeline runs over
//! the whole fetched range and only then is the output cut to `start..=end`.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::WindowConfig;

/// Extra calendar days fetched on top of `period`.
pub const DEFAULT_BUFFER_DAYS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("window start {start} is after end {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },

    #[error("period {period} plus {buffer_days} buffer day(s) is outside the calendar range")]
    OutOfRange { period: usize, buffer_days: u32 },
}

/// A resolved reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub buffer_days: u32,
}

impl DateWindow {
    /// Resolve a window config against `today`.
    ///
    /// `end` defaults to `today`; `start` defaults to `end - (period + buffer_days)`.
    pub fn resolve(
        config: &WindowConfig,
        period: usize,
        today: NaiveDate,
    ) -> Result<Self, WindowError> {
        let out_of_range = || WindowError::OutOfRange {
            period,
            buffer_days: config.buffer_days,
        };
        let span = buffer_span(period, config.buffer_days).ok_or_else(out_of_range)?;
        let end = config.end.unwrap_or(today);
        let start = match config.start {
            Some(start) => start,
            None => end.checked_sub_signed(span).ok_or_else(out_of_range)?,
        };
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self {
            start,
            end,
            buffer_days: config.buffer_days,
        })
    }

    /// First date to request from the bar source.
    ///
    /// Saturates at `NaiveDate::MIN` when the buffer reaches past the calendar.
    pub fn fetch_start(&self, period: usize) -> NaiveDate {
        buffer_span(period, self.buffer_days)
            .and_then(|span| self.start.checked_sub_signed(span))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// `period + buffer_days` calendar days, or `None` if that is not a valid `Duration`.
fn buffer_span(period: usize, buffer_days: u32) -> Option<Duration> {
    let days = i64::try_from(period)
        .ok()?
        .checked_add(i64::from(buffer_days))?;
    Duration::try_days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn explicit_window_fetches_buffer_before_start() {
        let config = WindowConfig {
            start: Some(date(2024, 1, 31)),
            end: Some(date(2024, 3, 1)),
            buffer_days: 10,
        };
        let window = DateWindow::resolve(&config, 21, date(2030, 1, 1)).unwrap();
        assert_eq!(window.start, date(2024, 1, 31));
        assert_eq!(window.end, date(2024, 3, 1));
        // 21 + 10 = 31 days before Jan 31
        assert_eq!(window.fetch_start(21), date(2023, 12, 31));
    }

    #[test]
    fn defaults_end_today_start_minus_buffer() {
        let window = DateWindow::resolve(&WindowConfig::default(), 21, date(2024, 9, 1)).unwrap();
        assert_eq!(window.end, date(2024, 9, 1));
        assert_eq!(window.start, date(2024, 8, 1));
        assert_eq!(window.fetch_start(21), date(2024, 7, 1));
    }

    #[test]
    fn start_after_defaulted_end_is_rejected() {
        let config = WindowConfig {
            start: Some(date(2025, 1, 1)),
            ..WindowConfig::default()
        };
        assert_eq!(
            DateWindow::resolve(&config, 21, date(2024, 6, 1)),
            Err(WindowError::Inverted {
                start: date(2025, 1, 1),
                end: date(2024, 6, 1)
            })
        );
    }

    #[test]
    fn huge_period_is_out_of_range_not_a_panic() {
        let config = WindowConfig::default();
        for period in [200_000_000_000_000, usize::MAX] {
            assert_eq!(
                DateWindow::resolve(&config, period, date(2024, 1, 1)),
                Err(WindowError::OutOfRange {
                    period,
                    buffer_days: DEFAULT_BUFFER_DAYS
                })
            );
        }

        let explicit = WindowConfig {
            start: Some(date(2024, 1, 2)),
            end: Some(date(2024, 3, 1)),
            buffer_days: u32::MAX,
        };
        assert!(matches!(
            DateWindow::resolve(&explicit, usize::MAX, date(2030, 1, 1)),
            Err(WindowError::OutOfRange { .. })
        ));
    }

    #[test]
    fn buffer_past_the_calendar_saturates_fetch_start() {
        let window = DateWindow::resolve(
            &WindowConfig {
                start: Some(date(2024, 1, 2)),
                end: Some(date(2024, 3, 1)),
                buffer_days: 10,
            },
            1_000_000_000,
            date(2030, 1, 1),
        )
        .unwrap();
        assert_eq!(window.fetch_start(1_000_000_000), NaiveDate::MIN);
        assert_eq!(window.fetch_start(usize::MAX), NaiveDate::MIN);
    }

    #[test]
    fn contains_is_inclusive() {
        let window = DateWindow {
            start: date(2024, 1, 2),
            end: date(2024, 1, 5),
            buffer_days: 0,
        };
        assert!(window.contains(date(2024, 1, 2)));
        assert!(window.contains(date(2024, 1, 5)));
        assert!(!window.contains(date(2024, 1, 6)));
        assert!(!window.contains(date(2024, 1, 1)));
    }
}
