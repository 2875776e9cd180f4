//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Alignment — ATR and stop series have one entry per bar
//! 2. Non-negative ATR
//! 3. Ratchet monotonicity — long stops never fall, short stops never rise
//! 4. Tie carry — a close equal to the previous stop keeps it exactly
//! 5. Determinism — identical inputs give identical output

use chrono::NaiveDate;
use proptest::prelude::*;
use stoplab_core::stops::trailing_stop_steps;
use stoplab_core::{compute_stop_series, Bar, StopParams, StopSide};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_bar_fields() -> impl Strategy<Value = (f64, f64, f64)> {
    // (close, up-wick, down-wick)
    (10.0..500.0_f64, 0.0..10.0_f64, 0.0..10.0_f64)
}

fn arb_bars(min: usize, max: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(arb_bar_fields(), min..max).prop_map(|fields| {
        let base = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        fields
            .into_iter()
            .enumerate()
            .map(|(i, (close, up, down))| {
                let close = (close * 100.0).round() / 100.0;
                Bar {
                    symbol: "PROP".into(),
                    date: base + chrono::Duration::days(i as i64),
                    open: close,
                    high: close + up,
                    low: close - down,
                    close,
                    volume: 0,
                }
            })
            .collect()
    })
}

fn arb_params() -> impl Strategy<Value = StopParams> {
    (1usize..25, 0.5..5.0_f64).prop_map(|(p, m)| StopParams::new(p, m))
}

proptest! {
    #[test]
    fn series_aligned_with_bars(bars in arb_bars(25, 120), params in arb_params()) {
        let series = compute_stop_series(&bars, &params).unwrap();
        prop_assert_eq!(series.len(), bars.len());
        prop_assert_eq!(series.atr_values().len(), bars.len());
        prop_assert_eq!(series.stop_values().len(), bars.len());
        for (row, bar) in series.rows().iter().zip(&bars) {
            prop_assert_eq!(row.date, bar.date);
        }
    }

    #[test]
    fn atr_is_non_negative(bars in arb_bars(25, 120), params in arb_params()) {
        let series = compute_stop_series(&bars, &params).unwrap();
        for atr in series.atr_values().into_iter().flatten() {
            prop_assert!(atr >= 0.0);
        }
    }

    #[test]
    fn ratchet_never_loosens(bars in arb_bars(25, 120), params in arb_params()) {
        let series = compute_stop_series(&bars, &params).unwrap();
        let rows = series.rows();
        let mut prev: Option<f64> = None;
        for row in rows {
            if let (Some(p), Some(stop)) = (prev, row.stop) {
                if row.close > p {
                    prop_assert!(stop >= p);
                    prop_assert_eq!(row.side, Some(StopSide::Long));
                } else if row.close < p {
                    prop_assert!(stop <= p);
                    prop_assert_eq!(row.side, Some(StopSide::Short));
                } else {
                    prop_assert_eq!(stop, p);
                }
            }
            if row.stop.is_some() {
                prev = row.stop;
            }
        }
    }

    #[test]
    fn tie_keeps_previous_stop_exactly(
        level in 50.0..150.0_f64,
        atr in 0.1..10.0_f64,
        multiplier in 0.5..5.0_f64,
    ) {
        // Close on bar 2 lands exactly on the bar-1 stop.
        let base = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let first_close = level + atr * multiplier;
        let closes = [first_close, first_close, level];
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                symbol: "TIE".into(),
                date: base + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 0,
            })
            .collect();
        let steps = trailing_stop_steps(&bars, &[None, Some(atr), Some(atr)], multiplier).unwrap();
        let first = steps[1].unwrap().level;
        // Re-issue the tie against the level that was actually stored.
        let mut tie_bars = bars.clone();
        tie_bars[2].close = first;
        let steps = trailing_stop_steps(&tie_bars, &[None, Some(atr), Some(atr * 3.0)], multiplier).unwrap();
        let tied = steps[2].unwrap();
        prop_assert_eq!(tied.side, StopSide::Tied);
        prop_assert_eq!(tied.level.to_bits(), first.to_bits());
    }

    #[test]
    fn pipeline_is_deterministic(bars in arb_bars(25, 80), params in arb_params()) {
        let a = compute_stop_series(&bars, &params).unwrap();
        let b = compute_stop_series(&bars, &params).unwrap();
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
        prop_assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn no_lookahead(bars in arb_bars(30, 80), params in arb_params(), cut in 25usize..30) {
        let full = compute_stop_series(&bars, &params).unwrap();
        let truncated = compute_stop_series(&bars[..cut], &params).unwrap();
        prop_assert_eq!(truncated.rows(), &full.rows()[..cut]);
    }
}
