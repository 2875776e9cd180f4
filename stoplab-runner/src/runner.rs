//! Single-run orchestration.
//!
//! config → window → buffered fetch → canonicalize → core pipeline →
//! trim to window → report. Every failure is reported once, before any
//! rows are produced.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stoplab_core::{compute_stop_series, Bar, CoreError, StopParams, StopSeries};
use thiserror::Error;

use crate::config::{ConfigError, RunConfig, RunId};
use crate::data_loader::{load_bars, BarSource, LoadError};
use crate::window::{DateWindow, WindowError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("window error: {0}")]
    Window(#[from] WindowError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("no bars for '{symbol}' inside {start}..={end}")]
    EmptyWindow {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl RunError {
    /// True when the core rejected the run for having fewer bars than `period`.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, RunError::Core(CoreError::InsufficientData { .. }))
    }
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Complete result of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub run_id: RunId,
    pub source: String,
    pub window: DateWindow,
    /// First date requested from the source (window start minus warm-up buffer).
    pub fetch_start: NaiveDate,
    /// Bars fed to the pipeline, buffer included.
    pub bar_count: usize,
    /// Rows inside the window that have no stop yet.
    pub warmup_bars: usize,
    pub series: StopSeries,
    /// Fingerprint of the reported rows.
    pub fingerprint: String,
    #[serde(default)]
    pub data_quality_warnings: Vec<String>,
}

impl StopReport {
    pub fn params(&self) -> StopParams {
        self.series.params()
    }
}

/// Run one config against a bar source.
///
/// `today` resolves missing window ends; pass `chrono::Local::now().date_naive()`
/// in production and a fixed date in tests.
pub fn run_single(
    config: &RunConfig,
    source: &dyn BarSource,
    today: NaiveDate,
) -> Result<StopReport, RunError> {
    config.validate()?;
    let period = config.params.period;
    let window = DateWindow::resolve(&config.window, period, today)?;
    let fetch_start = window.fetch_start(period);

    log::info!(
        "{}: fetching {fetch_start}..={} from {} (period={}, multiplier={})",
        config.symbol,
        window.end,
        source.name(),
        period,
        config.params.multiplier
    );

    let loaded = load_bars(source, &config.symbol, fetch_start, window.end)?;
    let report = run_with_bars(
        &config.symbol,
        &loaded.bars,
        &config.params,
        window,
        fetch_start,
    )?;

    Ok(StopReport {
        run_id: config.run_id(),
        source: source.name().to_string(),
        data_quality_warnings: loaded.warnings,
        ..report
    })
}

/// Run the pipeline over already-loaded bars and cut the output to `window`.
///
/// `bars` must be sorted ascending and may start before `window.start`.
pub fn run_with_bars(
    symbol: &str,
    bars: &[Bar],
    params: &StopParams,
    window: DateWindow,
    fetch_start: NaiveDate,
) -> Result<StopReport, RunError> {
    let full = compute_stop_series(bars, params)?;
    let series = full.within(window.start, window.end);
    if series.is_empty() {
        return Err(RunError::EmptyWindow {
            symbol: symbol.to_string(),
            start: window.start,
            end: window.end,
        });
    }

    let warmup_bars = series.warmup_bars();
    if warmup_bars > 0 {
        log::warn!(
            "{symbol}: first {warmup_bars} row(s) of the window have no stop; \
             raise window.buffer_days to warm up ATR earlier"
        );
    }
    let fingerprint = series.fingerprint();
    log::info!(
        "{symbol}: {} rows reported, {} bars computed, fingerprint {}",
        series.len(),
        bars.len(),
        &fingerprint[..12]
    );

    Ok(StopReport {
        schema_version: SCHEMA_VERSION,
        symbol: symbol.to_string(),
        run_id: String::new(),
        source: String::new(),
        window,
        fetch_start,
        bar_count: bars.len(),
        warmup_bars,
        series,
        fingerprint,
        data_quality_warnings: Vec::new(),
    })
}
