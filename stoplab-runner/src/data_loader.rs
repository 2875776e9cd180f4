//! Bar sources and canonicalization.
//!
//! The `BarSource` trait abstracts over where bars come from (CSV replay,
//! in-memory fixtures) so runs can be wired to any feed and mocked in tests.
//! Sources return raw bars; `load_bars` sorts, dedupes, range-filters and
//! collects data-quality warnings before the core sees them.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use stoplab_core::Bar;
use thiserror::Error;

use crate::config::SourceConfig;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("csv error in {origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("{origin}: missing required column '{column}'")]
    MissingColumn { origin: String, column: &'static str },

    #[error("{origin} line {line}: {reason}")]
    Parse {
        origin: String,
        line: u64,
        reason: String,
    },

    #[error("no bars for '{symbol}' between {start} and {end}")]
    NoBars {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// Trait for bar sources.
pub trait BarSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch daily bars for a symbol over `start..=end`, in any order.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, LoadError>;
}

/// Build the source described by a config.
pub fn source_from_config(config: &SourceConfig) -> Box<dyn BarSource> {
    match config {
        SourceConfig::Csv { path } => Box::new(CsvSource::new(path)),
    }
}

// ─── CSV replay ─────────────────────────────────────────────────────

/// Replays bars from a CSV file with a header row.
///
/// Recognised columns (case-insensitive): `date` or `timestamp`, `open`,
/// `high`, `low`, `close`, optional `volume`. Other columns are ignored.
/// Cells that are empty or `null` become NaN and are flagged later as void bars.
pub struct CsvSource {
    path: PathBuf,
    name: String,
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = format!("csv:{}", path.display());
        Self { path, name }
    }
}

impl BarSource for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, LoadError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|source| LoadError::Csv {
                origin: self.name.clone(),
                source,
            })?;
        let bars = parse_csv(reader, symbol, &self.name)?;
        Ok(bars
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect())
    }
}

/// Read bars from any CSV reader (file, stdin, in-memory buffer).
pub fn read_csv_bars<R: io::Read>(input: R, symbol: &str) -> Result<Vec<Bar>, LoadError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);
    parse_csv(reader, symbol, "<reader>")
}

fn parse_csv<R: io::Read>(
    mut reader: csv::Reader<R>,
    symbol: &str,
    origin: &str,
) -> Result<Vec<Bar>, LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        origin: origin.to_string(),
        source,
    };

    let headers: HashMap<String, usize> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_ascii_lowercase(), i))
        .collect();

    let column = |names: &[&'static str]| -> Result<usize, LoadError> {
        names
            .iter()
            .find_map(|n| headers.get(*n).copied())
            .ok_or_else(|| LoadError::MissingColumn {
                origin: origin.to_string(),
                column: names[0],
            })
    };

    let date_col = column(&["date", "timestamp"])?;
    let open_col = column(&["open"])?;
    let high_col = column(&["high"])?;
    let low_col = column(&["low"])?;
    let close_col = column(&["close"])?;
    let volume_col = headers.get("volume").copied();

    let mut bars = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let parse_err = |reason: String| LoadError::Parse {
            origin: origin.to_string(),
            line,
            reason,
        };

        let date_str = record.get(date_col).unwrap_or("");
        let date = parse_date(date_str)
            .ok_or_else(|| parse_err(format!("unrecognised date '{date_str}'")))?;

        let price = |col: usize, field: &str| -> Result<f64, LoadError> {
            let raw = record.get(col).unwrap_or("");
            if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
                return Ok(f64::NAN);
            }
            raw.parse::<f64>()
                .map_err(|e| parse_err(format!("bad {field} '{raw}': {e}")))
        };

        let volume = match volume_col.and_then(|c| record.get(c)) {
            Some(raw) if !raw.is_empty() && !raw.eq_ignore_ascii_case("null") => raw
                .parse::<f64>()
                .map(|v| v.max(0.0) as u64)
                .map_err(|e| parse_err(format!("bad volume '{raw}': {e}")))?,
            _ => 0,
        };

        bars.push(Bar {
            symbol: symbol.to_string(),
            date,
            open: price(open_col, "open")?,
            high: price(high_col, "high")?,
            low: price(low_col, "low")?,
            close: price(close_col, "close")?,
            volume,
        });
    }

    Ok(bars)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

// ─── In-memory ──────────────────────────────────────────────────────

/// Serves a fixed set of bars. Bars for other symbols are ignored.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    bars: Vec<Bar>,
}

impl InMemorySource {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars }
    }
}

impl BarSource for InMemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, LoadError> {
        Ok(self
            .bars
            .iter()
            .filter(|b| b.symbol == symbol && b.date >= start && b.date <= end)
            .cloned()
            .collect())
    }
}

// ─── Canonicalization ───────────────────────────────────────────────

/// Bars ready for the core, plus anything suspicious found on the way.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub bars: Vec<Bar>,
    pub warnings: Vec<String>,
    pub duplicates_dropped: usize,
}

/// Sort ascending by date, drop duplicate dates (first occurrence wins) and
/// flag void or inconsistent bars. Flagged bars are kept: the core accepts
/// them as-is.
pub fn canonicalize(mut bars: Vec<Bar>) -> LoadedBars {
    bars.sort_by_key(|b| b.date);
    let before = bars.len();
    bars.dedup_by_key(|b| b.date);
    let duplicates_dropped = before - bars.len();

    let mut warnings = Vec::new();
    if duplicates_dropped > 0 {
        warnings.push(format!("dropped {duplicates_dropped} duplicate bar(s)"));
    }
    for bar in &bars {
        if bar.is_void() {
            warnings.push(format!("{}: void bar (missing or non-finite OHLC value)", bar.date));
        } else if !bar.is_sane() {
            warnings.push(format!(
                "{}: inconsistent bar (o={} h={} l={} c={})",
                bar.date, bar.open, bar.high, bar.low, bar.close
            ));
        }
    }

    LoadedBars {
        bars,
        warnings,
        duplicates_dropped,
    }
}

/// Fetch and canonicalize bars for one symbol.
pub fn load_bars(
    source: &dyn BarSource,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<LoadedBars, LoadError> {
    let raw = source.fetch(symbol, start, end)?;
    log::debug!(
        "{symbol}: {} raw bars from {} ({start}..={end})",
        raw.len(),
        source.name()
    );

    let loaded = canonicalize(raw);
    if loaded.bars.is_empty() {
        return Err(LoadError::NoBars {
            symbol: symbol.to_string(),
            start,
            end,
        });
    }
    for warning in &loaded.warnings {
        log::warn!("{symbol}: {warning}");
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const YAHOO_CSV: &str = "\
Date,Open,High,Low,Close,Adj Close,Volume
2024-01-03,184.22,185.88,183.43,184.25,183.52,58414500
2024-01-02,187.15,188.44,183.89,185.64,184.90,82488700
2024-01-04,182.15,183.09,180.88,181.91,181.19,71983600
";

    #[test]
    fn reads_yahoo_style_csv() {
        let bars = read_csv_bars(YAHOO_CSV.as_bytes(), "AAPL").unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, date(2024, 1, 3));
        assert_eq!(bars[0].close, 184.25);
        assert_eq!(bars[1].volume, 82_488_700);
        assert!(bars.iter().all(|b| b.symbol == "AAPL"));
    }

    #[test]
    fn reads_timestamp_column_and_rfc3339() {
        let csv = "timestamp,open,high,low,close\n2024-05-01T00:00:00Z,1,2,0.5,1.5\n";
        let bars = read_csv_bars(csv.as_bytes(), "X").unwrap();
        assert_eq!(bars[0].date, date(2024, 5, 1));
        assert_eq!(bars[0].volume, 0);
    }

    #[test]
    fn null_cells_become_void_bars() {
        let csv = "Date,Open,High,Low,Close\n2024-01-02,null,null,null,null\n";
        let bars = read_csv_bars(csv.as_bytes(), "X").unwrap();
        assert!(bars[0].is_void());
    }

    #[test]
    fn missing_column_is_reported() {
        let csv = "Date,Open,High,Close\n2024-01-02,1,2,1.5\n";
        assert!(matches!(
            read_csv_bars(csv.as_bytes(), "X"),
            Err(LoadError::MissingColumn { column: "low", .. })
        ));
    }

    #[test]
    fn bad_number_reports_line() {
        let csv = "Date,Open,High,Low,Close\n2024-01-02,1,2,0.5,1.5\n2024-01-03,1,abc,0.5,1.5\n";
        match read_csv_bars(csv.as_bytes(), "X") {
            Err(LoadError::Parse { line, reason, .. }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("high"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn canonicalize_sorts_dedupes_and_warns() {
        let mut bars = read_csv_bars(YAHOO_CSV.as_bytes(), "AAPL").unwrap();
        let mut dup = bars[1].clone();
        dup.close = 999.0;
        bars.push(dup);
        bars[2].high = bars[2].low - 1.0;

        let loaded = canonicalize(bars);
        let dates: Vec<_> = loaded.bars.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 2), date(2024, 1, 3), date(2024, 1, 4)]);
        assert_eq!(loaded.duplicates_dropped, 1);
        assert_eq!(loaded.bars[0].close, 185.64);
        assert_eq!(loaded.warnings.len(), 2);
        assert!(loaded.warnings[1].starts_with("2024-01-04"));
    }

    #[test]
    fn canonicalize_flags_infinite_price_as_void() {
        let mut bars = read_csv_bars(YAHOO_CSV.as_bytes(), "AAPL").unwrap();
        bars[0].high = f64::INFINITY;

        let loaded = canonicalize(bars);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].starts_with("2024-01-03"));
        assert!(loaded.warnings[0].contains("void bar"));
    }

    #[test]
    fn in_memory_filters_symbol_and_range() {
        let mut bars = read_csv_bars(YAHOO_CSV.as_bytes(), "AAPL").unwrap();
        bars.extend(read_csv_bars(YAHOO_CSV.as_bytes(), "MSFT").unwrap());
        let source = InMemorySource::new(bars);
        let got = source
            .fetch("MSFT", date(2024, 1, 3), date(2024, 1, 10))
            .unwrap();
        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|b| b.symbol == "MSFT"));
    }

    #[test]
    fn load_bars_rejects_empty_range() {
        let source = InMemorySource::default();
        assert!(matches!(
            load_bars(&source, "AAPL", date(2024, 1, 1), date(2024, 2, 1)),
            Err(LoadError::NoBars { .. })
        ));
    }
}
