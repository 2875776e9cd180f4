//! Report export — JSON and CSV.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: one row per date for spreadsheets and plotting tools
//!
//! Absent values are `null` in JSON and empty cells in CSV. They are never
//! written as `0` or `NaN`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use stoplab_core::StopSide;

use crate::runner::{StopReport, SCHEMA_VERSION};

/// File format for `save_report`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        }
    }
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `StopReport` to pretty JSON.
pub fn export_json(report: &StopReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize StopReport to JSON")
}

/// Deserialize a `StopReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<StopReport> {
    let report: StopReport =
        serde_json::from_str(json).context("failed to deserialize StopReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn side_cell(side: Option<StopSide>) -> &'static str {
    match side {
        Some(StopSide::Long) => "long",
        Some(StopSide::Short) => "short",
        Some(StopSide::Tied) => "tied",
        None => "",
    }
}

/// Export report rows as CSV.
///
/// Columns: date, high, low, close, atr, stop, side, long_stop, short_stop
pub fn export_rows_csv(report: &StopReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "high",
        "low",
        "close",
        "atr",
        "stop",
        "side",
        "long_stop",
        "short_stop",
    ])?;

    let (long, short) = report.series.legs();
    for ((row, long), short) in report.series.rows().iter().zip(long).zip(short) {
        wtr.write_record([
            row.date.to_string().as_str(),
            &row.high.to_string(),
            &row.low.to_string(),
            &row.close.to_string(),
            &cell(row.atr),
            &cell(row.stop),
            side_cell(row.side),
            &cell(long),
            &cell(short),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Files ──────────────────────────────────────────────────────────

/// Write a report to `{output_dir}/{symbol}_{run_id[..12]}.{ext}`.
///
/// Returns the path written.
pub fn save_report(report: &StopReport, output_dir: &Path, format: ReportFormat) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let id: String = report.run_id.chars().take(12).collect();
    let stem = if id.is_empty() {
        report.symbol.clone()
    } else {
        format!("{}_{id}", report.symbol)
    };
    let path = output_dir.join(format!("{stem}.{}", format.extension()));

    let body = match format {
        ReportFormat::Json => export_json(report)?,
        ReportFormat::Csv => export_rows_csv(report)?,
    };
    std::fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("{}: wrote {}", report.symbol, path.display());
    Ok(path)
}
