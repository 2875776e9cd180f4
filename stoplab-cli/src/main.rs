//! StopLab CLI — ATR trailing-stop runs over daily bar files.
//!
//! Commands:
//! - `run` — compute ATR and the trailing stop for one symbol
//! - `batch` — run several TOML configs in parallel
//! - `inspect` — report what a CSV bar file contains

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use stoplab_core::StopSide;
use stoplab_runner::{
    canonicalize, export_json, export_rows_csv, run_batch, run_single, save_report,
    source_from_config, BarSource, BatchSummary, CsvSource, ReportFormat, RunConfig, StopReport,
};

#[derive(Parser)]
#[command(name = "stoplab", about = "StopLab CLI — Wilder ATR and trailing-stop ratchet")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute ATR and the trailing stop for one symbol.
    Run {
        /// Path to a TOML run config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV bar file (requires --symbol).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Symbol the bars belong to.
        #[arg(long)]
        symbol: Option<String>,

        /// ATR period. Overrides the config value.
        #[arg(long)]
        period: Option<usize>,

        /// ATR multiplier. Overrides the config value.
        #[arg(long)]
        multiplier: Option<f64>,

        /// Window start (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Window end (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Output format on stdout.
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Also save the report into this directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run several configs in parallel.
    Batch {
        /// TOML run configs.
        #[arg(long = "config", required = true, num_args = 1..)]
        configs: Vec<PathBuf>,

        /// Save each successful report into this directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Report bar count, date range, and data-quality warnings of a CSV file.
    Inspect {
        /// CSV bar file.
        #[arg(long)]
        csv: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    /// File format used with `--output`. Tables are saved as JSON.
    fn report_format(self) -> ReportFormat {
        match self {
            OutputFormat::Csv => ReportFormat::Csv,
            OutputFormat::Table | OutputFormat::Json => ReportFormat::Json,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run {
            config,
            csv,
            symbol,
            period,
            multiplier,
            start,
            end,
            format,
            output,
        } => run_cmd(
            config, csv, symbol, period, multiplier, start, end, format, output,
        ),
        Commands::Batch { configs, output } => batch_cmd(&configs, output.as_deref()),
        Commands::Inspect { csv } => inspect_cmd(&csv),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn parse_date(flag: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("--{flag} '{s}' is not a YYYY-MM-DD date"))
        })
        .transpose()
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[allow(clippy::too_many_arguments)]
fn run_cmd(
    config_path: Option<PathBuf>,
    csv: Option<PathBuf>,
    symbol: Option<String>,
    period: Option<usize>,
    multiplier: Option<f64>,
    start: Option<String>,
    end: Option<String>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = match (config_path, csv) {
        (Some(path), None) => RunConfig::from_file(&path)?,
        (None, Some(path)) => {
            let Some(symbol) = symbol.clone() else {
                bail!("--symbol is required with --csv");
            };
            RunConfig::for_csv(symbol, path)
        }
        (None, None) => bail!("one of --config or --csv is required"),
        (Some(_), Some(_)) => bail!("--config and --csv are mutually exclusive"),
    };

    if let Some(symbol) = symbol {
        config.symbol = symbol;
    }
    if let Some(period) = period {
        config.params.period = period;
    }
    if let Some(multiplier) = multiplier {
        config.params.multiplier = multiplier;
    }
    if let Some(start) = parse_date("start", start.as_deref())? {
        config.window.start = Some(start);
    }
    if let Some(end) = parse_date("end", end.as_deref())? {
        config.window.end = Some(end);
    }

    let source = source_from_config(&config.source);
    let report = run_single(&config, source.as_ref(), today())?;

    match format {
        OutputFormat::Table => print_report(&report),
        OutputFormat::Json => println!("{}", export_json(&report)?),
        OutputFormat::Csv => print!("{}", export_rows_csv(&report)?),
    }

    if let Some(dir) = output {
        let path = save_report(&report, &dir, format.report_format())?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn batch_cmd(paths: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let configs = paths
        .iter()
        .map(|p| RunConfig::from_file(p).with_context(|| format!("loading {}", p.display())))
        .collect::<Result<Vec<_>>>()?;

    let outcomes = run_batch(&configs, today());

    println!(
        "{:<8} {:<25} {:>6} {:>12} {:>12} {:<6}",
        "Symbol", "Window", "Rows", "ATR", "Stop", "Side"
    );
    println!("{}", "-".repeat(74));
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => {
                let last = report.series.last();
                println!(
                    "{:<8} {:<25} {:>6} {:>12} {:>12} {:<6}",
                    outcome.symbol,
                    format!("{} to {}", report.window.start, report.window.end),
                    report.series.len(),
                    fmt_opt(last.and_then(|r| r.atr)),
                    fmt_opt(last.and_then(|r| r.stop)),
                    fmt_side(last.and_then(|r| r.side)),
                );
                if let Some(dir) = output {
                    save_report(report, dir, ReportFormat::Json)?;
                }
            }
            Err(e) => println!("{:<8} FAILED: {e}", outcome.symbol),
        }
    }

    let summary = BatchSummary::of(&outcomes);
    println!();
    println!(
        "{} succeeded, {} failed",
        summary.succeeded, summary.failed
    );
    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn inspect_cmd(path: &Path) -> Result<()> {
    let symbol = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "?".into());
    let source = CsvSource::new(path);
    let raw = source.fetch(&symbol, NaiveDate::MIN, NaiveDate::MAX)?;
    let loaded = canonicalize(raw);

    println!("File:        {}", path.display());
    println!("Bars:        {}", loaded.bars.len());
    match (loaded.bars.first(), loaded.bars.last()) {
        (Some(first), Some(last)) => println!("Date Range:  {} to {}", first.date, last.date),
        _ => println!("Date Range:  (empty)"),
    }
    println!("Duplicates:  {}", loaded.duplicates_dropped);
    for warn in &loaded.warnings {
        println!("WARNING: {warn}");
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v:.4}"))
}

fn fmt_side(side: Option<StopSide>) -> &'static str {
    match side {
        Some(StopSide::Long) => "long",
        Some(StopSide::Short) => "short",
        Some(StopSide::Tied) => "tied",
        None => "-",
    }
}

fn print_report(report: &StopReport) {
    let params = report.params();
    println!();
    println!("=== Trailing Stop ===");
    println!("Symbol:         {}", report.symbol);
    println!(
        "Window:         {} to {}",
        report.window.start, report.window.end
    );
    println!(
        "Params:         period={} multiplier={}",
        params.period, params.multiplier
    );
    println!(
        "Bars:           {} computed, {} reported ({} warmup)",
        report.bar_count,
        report.series.len(),
        report.warmup_bars
    );
    println!("Fingerprint:    {}", &report.fingerprint[..12]);
    println!();
    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>10} {:<6}",
        "Date", "High", "Low", "Close", "ATR", "Stop", "Side"
    );
    println!("{}", "-".repeat(74));
    for row in report.series.rows() {
        println!(
            "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10} {:>10} {:<6}",
            row.date.to_string(),
            row.high,
            row.low,
            row.close,
            fmt_opt(row.atr),
            fmt_opt(row.stop),
            fmt_side(row.side),
        );
    }
    for warn in &report.data_quality_warnings {
        println!("WARNING: {warn}");
    }
    println!();
}
