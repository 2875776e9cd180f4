//! StopLab Runner — everything around the core computation.
//!
//! This crate builds on `stoplab-core` to provide:
//! - TOML run configs with explicit defaults and content-addressed run ids
//! - Date windows with an ATR warm-up buffer
//! - Bar sources (CSV replay, in-memory) and canonicalization
//! - Single and parallel batch runs
//! - JSON and CSV export

pub mod batch;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod window;

pub use batch::{run_batch, run_batch_with, BatchOutcome, BatchSummary};
pub use config::{ConfigError, RunConfig, RunId, SourceConfig, WindowConfig};
pub use data_loader::{
    canonicalize, load_bars, read_csv_bars, source_from_config, BarSource, CsvSource,
    InMemorySource, LoadError, LoadedBars,
};
pub use export::{export_json, export_rows_csv, import_json, save_report, ReportFormat};
pub use runner::{run_single, run_with_bars, RunError, StopReport, SCHEMA_VERSION};
pub use window::{DateWindow, WindowError};
