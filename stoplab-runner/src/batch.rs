//! Parallel batch runs.
//!
//! Each config is an independent invocation with its own source and its own
//! ratchet state, so configs fan out over rayon with no shared mutable state.
//! Results come back in input order.

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::config::RunConfig;
use crate::data_loader::{source_from_config, BarSource};
use crate::runner::{run_single, RunError, StopReport};

/// Outcome of one config in a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub symbol: String,
    pub result: Result<StopReport, RunError>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Summary counts for a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn of(outcomes: &[BatchOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
        Self {
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Run every config, building each source with `make_source`.
pub fn run_batch_with<F>(configs: &[RunConfig], today: NaiveDate, make_source: F) -> Vec<BatchOutcome>
where
    F: Fn(&RunConfig) -> Box<dyn BarSource> + Sync,
{
    log::info!("batch: {} run(s)", configs.len());
    configs
        .par_iter()
        .map(|config| {
            let source = make_source(config);
            let result = run_single(config, source.as_ref(), today);
            if let Err(e) = &result {
                log::warn!("{}: {e}", config.symbol);
            }
            BatchOutcome {
                symbol: config.symbol.clone(),
                result,
            }
        })
        .collect()
}

/// Run every config against the source its own config describes.
pub fn run_batch(configs: &[RunConfig], today: NaiveDate) -> Vec<BatchOutcome> {
    run_batch_with(configs, today, |config| source_from_config(&config.source))
}
