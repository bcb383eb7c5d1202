//! Scan orchestration: universe resolution, worker pool, retries.

pub mod dates;
mod orchestrator;

pub use orchestrator::ScanOrchestrator;

use crate::filter::{CriterionVerdict, Tier};
use crate::ironfly::IronFlyPlan;
use crate::provider::RawMetrics;
use chrono::NaiveDate;
use serde::Serialize;

/// Per-run toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanMode {
    /// Price an iron fly for every Tier 1 / Tier 2 candidate.
    pub iron_fly: bool,
}

/// Outcome of one ticker's evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub ticker: String,
    pub date: NaiveDate,
    pub tier: Tier,
    /// Empty when the tier is `Error`.
    pub verdicts: Vec<CriterionVerdict>,
    pub metrics: Option<RawMetrics>,
    pub iron_fly: Option<IronFlyPlan>,
    /// Last fetch error, for `Error`-tier results.
    pub error: Option<String>,
}

impl ScanResult {
    pub(crate) fn errored(ticker: String, date: NaiveDate, error: String) -> Self {
        Self {
            ticker,
            date,
            tier: Tier::Error,
            verdicts: Vec::new(),
            metrics: None,
            iron_fly: None,
            error: Some(error),
        }
    }
}
