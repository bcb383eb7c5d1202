//! Single-criterion evaluation.
//!
//! Each category compares one observed metric against its pass and
//! near-miss boundaries. Missing or non-positive inputs always fail so a
//! zero-volume or undefined-RV ticker can never sneak through as a
//! near-miss.

use crate::config::{Bounds, MarketAdjustmentConfig, ThresholdConfig};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Filter categories, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Price,
    Volume,
    OpenInterest,
    ExpectedMove,
    AtmDelta,
    IvRvRatio,
    TermSlope,
    WinRate,
}

impl Category {
    /// All categories in the fixed report order.
    pub const ALL: [Category; 8] = [
        Category::Price,
        Category::Volume,
        Category::OpenInterest,
        Category::ExpectedMove,
        Category::AtmDelta,
        Category::IvRvRatio,
        Category::TermSlope,
        Category::WinRate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Price => "price",
            Category::Volume => "volume",
            Category::OpenInterest => "open_interest",
            Category::ExpectedMove => "expected_move",
            Category::AtmDelta => "atm_delta",
            Category::IvRvRatio => "iv_rv_ratio",
            Category::TermSlope => "term_slope",
            Category::WinRate => "win_rate",
        }
    }

    pub fn from_name(name: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Whether a higher observed value clears this category's thresholds.
    /// Term slope and ATM delta invert: lower is better.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Category::AtmDelta | Category::TermSlope)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Three-way verdict for one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    NearMiss,
    Fail,
}

/// One criterion's result, with the evidence behind it.
#[derive(Debug, Clone, Serialize)]
pub struct CriterionVerdict {
    pub category: Category,
    pub outcome: Outcome,
    /// Observed metric, `None` when the input was missing/undefined.
    pub observed: Option<Decimal>,
    /// Effective boundaries the observation was judged against.
    pub pass_threshold: Decimal,
    pub near_miss_threshold: Decimal,
}

/// Evaluate one observation against a category's boundaries.
pub fn evaluate(category: Category, observed: Option<Decimal>, bounds: &Bounds) -> CriterionVerdict {
    let outcome = match observed {
        None => Outcome::Fail,
        Some(value) => decide(category, value, bounds),
    };
    CriterionVerdict {
        category,
        outcome,
        observed,
        pass_threshold: bounds.pass,
        near_miss_threshold: bounds.near_miss,
    }
}

fn decide(category: Category, value: Decimal, bounds: &Bounds) -> Outcome {
    match category {
        // Term slope is legitimately negative; only the comparison
        // direction inverts.
        Category::TermSlope => {
            if value <= bounds.pass {
                Outcome::Pass
            } else if value <= bounds.near_miss {
                Outcome::NearMiss
            } else {
                Outcome::Fail
            }
        }
        // Delta magnitude: zero means the greek was unavailable.
        Category::AtmDelta => {
            if value <= Decimal::ZERO {
                Outcome::Fail
            } else if value <= bounds.pass {
                Outcome::Pass
            } else if value <= bounds.near_miss {
                Outcome::NearMiss
            } else {
                Outcome::Fail
            }
        }
        _ => {
            if value <= Decimal::ZERO {
                Outcome::Fail
            } else if value >= bounds.pass {
                Outcome::Pass
            } else if value >= bounds.near_miss {
                Outcome::NearMiss
            } else {
                Outcome::Fail
            }
        }
    }
}

/// Thresholds in force for one scan run, after the market-condition
/// adjustment. Derived once per run and shared read-only by all workers
/// so every ticker is judged under the same boundaries.
#[derive(Debug, Clone)]
pub struct EffectiveThresholds {
    thresholds: ThresholdConfig,
    /// Whether the IV/RV boundaries were relaxed this run.
    pub market_adjusted: bool,
}

impl EffectiveThresholds {
    /// Standard thresholds, no adjustment.
    pub fn standard(thresholds: &ThresholdConfig) -> Self {
        Self {
            thresholds: thresholds.clone(),
            market_adjusted: false,
        }
    }

    /// Apply the market-condition rule: when the benchmark IV/RV ratio is
    /// at or below the trigger, relax both IV/RV boundaries by the
    /// configured delta.
    pub fn derive(
        thresholds: &ThresholdConfig,
        adjustment: &MarketAdjustmentConfig,
        benchmark_iv_rv: Option<Decimal>,
    ) -> Self {
        let active = adjustment.enabled
            && benchmark_iv_rv
                .map(|ratio| ratio > Decimal::ZERO && ratio <= adjustment.trigger_ratio)
                .unwrap_or(false);
        if !active {
            return Self::standard(thresholds);
        }
        let mut thresholds = thresholds.clone();
        thresholds.iv_rv_ratio.pass -= adjustment.relax_by;
        thresholds.iv_rv_ratio.near_miss -= adjustment.relax_by;
        Self {
            thresholds,
            market_adjusted: true,
        }
    }

    pub fn bounds(&self, category: Category) -> &Bounds {
        match category {
            Category::Price => &self.thresholds.price,
            Category::Volume => &self.thresholds.volume,
            Category::OpenInterest => &self.thresholds.open_interest,
            Category::ExpectedMove => &self.thresholds.expected_move,
            Category::AtmDelta => &self.thresholds.atm_delta,
            Category::IvRvRatio => &self.thresholds.iv_rv_ratio,
            Category::TermSlope => &self.thresholds.term_slope,
            Category::WinRate => &self.thresholds.win_rate,
        }
    }
}
