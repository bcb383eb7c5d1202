//! Tier classification over a ticker's verdicts.

use crate::config::TieringConfig;
use crate::error::ScanError;
use crate::filter::criteria::{Category, CriterionVerdict, Outcome};
use serde::Serialize;
use std::fmt;

/// Candidate quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Every criterion passed outright.
    Tier1,
    /// No failures, a bounded number of near-misses, liquidity strict.
    Tier2,
    Rejected,
    /// Data could not be fetched; no verdicts exist.
    Error,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::Tier1 => "TIER 1",
            Tier::Tier2 => "TIER 2",
            Tier::Rejected => "REJECTED",
            Tier::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Pure tier classifier. Construction validates the configured strict
/// category names so a typo surfaces at startup instead of silently
/// loosening the liquidity rule.
#[derive(Debug, Clone)]
pub struct TierClassifier {
    max_near_misses: usize,
    liquidity_strict: Vec<Category>,
}

impl TierClassifier {
    pub fn from_config(config: &TieringConfig) -> Result<Self, ScanError> {
        let mut liquidity_strict = Vec::with_capacity(config.liquidity_strict.len());
        for name in &config.liquidity_strict {
            let category = Category::from_name(name).ok_or_else(|| {
                ScanError::Config(format!("unknown liquidity_strict category '{name}'"))
            })?;
            liquidity_strict.push(category);
        }
        Ok(Self {
            max_near_misses: config.max_near_misses,
            liquidity_strict,
        })
    }

    /// Classify a full verdict set. Deterministic: the same verdicts
    /// always yield the same tier.
    pub fn classify(&self, verdicts: &[CriterionVerdict]) -> Tier {
        if verdicts.iter().any(|v| v.outcome == Outcome::Fail) {
            return Tier::Rejected;
        }
        let near_misses = verdicts
            .iter()
            .filter(|v| v.outcome == Outcome::NearMiss)
            .count();
        if near_misses == 0 {
            return Tier::Tier1;
        }
        if near_misses > self.max_near_misses {
            return Tier::Rejected;
        }
        let liquidity_ok = verdicts.iter().all(|v| {
            !self.liquidity_strict.contains(&v.category) || v.outcome == Outcome::Pass
        });
        if liquidity_ok {
            Tier::Tier2
        } else {
            Tier::Rejected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::criteria::{evaluate, Category};
    use crate::config::Bounds;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn classifier() -> TierClassifier {
        TierClassifier::from_config(&TieringConfig::default()).unwrap()
    }

    fn verdict(category: Category, outcome: Outcome) -> CriterionVerdict {
        let (observed, bounds) = match outcome {
            Outcome::Pass => (dec!(10), Bounds { pass: dec!(5), near_miss: dec!(3) }),
            Outcome::NearMiss => (dec!(4), Bounds { pass: dec!(5), near_miss: dec!(3) }),
            Outcome::Fail => (dec!(1), Bounds { pass: dec!(5), near_miss: dec!(3) }),
        };
        // Term slope and ATM delta invert direction; build their verdicts
        // through evaluate() only for higher-is-better categories.
        assert!(category.higher_is_better());
        let v = evaluate(category, Some(observed), &bounds);
        assert_eq!(v.outcome, outcome);
        v
    }

    fn all_pass() -> Vec<CriterionVerdict> {
        [
            Category::Price,
            Category::Volume,
            Category::OpenInterest,
            Category::ExpectedMove,
            Category::IvRvRatio,
            Category::WinRate,
        ]
        .iter()
        .map(|&c| verdict(c, Outcome::Pass))
        .collect()
    }

    fn with_outcome(category: Category, outcome: Outcome) -> Vec<CriterionVerdict> {
        all_pass()
            .into_iter()
            .map(|v| {
                if v.category == category {
                    verdict(category, outcome)
                } else {
                    v
                }
            })
            .collect()
    }

    #[test]
    fn test_all_pass_is_tier1() {
        assert_eq!(classifier().classify(&all_pass()), Tier::Tier1);
    }

    #[test]
    fn test_single_fail_rejects_regardless_of_rest() {
        let verdicts = with_outcome(Category::WinRate, Outcome::Fail);
        assert_eq!(classifier().classify(&verdicts), Tier::Rejected);
    }

    #[test]
    fn test_one_near_miss_on_soft_category_is_tier2() {
        let verdicts = with_outcome(Category::ExpectedMove, Outcome::NearMiss);
        assert_eq!(classifier().classify(&verdicts), Tier::Tier2);
    }

    #[test]
    fn test_near_miss_budget_enforced() {
        let mut verdicts = with_outcome(Category::ExpectedMove, Outcome::NearMiss);
        for v in verdicts.iter_mut() {
            if v.category == Category::Price || v.category == Category::WinRate {
                *v = verdict(v.category, Outcome::NearMiss);
            }
        }
        // Three near-misses against a budget of two.
        assert_eq!(classifier().classify(&verdicts), Tier::Rejected);
    }

    #[test]
    fn test_liquidity_near_miss_rejects() {
        let verdicts = with_outcome(Category::Volume, Outcome::NearMiss);
        assert_eq!(classifier().classify(&verdicts), Tier::Rejected);
        let verdicts = with_outcome(Category::OpenInterest, Outcome::NearMiss);
        assert_eq!(classifier().classify(&verdicts), Tier::Rejected);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let verdicts = with_outcome(Category::ExpectedMove, Outcome::NearMiss);
        let c = classifier();
        let first = c.classify(&verdicts);
        for _ in 0..10 {
            assert_eq!(c.classify(&verdicts), first);
        }
    }

    #[test]
    fn test_relaxing_budget_never_demotes() {
        // A verdict set that makes Tier2 under a loose budget must not be
        // Tier1-rejected under an even looser one.
        let verdicts = with_outcome(Category::ExpectedMove, Outcome::NearMiss);
        let loose = TierClassifier::from_config(&TieringConfig {
            max_near_misses: 5,
            ..TieringConfig::default()
        })
        .unwrap();
        assert_eq!(loose.classify(&verdicts), Tier::Tier2);
    }

    #[test]
    fn test_unknown_strict_category_is_config_error() {
        let config = TieringConfig {
            liquidity_strict: vec!["volume".into(), "liquidty".into()],
            ..TieringConfig::default()
        };
        let err = TierClassifier::from_config(&config).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[test]
    fn test_empty_strict_list_allows_liquidity_near_miss() {
        let config = TieringConfig {
            liquidity_strict: Vec::new(),
            ..TieringConfig::default()
        };
        let classifier = TierClassifier::from_config(&config).unwrap();
        let verdicts = with_outcome(Category::Volume, Outcome::NearMiss);
        assert_eq!(classifier.classify(&verdicts), Tier::Tier2);
    }

    #[test]
    fn test_zero_observed_cannot_reach_tier2() {
        // A missing metric fails its criterion, so the whole set rejects.
        let mut verdicts = all_pass();
        verdicts.push(evaluate(
            Category::IvRvRatio,
            None,
            &Bounds { pass: dec!(1.25), near_miss: Decimal::ONE },
        ));
        assert_eq!(classifier().classify(&verdicts), Tier::Rejected);
    }
}
