//! Full filter pipeline for one ticker.

use crate::error::ScanError;
use crate::filter::criteria::{self, Category, CriterionVerdict, EffectiveThresholds};
use crate::provider::{MarketDataProvider, RawMetrics};
use chrono::NaiveDate;
use tracing::{debug, instrument};

/// Runs every criterion against one ticker's metrics.
///
/// The pipeline performs exactly one provider fetch per ticker and never
/// retries; retry policy lives in the orchestrator.
pub struct FilterPipeline {
    thresholds: EffectiveThresholds,
}

impl FilterPipeline {
    pub fn new(thresholds: EffectiveThresholds) -> Self {
        Self { thresholds }
    }

    /// Fetch metrics and evaluate all criteria.
    #[instrument(skip(self, provider))]
    pub async fn run(
        &self,
        provider: &dyn MarketDataProvider,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<(RawMetrics, Vec<CriterionVerdict>), ScanError> {
        let metrics = provider.fetch_metrics(ticker, date).await?;
        let verdicts = self.evaluate_metrics(&metrics);
        debug!(
            ticker,
            passes = verdicts
                .iter()
                .filter(|v| v.outcome == criteria::Outcome::Pass)
                .count(),
            "filter pipeline complete"
        );
        Ok((metrics, verdicts))
    }

    /// Evaluate already-fetched metrics. Pure, and always returns one
    /// verdict per category in report order.
    pub fn evaluate_metrics(&self, metrics: &RawMetrics) -> Vec<CriterionVerdict> {
        Category::ALL
            .iter()
            .map(|&category| {
                let observed = self.observe(category, metrics);
                criteria::evaluate(category, observed, self.thresholds.bounds(category))
            })
            .collect()
    }

    fn observe(&self, category: Category, metrics: &RawMetrics) -> Option<rust_decimal::Decimal> {
        match category {
            Category::Price => Some(metrics.price),
            Category::Volume => Some(metrics.avg_volume),
            Category::OpenInterest => Some(metrics.open_interest),
            Category::ExpectedMove => Some(metrics.expected_move),
            // Delta sign depends on call/put side; only magnitude matters.
            Category::AtmDelta => Some(metrics.atm_delta.abs()),
            Category::IvRvRatio => metrics.iv_rv_ratio(),
            Category::TermSlope => Some(metrics.term_slope),
            Category::WinRate => Some(metrics.win_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdConfig;
    use crate::filter::criteria::Outcome;
    use crate::provider::mock::{passing_metrics, MockProvider};
    use rust_decimal_macros::dec;

    fn pipeline() -> FilterPipeline {
        FilterPipeline::new(EffectiveThresholds::standard(&ThresholdConfig::default()))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_all_pass_on_clean_metrics() {
        let verdicts = pipeline().evaluate_metrics(&passing_metrics("AAPL", date()));
        assert_eq!(verdicts.len(), Category::ALL.len());
        for verdict in &verdicts {
            assert_eq!(
                verdict.outcome,
                Outcome::Pass,
                "{} should pass",
                verdict.category
            );
        }
    }

    #[test]
    fn test_verdicts_in_report_order() {
        let verdicts = pipeline().evaluate_metrics(&passing_metrics("AAPL", date()));
        let order: Vec<Category> = verdicts.iter().map(|v| v.category).collect();
        assert_eq!(order, Category::ALL.to_vec());
    }

    #[test]
    fn test_negative_atm_delta_uses_magnitude() {
        let mut metrics = passing_metrics("AAPL", date());
        metrics.atm_delta = dec!(-0.48);
        let verdicts = pipeline().evaluate_metrics(&metrics);
        let delta = verdicts
            .iter()
            .find(|v| v.category == Category::AtmDelta)
            .unwrap();
        assert_eq!(delta.outcome, Outcome::Pass);
        assert_eq!(delta.observed, Some(dec!(0.48)));
    }

    #[test]
    fn test_zero_rv_fails_iv_rv_without_panicking() {
        let mut metrics = passing_metrics("AAPL", date());
        metrics.realized_vol = dec!(0);
        let verdicts = pipeline().evaluate_metrics(&metrics);
        let ratio = verdicts
            .iter()
            .find(|v| v.category == Category::IvRvRatio)
            .unwrap();
        assert_eq!(ratio.outcome, Outcome::Fail);
        assert_eq!(ratio.observed, None);
    }

    #[tokio::test]
    async fn test_run_fetches_exactly_once() {
        let provider = MockProvider::new();
        provider.insert_metrics(passing_metrics("AAPL", date())).await;
        let (metrics, verdicts) = pipeline()
            .run(&provider, "AAPL", date())
            .await
            .unwrap();
        assert_eq!(metrics.ticker, "AAPL");
        assert_eq!(verdicts.len(), Category::ALL.len());
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_run_propagates_fetch_error_without_retry() {
        let provider = MockProvider::new();
        provider.insert_metrics(passing_metrics("AAPL", date())).await;
        provider.fail_times("AAPL", 1).await;
        let err = pipeline().run(&provider, "AAPL", date()).await.unwrap_err();
        assert!(matches!(err, ScanError::DataUnavailable { .. }));
        assert_eq!(provider.fetch_count(), 1);
    }
}
