//! Batch scan orchestration.
//!
//! Fans ticker evaluations out over a bounded worker pool, retries
//! transient fetch failures, and reassembles results in input order so a
//! slow ticker never reorders the report.

use crate::config::{Config, MarketAdjustmentConfig, ScanConfig, ThresholdConfig};
use crate::error::ScanError;
use crate::filter::{EffectiveThresholds, FilterPipeline, Tier, TierClassifier};
use crate::ironfly::IronFlyCalculator;
use crate::provider::{EarningsTiming, MarketDataProvider};
use crate::scan::dates;
use crate::scan::{ScanMode, ScanResult};
use chrono::{NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, trace, warn};

/// Lifecycle of one ticker inside a scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickerState {
    Pending,
    Fetching { attempt: u32 },
    Evaluated,
    Errored,
}

fn transition(ticker: &str, state: &mut TickerState, next: TickerState) {
    trace!(ticker, from = ?*state, to = ?next, "ticker state");
    *state = next;
}

/// Drives full scan runs against one provider.
pub struct ScanOrchestrator {
    provider: Arc<dyn MarketDataProvider>,
    thresholds: ThresholdConfig,
    adjustment: MarketAdjustmentConfig,
    classifier: TierClassifier,
    scan: ScanConfig,
    benchmark_symbol: String,
}

impl ScanOrchestrator {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: &Config) -> Result<Self, ScanError> {
        Ok(Self {
            provider,
            thresholds: config.thresholds.clone(),
            adjustment: config.market_adjustment.clone(),
            classifier: TierClassifier::from_config(&config.tiering)?,
            scan: config.scan.clone(),
            benchmark_symbol: config.provider.benchmark_symbol.clone(),
        })
    }

    /// Thresholds in force for one run. Consults the benchmark at most
    /// once; an unreachable benchmark falls back to standard thresholds.
    async fn effective_thresholds(&self, date: NaiveDate) -> EffectiveThresholds {
        if !self.adjustment.enabled {
            return EffectiveThresholds::standard(&self.thresholds);
        }
        match self.provider.fetch_metrics(&self.benchmark_symbol, date).await {
            Ok(metrics) => {
                EffectiveThresholds::derive(&self.thresholds, &self.adjustment, metrics.iv_rv_ratio())
            }
            Err(err) => {
                warn!(
                    benchmark = %self.benchmark_symbol,
                    error = %err,
                    "benchmark fetch failed, using standard thresholds"
                );
                EffectiveThresholds::standard(&self.thresholds)
            }
        }
    }

    /// Scan a ticker universe for one evaluation date.
    ///
    /// Results come back in the same order as `tickers`; a ticker whose
    /// fetches exhaust all attempts is reported with `Tier::Error` rather
    /// than dropped.
    #[instrument(skip(self, tickers), fields(universe = tickers.len()))]
    pub async fn scan(&self, tickers: &[String], date: NaiveDate, mode: ScanMode) -> Vec<ScanResult> {
        let thresholds = self.effective_thresholds(date).await;
        if thresholds.market_adjusted {
            info!(
                relax_by = %self.adjustment.relax_by,
                "low benchmark IV/RV, relaxed IV/RV thresholds in force"
            );
        }
        let pipeline = Arc::new(FilterPipeline::new(thresholds));
        let semaphore = Arc::new(Semaphore::new(self.scan.max_workers));
        let mut slots: Vec<Option<ScanResult>> = tickers.iter().map(|_| None).collect();

        for (batch_no, batch) in tickers.chunks(self.scan.batch_size).enumerate() {
            debug!(batch = batch_no, size = batch.len(), "dispatching batch");
            let base = batch_no * self.scan.batch_size;
            let mut handles = Vec::with_capacity(batch.len());
            for (offset, ticker) in batch.iter().enumerate() {
                let idx = base + offset;
                let semaphore = Arc::clone(&semaphore);
                let pipeline = Arc::clone(&pipeline);
                let provider = Arc::clone(&self.provider);
                let classifier = self.classifier.clone();
                let scan_cfg = self.scan.clone();
                let ticker = ticker.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return (
                                idx,
                                ScanResult::errored(ticker, date, "worker pool closed".to_string()),
                            )
                        }
                    };
                    let result = evaluate_ticker(
                        provider.as_ref(),
                        &pipeline,
                        &classifier,
                        &scan_cfg,
                        &ticker,
                        date,
                        mode,
                    )
                    .await;
                    (idx, result)
                }));
            }
            for handle in handles {
                match handle.await {
                    Ok((idx, result)) => slots[idx] = Some(result),
                    Err(err) => error!(error = %err, "scan task aborted"),
                }
            }
        }

        let results: Vec<ScanResult> = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    ScanResult::errored(tickers[idx].clone(), date, "task aborted".to_string())
                })
            })
            .collect();
        log_summary(&results);
        results
    }

    /// Evaluate a single ticker with full retry semantics.
    pub async fn analyze(&self, ticker: &str, date: NaiveDate, mode: ScanMode) -> ScanResult {
        let thresholds = self.effective_thresholds(date).await;
        let pipeline = FilterPipeline::new(thresholds);
        evaluate_ticker(
            self.provider.as_ref(),
            &pipeline,
            &self.classifier,
            &self.scan,
            ticker,
            date,
            mode,
        )
        .await
    }

    /// Build the ticker universe from the earnings calendar: companies
    /// reporting after the post date's close plus companies reporting
    /// before the next session's open.
    pub async fn universe(
        &self,
        input: Option<NaiveDate>,
    ) -> Result<(NaiveDate, Vec<String>), ScanError> {
        let (post, pre) = dates::resolve(input, Utc::now());
        let mut tickers = Vec::new();
        for event in self.provider.earnings_calendar(post).await? {
            if event.timing == EarningsTiming::PostMarket {
                tickers.push(event.ticker);
            } else {
                debug!(ticker = %event.ticker, timing = ?event.timing, "excluded from universe");
            }
        }
        for event in self.provider.earnings_calendar(pre).await? {
            if event.timing == EarningsTiming::PreMarket {
                tickers.push(event.ticker);
            }
        }
        tickers.sort();
        tickers.dedup();
        info!(date = %post, universe = tickers.len(), "earnings universe resolved");
        Ok((post, tickers))
    }

    /// Repeat full scans every `interval_hours` until `shutdown` flips.
    ///
    /// The shutdown flag is only honored at iteration boundaries and
    /// between one-second sleep slices, so an in-flight scan always
    /// finishes and reports.
    pub async fn scan_forever<F>(
        &self,
        interval_hours: u64,
        mode: ScanMode,
        shutdown: Arc<AtomicBool>,
        mut on_results: F,
    ) where
        F: FnMut(NaiveDate, &[ScanResult]),
    {
        let interval = Duration::from_secs(interval_hours.max(1) * 3600);
        let mut iteration: u64 = 0;
        while !shutdown.load(Ordering::SeqCst) {
            iteration += 1;
            info!(iteration, "starting scheduled scan");
            match self.universe(None).await {
                Ok((date, tickers)) => {
                    let results = self.scan(&tickers, date, mode).await;
                    on_results(date, &results);
                }
                Err(err) => {
                    warn!(error = %err, "calendar unavailable, skipping iteration");
                }
            }
            let mut remaining = interval;
            while remaining > Duration::ZERO && !shutdown.load(Ordering::SeqCst) {
                let step = remaining.min(Duration::from_secs(1));
                tokio::time::sleep(step).await;
                remaining -= step;
            }
        }
        info!(iterations = iteration, "scan loop stopped");
    }
}

/// One ticker's full evaluation: retried fetch, criteria, tier, and the
/// optional iron-fly pricing for qualifying tiers.
async fn evaluate_ticker(
    provider: &dyn MarketDataProvider,
    pipeline: &FilterPipeline,
    classifier: &TierClassifier,
    scan: &ScanConfig,
    ticker: &str,
    date: NaiveDate,
    mode: ScanMode,
) -> ScanResult {
    let mut state = TickerState::Pending;
    let mut last_error = String::from("no attempts made");
    let timeout = Duration::from_secs(scan.attempt_timeout_secs);

    for attempt in 1..=scan.max_attempts {
        transition(ticker, &mut state, TickerState::Fetching { attempt });
        match tokio::time::timeout(timeout, pipeline.run(provider, ticker, date)).await {
            Ok(Ok((metrics, verdicts))) => {
                transition(ticker, &mut state, TickerState::Evaluated);
                let tier = classifier.classify(&verdicts);
                let iron_fly = if mode.iron_fly && matches!(tier, Tier::Tier1 | Tier::Tier2) {
                    match IronFlyCalculator::compute(&metrics) {
                        Ok(plan) => Some(plan),
                        Err(err) => {
                            warn!(ticker, error = %err, "iron fly skipped");
                            None
                        }
                    }
                } else {
                    None
                };
                return ScanResult {
                    ticker: ticker.to_string(),
                    date,
                    tier,
                    verdicts,
                    metrics: Some(metrics),
                    iron_fly,
                    error: None,
                };
            }
            Ok(Err(err)) => {
                last_error = err.to_string();
                warn!(ticker, attempt, error = %last_error, "fetch attempt failed");
                if err.is_fatal() {
                    break;
                }
            }
            Err(_) => {
                last_error = format!("attempt timed out after {}s", scan.attempt_timeout_secs);
                warn!(ticker, attempt, "fetch attempt timed out");
            }
        }
    }

    transition(ticker, &mut state, TickerState::Errored);
    ScanResult::errored(ticker.to_string(), date, last_error)
}

fn log_summary(results: &[ScanResult]) {
    let count = |tier: Tier| results.iter().filter(|r| r.tier == tier).count();
    info!(
        total = results.len(),
        tier1 = count(Tier::Tier1),
        tier2 = count(Tier::Tier2),
        rejected = count(Tier::Rejected),
        errors = count(Tier::Error),
        "scan complete"
    );
}
