//! In-memory provider for tests and dry runs.
//!
//! Supports injectable per-ticker latency and failure counts so the
//! orchestrator's retry, timeout, and ordering behavior can be exercised
//! without a network.

use crate::error::ScanError;
use crate::provider::traits::MarketDataProvider;
use crate::provider::types::{ChainSnapshot, EarningsEvent, RawMetrics};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Failure counter. `u32::MAX` means fail forever.
const FAIL_ALWAYS: u32 = u32::MAX;

#[derive(Default)]
struct MockState {
    metrics: HashMap<String, RawMetrics>,
    calendar: HashMap<NaiveDate, Vec<EarningsEvent>>,
    /// Remaining failures before a ticker's fetch starts succeeding.
    fail_remaining: HashMap<String, u32>,
    latency: HashMap<String, Duration>,
}

/// Scriptable `MarketDataProvider` backed by in-memory maps.
pub struct MockProvider {
    state: RwLock<MockState>,
    fetch_count: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState::default()),
            fetch_count: AtomicU64::new(0),
        }
    }

    /// Register metrics returned for a ticker.
    pub async fn insert_metrics(&self, metrics: RawMetrics) {
        let mut state = self.state.write().await;
        state.metrics.insert(metrics.ticker.clone(), metrics);
    }

    /// Register the calendar entries for a date.
    pub async fn insert_calendar(&self, date: NaiveDate, events: Vec<EarningsEvent>) {
        self.state.write().await.calendar.insert(date, events);
    }

    /// Make the next `n` fetches for a ticker fail with `DataUnavailable`.
    pub async fn fail_times(&self, ticker: &str, n: u32) {
        self.state
            .write()
            .await
            .fail_remaining
            .insert(ticker.to_string(), n);
    }

    /// Make every fetch for a ticker fail.
    pub async fn fail_always(&self, ticker: &str) {
        self.fail_times(ticker, FAIL_ALWAYS).await;
    }

    /// Delay fetches for a ticker by the given duration.
    pub async fn set_latency(&self, ticker: &str, latency: Duration) {
        self.state
            .write()
            .await
            .latency
            .insert(ticker.to_string(), latency);
    }

    /// Total fetch attempts observed (including failed ones).
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    async fn fetch_metrics(&self, ticker: &str, date: NaiveDate) -> Result<RawMetrics, ScanError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let latency = self.state.read().await.latency.get(ticker).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.write().await;
        if let Some(remaining) = state.fail_remaining.get_mut(ticker) {
            if *remaining > 0 {
                if *remaining != FAIL_ALWAYS {
                    *remaining -= 1;
                }
                return Err(ScanError::DataUnavailable {
                    ticker: ticker.to_string(),
                    reason: "injected failure".to_string(),
                });
            }
        }

        state
            .metrics
            .get(ticker)
            .cloned()
            .map(|mut m| {
                m.date = date;
                m
            })
            .ok_or_else(|| ScanError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: "no mock data registered".to_string(),
            })
    }

    async fn earnings_calendar(&self, date: NaiveDate) -> Result<Vec<EarningsEvent>, ScanError> {
        Ok(self
            .state
            .read()
            .await
            .calendar
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }
}

/// Build a metrics fixture that clears every default pass threshold.
///
/// Mirrors the worked reference scenario: price $20, 3M volume, 5000 OI,
/// $2.50 expected move, 0.48 delta, IV/RV 1.5, slope -0.05, 70% win rate.
pub fn passing_metrics(ticker: &str, date: NaiveDate) -> RawMetrics {
    use crate::provider::types::OptionQuote;

    let strikes: Vec<Decimal> = (10..=30).map(Decimal::from).collect();
    let quote = |strike: Decimal, mid: Decimal, delta: Decimal| OptionQuote {
        strike,
        bid: mid - dec!(0.05),
        ask: mid + dec!(0.05),
        delta: Some(delta),
        open_interest: dec!(250),
    };
    let calls = strikes
        .iter()
        .map(|&k| {
            // Rough premium/delta shape around the $20 spot.
            let itm = (dec!(20) - k).max(Decimal::ZERO);
            let delta = if k < dec!(20) {
                dec!(0.80)
            } else if k == dec!(20) {
                dec!(0.48)
            } else {
                dec!(0.20)
            };
            quote(k, itm + dec!(1.30), delta)
        })
        .collect();
    let puts = strikes
        .iter()
        .map(|&k| {
            let itm = (k - dec!(20)).max(Decimal::ZERO);
            let delta = if k > dec!(20) {
                dec!(-0.80)
            } else if k == dec!(20) {
                dec!(-0.48)
            } else {
                dec!(-0.20)
            };
            quote(k, itm + dec!(1.20), delta)
        })
        .collect();

    RawMetrics {
        ticker: ticker.to_string(),
        date,
        price: dec!(20),
        avg_volume: dec!(3_000_000),
        open_interest: dec!(5000),
        implied_vol: dec!(0.60),
        realized_vol: dec!(0.40),
        term_slope: dec!(-0.05),
        atm_delta: dec!(0.48),
        win_rate: dec!(70),
        win_quarters: 12,
        expected_move: dec!(2.50),
        chain: ChainSnapshot {
            expiration: date + chrono::Duration::days(2),
            calls,
            puts,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::EarningsTiming;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 20).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_registered_metrics() {
        let provider = MockProvider::new();
        provider.insert_metrics(passing_metrics("AAPL", date())).await;

        let m = provider.fetch_metrics("AAPL", date()).await.unwrap();
        assert_eq!(m.ticker, "AAPL");
        assert_eq!(m.price, dec!(20));
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_ticker_is_unavailable() {
        let provider = MockProvider::new();
        let err = provider.fetch_metrics("ZZZZ", date()).await.unwrap_err();
        assert!(matches!(err, ScanError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fail_times_then_recover() {
        let provider = MockProvider::new();
        provider.insert_metrics(passing_metrics("AAPL", date())).await;
        provider.fail_times("AAPL", 2).await;

        assert!(provider.fetch_metrics("AAPL", date()).await.is_err());
        assert!(provider.fetch_metrics("AAPL", date()).await.is_err());
        assert!(provider.fetch_metrics("AAPL", date()).await.is_ok());
    }

    #[tokio::test]
    async fn test_calendar_lookup() {
        let provider = MockProvider::new();
        provider
            .insert_calendar(
                date(),
                vec![EarningsEvent {
                    ticker: "AAPL".into(),
                    timing: EarningsTiming::PostMarket,
                }],
            )
            .await;

        let events = provider.earnings_calendar(date()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timing, EarningsTiming::PostMarket);

        let other = NaiveDate::from_ymd_opt(2025, 3, 21).unwrap();
        assert!(provider.earnings_calendar(other).await.unwrap().is_empty());
    }
}
