//! Provider-agnostic trait for market data access.
//!
//! The scan core only ever talks to this trait; latency and failure modes
//! of the underlying feed are opaque here. Timeout and retry semantics are
//! the orchestrator's responsibility at the call boundary.

use crate::error::ScanError;
use crate::provider::types::{EarningsEvent, RawMetrics};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Trait for feeds that supply per-ticker metrics and the earnings calendar.
///
/// Implementations must be reentrant-safe: one instance is shared across
/// the orchestrator's worker pool.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch raw metrics for a ticker on the given evaluation date.
    ///
    /// Exactly one logical snapshot per call; the result is immutable once
    /// returned. Fails with `ScanError::DataUnavailable` when the feed
    /// cannot produce a complete snapshot.
    async fn fetch_metrics(&self, ticker: &str, date: NaiveDate) -> Result<RawMetrics, ScanError>;

    /// Tickers reporting earnings on the given date, with session timing.
    async fn earnings_calendar(&self, date: NaiveDate) -> Result<Vec<EarningsEvent>, ScanError>;
}
