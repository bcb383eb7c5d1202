//! Configuration management for the earnings scanner.
//!
//! Loaded once per run from a config file plus environment overrides and
//! treated as read-only for the duration of the scan.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Market data provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Per-criterion pass / near-miss boundaries
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    /// Tier2 allowance rules
    #[serde(default)]
    pub tiering: TieringConfig,
    /// Market-condition threshold relaxation
    #[serde(default)]
    pub market_adjustment: MarketAdjustmentConfig,
    /// Batch scan concurrency parameters
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the quote/chain REST API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Broad-market symbol sampled for the market-condition signal
    #[serde(default = "default_benchmark_symbol")]
    pub benchmark_symbol: String,
    /// Near-dated expirations sampled for the term-structure slope
    #[serde(default = "default_term_expirations")]
    pub term_expirations: usize,
    /// Optional JSON file of historical earnings win rates per ticker
    #[serde(default)]
    pub win_rate_file: Option<String>,
    /// Optional JSON file with the earnings calendar
    #[serde(default)]
    pub calendar_file: Option<String>,
}

/// Pass and near-miss boundary for one criterion.
///
/// The comparison direction depends on the category: for price, volume,
/// open interest, expected move, IV/RV ratio, and win rate, higher clears;
/// for ATM delta and term slope, lower clears (so `pass <= near_miss`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bounds {
    pub pass: Decimal,
    pub near_miss: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_price_bounds")]
    pub price: Bounds,
    #[serde(default = "default_volume_bounds")]
    pub volume: Bounds,
    #[serde(default = "default_open_interest_bounds")]
    pub open_interest: Bounds,
    #[serde(default = "default_expected_move_bounds")]
    pub expected_move: Bounds,
    #[serde(default = "default_atm_delta_bounds")]
    pub atm_delta: Bounds,
    #[serde(default = "default_iv_rv_bounds")]
    pub iv_rv_ratio: Bounds,
    #[serde(default = "default_term_slope_bounds")]
    pub term_slope: Bounds,
    #[serde(default = "default_win_rate_bounds")]
    pub win_rate: Bounds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieringConfig {
    /// Maximum NearMiss verdicts a Tier2 candidate may carry
    #[serde(default = "default_max_near_misses")]
    pub max_near_misses: usize,
    /// Categories that must be outright Pass even for Tier2. Illiquid
    /// underlyings make the strategy unexecutable regardless of edge.
    #[serde(default = "default_liquidity_strict")]
    pub liquidity_strict: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAdjustmentConfig {
    /// Whether the benchmark IV/RV signal is consulted at all
    #[serde(default = "default_adjustment_enabled")]
    pub enabled: bool,
    /// Signal is active when benchmark IV/RV is at or below this ratio
    #[serde(default = "default_trigger_ratio")]
    pub trigger_ratio: Decimal,
    /// Amount subtracted from both IV/RV boundaries while active
    #[serde(default = "default_relax_by")]
    pub relax_by: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Tickers per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Concurrent outstanding fetches (bounds external API load)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Fetch attempts per ticker before tier=Error
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Timeout per fetch attempt
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,
}

// Default value functions

fn default_base_url() -> String {
    crate::provider::DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_benchmark_symbol() -> String {
    "SPY".to_string()
}

fn default_term_expirations() -> usize {
    3
}

fn default_price_bounds() -> Bounds {
    Bounds {
        pass: Decimal::new(10, 0),     // $10.00
        near_miss: Decimal::new(7, 0), // $7.00
    }
}

fn default_volume_bounds() -> Bounds {
    Bounds {
        pass: Decimal::new(1_500_000, 0),
        near_miss: Decimal::new(1_000_000, 0),
    }
}

fn default_open_interest_bounds() -> Bounds {
    Bounds {
        pass: Decimal::new(2000, 0),
        near_miss: Decimal::new(1500, 0),
    }
}

fn default_expected_move_bounds() -> Bounds {
    Bounds {
        pass: Decimal::new(100, 2),     // $1.00
        near_miss: Decimal::new(90, 2), // $0.90
    }
}

fn default_atm_delta_bounds() -> Bounds {
    // Lower magnitude is better: deltas drifting past 0.57 mean the "ATM"
    // strikes are already well in the money.
    Bounds {
        pass: Decimal::new(57, 2),
        near_miss: Decimal::new(62, 2),
    }
}

fn default_iv_rv_bounds() -> Bounds {
    Bounds {
        pass: Decimal::new(125, 2),      // 1.25
        near_miss: Decimal::new(100, 2), // 1.00
    }
}

fn default_term_slope_bounds() -> Bounds {
    // Lower (more negative) is better: near-term IV must be rich.
    Bounds {
        pass: Decimal::new(-6, 3),      // -0.006
        near_miss: Decimal::new(-4, 3), // -0.004
    }
}

fn default_win_rate_bounds() -> Bounds {
    Bounds {
        pass: Decimal::new(50, 0),      // 50%
        near_miss: Decimal::new(40, 0), // 40%
    }
}

fn default_max_near_misses() -> usize {
    2
}

fn default_liquidity_strict() -> Vec<String> {
    vec!["volume".to_string(), "open_interest".to_string()]
}

fn default_adjustment_enabled() -> bool {
    true
}

fn default_trigger_ratio() -> Decimal {
    Decimal::ONE
}

fn default_relax_by() -> Decimal {
    Decimal::new(15, 2) // 0.15
}

fn default_batch_size() -> usize {
    8
}

fn default_max_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_attempt_timeout() -> u64 {
    20
}

impl Config {
    /// Load configuration from a config file and environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path).required(true)),
            None => builder.add_source(config::File::with_name("config").required(false)),
        };
        let config = builder
            .add_source(config::Environment::default().separator("__").prefix("EVS"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values. Failures here are fatal.
    pub fn validate(&self) -> Result<()> {
        let higher_is_better = [
            ("price", &self.thresholds.price),
            ("volume", &self.thresholds.volume),
            ("open_interest", &self.thresholds.open_interest),
            ("expected_move", &self.thresholds.expected_move),
            ("iv_rv_ratio", &self.thresholds.iv_rv_ratio),
            ("win_rate", &self.thresholds.win_rate),
        ];
        for (name, bounds) in higher_is_better {
            anyhow::ensure!(
                bounds.pass >= bounds.near_miss,
                "{} pass threshold must not be below its near-miss threshold",
                name
            );
        }
        let lower_is_better = [
            ("atm_delta", &self.thresholds.atm_delta),
            ("term_slope", &self.thresholds.term_slope),
        ];
        for (name, bounds) in lower_is_better {
            anyhow::ensure!(
                bounds.pass <= bounds.near_miss,
                "{} pass threshold must not exceed its near-miss threshold",
                name
            );
        }

        anyhow::ensure!(
            self.market_adjustment.relax_by >= Decimal::ZERO,
            "market_adjustment.relax_by must be non-negative"
        );
        anyhow::ensure!(self.scan.batch_size >= 1, "scan.batch_size must be >= 1");
        anyhow::ensure!(self.scan.max_workers >= 1, "scan.max_workers must be >= 1");
        anyhow::ensure!(self.scan.max_attempts >= 1, "scan.max_attempts must be >= 1");
        anyhow::ensure!(
            self.scan.attempt_timeout_secs >= 1,
            "scan.attempt_timeout_secs must be >= 1"
        );
        anyhow::ensure!(
            self.provider.term_expirations >= 2,
            "provider.term_expirations must be >= 2"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            thresholds: ThresholdConfig::default(),
            tiering: TieringConfig::default(),
            market_adjustment: MarketAdjustmentConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            benchmark_symbol: default_benchmark_symbol(),
            term_expirations: default_term_expirations(),
            win_rate_file: None,
            calendar_file: None,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            price: default_price_bounds(),
            volume: default_volume_bounds(),
            open_interest: default_open_interest_bounds(),
            expected_move: default_expected_move_bounds(),
            atm_delta: default_atm_delta_bounds(),
            iv_rv_ratio: default_iv_rv_bounds(),
            term_slope: default_term_slope_bounds(),
            win_rate: default_win_rate_bounds(),
        }
    }
}

impl Default for TieringConfig {
    fn default() -> Self {
        Self {
            max_near_misses: default_max_near_misses(),
            liquidity_strict: default_liquidity_strict(),
        }
    }
}

impl Default for MarketAdjustmentConfig {
    fn default() -> Self {
        Self {
            enabled: default_adjustment_enabled(),
            trigger_ratio: default_trigger_ratio(),
            relax_by: default_relax_by(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_workers: default_max_workers(),
            max_attempts: default_max_attempts(),
            attempt_timeout_secs: default_attempt_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = Config::default();
        config.thresholds.volume = Bounds {
            pass: dec!(1_000_000),
            near_miss: dec!(1_500_000),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_lower_is_better_bounds_rejected() {
        let mut config = Config::default();
        config.thresholds.term_slope = Bounds {
            pass: dec!(-0.004),
            near_miss: dec!(-0.006),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default();
        config.scan.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_relax_rejected() {
        let mut config = Config::default();
        config.market_adjustment.relax_by = dec!(-0.1);
        assert!(config.validate().is_err());
    }
}
