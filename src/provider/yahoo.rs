//! Yahoo-style quote/chain REST client.
//!
//! Assembles a full `RawMetrics` snapshot per ticker from three public
//! endpoints: daily history (price, volume, realized vol), the nearest
//! options chain (open interest, ATM IV, expected move, delta), and a few
//! near-dated chains for the term-structure slope.
//!
//! Historical earnings win rates have no public JSON feed, so they are
//! loaded from an optional local file keyed by ticker; tickers without an
//! entry report a zero win rate and fail that criterion.

use crate::config::ProviderConfig;
use crate::error::ScanError;
use crate::provider::traits::MarketDataProvider;
use crate::provider::types::{
    ChainSnapshot, EarningsEvent, EarningsTiming, OptionQuote, RawMetrics,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Trading days per year, for annualizing daily volatility.
const TRADING_DAYS: f64 = 252.0;

// ==================== Wire types ====================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartOuter,
}

#[derive(Debug, Deserialize)]
struct ChartOuter {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct OptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: OptionsOuter,
}

#[derive(Debug, Deserialize)]
struct OptionsOuter {
    result: Option<Vec<OptionsResult>>,
}

#[derive(Debug, Deserialize)]
struct OptionsResult {
    #[serde(rename = "expirationDates", default)]
    expiration_dates: Vec<i64>,
    quote: Option<UnderlyingQuote>,
    #[serde(default)]
    options: Vec<OptionsSlice>,
}

#[derive(Debug, Deserialize)]
struct UnderlyingQuote {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OptionsSlice {
    #[serde(rename = "expirationDate")]
    expiration_date: i64,
    #[serde(default)]
    calls: Vec<WireContract>,
    #[serde(default)]
    puts: Vec<WireContract>,
}

#[derive(Debug, Deserialize)]
struct WireContract {
    strike: f64,
    #[serde(default)]
    bid: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
    #[serde(rename = "impliedVolatility", default)]
    implied_volatility: Option<f64>,
    #[serde(rename = "openInterest", default)]
    open_interest: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WinRateEntry {
    win_rate: Decimal,
    quarters: u32,
}

#[derive(Debug, Deserialize)]
struct CalendarEntry {
    ticker: String,
    date: NaiveDate,
    timing: String,
}

// ==================== Client ====================

/// REST market data client.
pub struct YahooClient {
    http: Client,
    base_url: String,
    /// Number of near-dated expirations sampled for the term slope.
    term_expirations: usize,
    win_rates: HashMap<String, WinRateEntry>,
    calendar: Vec<CalendarEntry>,
}

impl YahooClient {
    /// Create a new client from configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let win_rates = match &config.win_rate_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read win rate file {}", path))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse win rate file {}", path))?
            }
            None => {
                warn!("No win rate file configured; win-rate criterion will fail for all tickers");
                HashMap::new()
            }
        };

        let calendar = match &config.calendar_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read earnings calendar file {}", path))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse earnings calendar file {}", path))?
            }
            None => {
                warn!("No earnings calendar file configured; scans need explicit tickers");
                Vec::new()
            }
        };

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            term_expirations: config.term_expirations.max(2),
            win_rates,
            calendar,
        })
    }

    /// Fetch one month of daily closes and volumes.
    async fn daily_history(&self, ticker: &str) -> Result<(Vec<f64>, Vec<f64>)> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let response: ChartResponse = self
            .http
            .get(&url)
            .query(&[("range", "1mo"), ("interval", "1d")])
            .send()
            .await
            .context("Failed to fetch price history")?
            .json()
            .await
            .context("Failed to decode price history")?;

        let result = response
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .context("Empty chart response")?;
        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .context("Chart response missing quote block")?;

        let closes: Vec<f64> = quote.close.unwrap_or_default().into_iter().flatten().collect();
        let volumes: Vec<f64> = quote
            .volume
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect();
        anyhow::ensure!(!closes.is_empty(), "No closing prices returned");

        Ok((closes, volumes))
    }

    /// Fetch the option chain for one expiration (the nearest when `None`).
    async fn option_chain(&self, ticker: &str, expiry: Option<i64>) -> Result<OptionsResult> {
        let url = format!("{}/v7/finance/options/{}", self.base_url, ticker);
        let mut request = self.http.get(&url);
        if let Some(epoch) = expiry {
            request = request.query(&[("date", epoch.to_string())]);
        }
        let response: OptionsResponse = request
            .send()
            .await
            .context("Failed to fetch option chain")?
            .json()
            .await
            .context("Failed to decode option chain")?;

        response
            .option_chain
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .context("Empty option chain response")
    }

    fn to_snapshot(slice: &OptionsSlice) -> Option<ChainSnapshot> {
        let expiration = DateTime::from_timestamp(slice.expiration_date, 0)?.date_naive();
        let convert = |c: &WireContract| OptionQuote {
            strike: Decimal::from_f64(c.strike).unwrap_or_default(),
            bid: Decimal::from_f64(c.bid.unwrap_or(0.0)).unwrap_or_default(),
            ask: Decimal::from_f64(c.ask.unwrap_or(0.0)).unwrap_or_default(),
            delta: None,
            open_interest: Decimal::from_f64(c.open_interest.unwrap_or(0.0)).unwrap_or_default(),
        };
        Some(ChainSnapshot {
            expiration,
            calls: slice.calls.iter().map(convert).collect(),
            puts: slice.puts.iter().map(convert).collect(),
        })
    }

    /// ATM implied volatility of a chain slice, annualized.
    fn atm_iv(slice: &OptionsSlice, spot: f64) -> Option<f64> {
        slice
            .calls
            .iter()
            .filter(|c| c.implied_volatility.is_some())
            .min_by(|a, b| {
                (a.strike - spot)
                    .abs()
                    .partial_cmp(&(b.strike - spot).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .and_then(|c| c.implied_volatility)
    }

    fn unavailable(ticker: &str, err: anyhow::Error) -> ScanError {
        ScanError::DataUnavailable {
            ticker: ticker.to_string(),
            reason: format!("{:#}", err),
        }
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    #[instrument(skip(self))]
    async fn fetch_metrics(&self, ticker: &str, date: NaiveDate) -> Result<RawMetrics, ScanError> {
        let (closes, volumes) = self
            .daily_history(ticker)
            .await
            .map_err(|e| Self::unavailable(ticker, e))?;

        let chain_result = self
            .option_chain(ticker, None)
            .await
            .map_err(|e| Self::unavailable(ticker, e))?;

        let spot = chain_result
            .quote
            .as_ref()
            .and_then(|q| q.regular_market_price)
            .or_else(|| closes.last().copied())
            .unwrap_or(0.0);

        let near_slice = chain_result
            .options
            .first()
            .ok_or_else(|| ScanError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: "no listed options".to_string(),
            })?;

        let chain = Self::to_snapshot(near_slice).ok_or_else(|| ScanError::DataUnavailable {
            ticker: ticker.to_string(),
            reason: "unparseable expiration date".to_string(),
        })?;

        // IV term structure across the first few expirations.
        let mut iv_points: Vec<(i64, f64)> = Vec::new();
        if let Some(iv) = Self::atm_iv(near_slice, spot) {
            let days = (chain.expiration - date).num_days().max(1);
            iv_points.push((days, iv));
        }
        for &epoch in chain_result
            .expiration_dates
            .iter()
            .skip(1)
            .take(self.term_expirations - 1)
        {
            match self.option_chain(ticker, Some(epoch)).await {
                Ok(result) => {
                    if let Some(slice) = result.options.first() {
                        if let (Some(iv), Some(exp)) = (
                            Self::atm_iv(slice, spot),
                            DateTime::from_timestamp(slice.expiration_date, 0),
                        ) {
                            let days = (exp.date_naive() - date).num_days().max(1);
                            iv_points.push((days, iv));
                        }
                    }
                }
                Err(e) => debug!(ticker, %epoch, "Skipping expiration: {:#}", e),
            }
        }

        let implied_vol = iv_points.first().map(|(_, iv)| *iv).unwrap_or(0.0);
        let term_slope = term_slope(&iv_points);
        let realized_vol = realized_vol(&closes);

        // Expected move from the ATM straddle mid.
        let atm_call = nearest_strike(&chain.calls, Decimal::from_f64(spot).unwrap_or_default());
        let atm_put = nearest_strike(&chain.puts, Decimal::from_f64(spot).unwrap_or_default());
        let expected_move = match (atm_call, atm_put) {
            (Some(c), Some(p)) => c.mid() + p.mid(),
            _ => Decimal::ZERO,
        };

        // Chains here carry no greeks; approximate the ATM call delta.
        let days_to_expiry = (chain.expiration - date).num_days().max(1);
        let atm_delta = atm_call
            .map(|c| {
                bs_call_delta(
                    spot,
                    c.strike.to_f64().unwrap_or(spot),
                    implied_vol,
                    days_to_expiry as f64 / 365.0,
                )
            })
            .unwrap_or(0.0);

        let avg_volume = if volumes.is_empty() {
            0.0
        } else {
            volumes.iter().sum::<f64>() / volumes.len() as f64
        };

        let (win_rate, win_quarters) = self
            .win_rates
            .get(ticker)
            .map(|e| (e.win_rate, e.quarters))
            .unwrap_or((Decimal::ZERO, 0));

        Ok(RawMetrics {
            ticker: ticker.to_string(),
            date,
            price: Decimal::from_f64(spot).unwrap_or_default(),
            avg_volume: Decimal::from_f64(avg_volume).unwrap_or_default(),
            open_interest: chain.total_open_interest(),
            implied_vol: Decimal::from_f64(implied_vol).unwrap_or_default(),
            realized_vol: Decimal::from_f64(realized_vol).unwrap_or_default(),
            term_slope: Decimal::from_f64(term_slope).unwrap_or_default(),
            atm_delta: Decimal::from_f64(atm_delta.abs()).unwrap_or_default(),
            win_rate,
            win_quarters,
            expected_move,
            chain,
        })
    }

    async fn earnings_calendar(&self, date: NaiveDate) -> Result<Vec<EarningsEvent>, ScanError> {
        Ok(self
            .calendar
            .iter()
            .filter(|e| e.date == date)
            .map(|e| EarningsEvent {
                ticker: e.ticker.clone(),
                timing: match e.timing.to_ascii_lowercase().as_str() {
                    "pre" | "pre-market" | "premarket" => EarningsTiming::PreMarket,
                    "post" | "post-market" | "postmarket" => EarningsTiming::PostMarket,
                    "during" | "during-market" => EarningsTiming::DuringMarket,
                    _ => EarningsTiming::Unknown,
                },
            })
            .collect())
    }
}

// ==================== Derivations ====================

/// Annualized close-to-close realized volatility from daily closes.
pub fn realized_vol(closes: &[f64]) -> f64 {
    if closes.len() < 3 {
        return 0.0;
    }
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    var.sqrt() * TRADING_DAYS.sqrt()
}

/// IV change per calendar day between the nearest and furthest sampled
/// expirations. Zero when fewer than two points are available.
pub fn term_slope(points: &[(i64, f64)]) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(f), Some(l)) if l.0 > f.0 => (f, l),
        _ => return 0.0,
    };
    (last.1 - first.1) / (last.0 - first.0) as f64
}

/// Black-Scholes call delta with zero rate, used when the feed has no greeks.
pub fn bs_call_delta(spot: f64, strike: f64, vol: f64, t_years: f64) -> f64 {
    if spot <= 0.0 || strike <= 0.0 || vol <= 0.0 || t_years <= 0.0 {
        return 0.0;
    }
    let d1 = ((spot / strike).ln() + (vol * vol / 2.0) * t_years) / (vol * t_years.sqrt());
    norm_cdf(d1)
}

/// Standard normal CDF (Abramowitz & Stegun 7.1.26).
fn norm_cdf(x: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.2316419 * x.abs());
    let poly = t
        * (0.319381530
            + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429))));
    let pdf = (-x * x / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt();
    let tail = pdf * poly;
    if x >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Quote with the strike closest to the target.
pub fn nearest_strike(quotes: &[OptionQuote], target: Decimal) -> Option<&OptionQuote> {
    quotes.iter().min_by_key(|q| (q.strike - target).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_realized_vol_flat_series_is_zero() {
        let closes = vec![20.0; 21];
        assert_eq!(realized_vol(&closes), 0.0);
    }

    #[test]
    fn test_realized_vol_positive_for_moving_series() {
        let closes: Vec<f64> = (0..21)
            .map(|i| 20.0 * (1.0 + 0.02 * ((i % 2) as f64 * 2.0 - 1.0)))
            .collect();
        let rv = realized_vol(&closes);
        assert!(rv > 0.0);
        // 2% daily swings annualize to very high vol.
        assert!(rv > 0.3);
    }

    #[test]
    fn test_realized_vol_needs_enough_points() {
        assert_eq!(realized_vol(&[20.0, 21.0]), 0.0);
    }

    #[test]
    fn test_term_slope_negative_when_near_term_rich() {
        // IV 60% at 2 days, 50% at 30 days.
        let slope = term_slope(&[(2, 0.60), (30, 0.50)]);
        assert!(slope < 0.0);
        assert!((slope - (-0.1 / 28.0)).abs() < 1e-12);
    }

    #[test]
    fn test_term_slope_degenerate_points() {
        assert_eq!(term_slope(&[]), 0.0);
        assert_eq!(term_slope(&[(5, 0.5)]), 0.0);
        assert_eq!(term_slope(&[(5, 0.5), (5, 0.6)]), 0.0);
    }

    #[test]
    fn test_bs_call_delta_atm_near_half() {
        let delta = bs_call_delta(20.0, 20.0, 0.60, 7.0 / 365.0);
        assert!(delta > 0.48 && delta < 0.56, "ATM delta was {}", delta);
    }

    #[test]
    fn test_bs_call_delta_deep_itm_and_otm() {
        assert!(bs_call_delta(30.0, 20.0, 0.40, 0.02) > 0.95);
        assert!(bs_call_delta(10.0, 20.0, 0.40, 0.02) < 0.05);
    }

    #[test]
    fn test_bs_call_delta_guards_bad_inputs() {
        assert_eq!(bs_call_delta(0.0, 20.0, 0.4, 0.1), 0.0);
        assert_eq!(bs_call_delta(20.0, 20.0, 0.0, 0.1), 0.0);
        assert_eq!(bs_call_delta(20.0, 20.0, 0.4, 0.0), 0.0);
    }

    #[test]
    fn test_nearest_strike_picks_closest() {
        let quotes: Vec<OptionQuote> = [dec!(15), dec!(20), dec!(25)]
            .iter()
            .map(|&strike| OptionQuote {
                strike,
                bid: dec!(1),
                ask: dec!(1.2),
                delta: None,
                open_interest: dec!(100),
            })
            .collect();
        assert_eq!(
            nearest_strike(&quotes, dec!(21)).unwrap().strike,
            dec!(20)
        );
        assert_eq!(
            nearest_strike(&quotes, dec!(24)).unwrap().strike,
            dec!(25)
        );
        assert!(nearest_strike(&[], dec!(20)).is_none());
    }

    #[test]
    fn test_norm_cdf_symmetry() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-6);
        assert!((norm_cdf(1.0) + norm_cdf(-1.0) - 1.0).abs() < 1e-6);
        assert!(norm_cdf(4.0) > 0.9999);
    }
}
