//! Normalized market data types shared by all providers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// A single option contract quote from a chain snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct OptionQuote {
    pub strike: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    /// Greek delta if the venue supplies it. Missing for some feeds.
    pub delta: Option<Decimal>,
    pub open_interest: Decimal,
}

impl OptionQuote {
    /// Mid price between bid and ask.
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

/// Snapshot of one expiration's calls and puts.
#[derive(Debug, Clone, Serialize)]
pub struct ChainSnapshot {
    pub expiration: NaiveDate,
    pub calls: Vec<OptionQuote>,
    pub puts: Vec<OptionQuote>,
}

impl ChainSnapshot {
    /// Sum of open interest across both sides.
    pub fn total_open_interest(&self) -> Decimal {
        self.calls
            .iter()
            .chain(self.puts.iter())
            .map(|q| q.open_interest)
            .sum()
    }
}

/// Raw metrics for one (ticker, evaluation date) pair.
///
/// Immutable once fetched; every figure the filter pipeline and the
/// iron-fly calculator need is captured here so evaluation never goes
/// back to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct RawMetrics {
    pub ticker: String,
    pub date: NaiveDate,
    /// Last traded price.
    pub price: Decimal,
    /// Average daily share volume over the trailing month.
    pub avg_volume: Decimal,
    /// Total open interest on the nearest expiration.
    pub open_interest: Decimal,
    /// ATM implied volatility (annualized) on the nearest expiration.
    pub implied_vol: Decimal,
    /// Realized volatility (annualized) from trailing daily closes.
    pub realized_vol: Decimal,
    /// Rate of IV change per calendar day across near-dated expirations.
    /// Negative (near-term richer) favors the strategy.
    pub term_slope: Decimal,
    /// Magnitude of the ATM call delta.
    pub atm_delta: Decimal,
    /// Fraction of past earnings cycles where the strategy profited, in
    /// percent (0-100). Zero when the historical source has no data.
    pub win_rate: Decimal,
    /// Number of quarters behind `win_rate`.
    pub win_quarters: u32,
    /// Expected dollar move implied by the ATM straddle.
    pub expected_move: Decimal,
    /// Nearest-expiration chain, kept for the iron-fly calculator.
    #[serde(skip_serializing)]
    pub chain: ChainSnapshot,
}

impl RawMetrics {
    /// IV/RV ratio; `None` when realized volatility is non-positive so the
    /// evaluator fails the criterion instead of dividing by zero.
    pub fn iv_rv_ratio(&self) -> Option<Decimal> {
        if self.realized_vol <= Decimal::ZERO {
            None
        } else {
            Some(self.implied_vol / self.realized_vol)
        }
    }
}

/// When a company reports relative to the trading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EarningsTiming {
    PreMarket,
    PostMarket,
    DuringMarket,
    Unknown,
}

/// One entry from the earnings calendar.
#[derive(Debug, Clone, Serialize)]
pub struct EarningsEvent {
    pub ticker: String,
    pub timing: EarningsTiming,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(strike: Decimal, bid: Decimal, ask: Decimal, oi: Decimal) -> OptionQuote {
        OptionQuote {
            strike,
            bid,
            ask,
            delta: None,
            open_interest: oi,
        }
    }

    #[test]
    fn test_mid_price() {
        let q = quote(dec!(20), dec!(1.00), dec!(1.20), dec!(10));
        assert_eq!(q.mid(), dec!(1.10));
    }

    #[test]
    fn test_total_open_interest() {
        let chain = ChainSnapshot {
            expiration: NaiveDate::from_ymd_opt(2025, 3, 21).unwrap(),
            calls: vec![quote(dec!(20), dec!(1), dec!(1.2), dec!(1500))],
            puts: vec![quote(dec!(20), dec!(1), dec!(1.1), dec!(2500))],
        };
        assert_eq!(chain.total_open_interest(), dec!(4000));
    }

    #[test]
    fn test_iv_rv_ratio_guards_zero_rv() {
        let chain = ChainSnapshot {
            expiration: NaiveDate::from_ymd_opt(2025, 3, 21).unwrap(),
            calls: vec![],
            puts: vec![],
        };
        let mut m = RawMetrics {
            ticker: "TEST".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
            price: dec!(20),
            avg_volume: dec!(3_000_000),
            open_interest: dec!(5000),
            implied_vol: dec!(0.60),
            realized_vol: Decimal::ZERO,
            term_slope: dec!(-0.05),
            atm_delta: dec!(0.48),
            win_rate: dec!(70),
            win_quarters: 12,
            expected_move: dec!(2.50),
            chain,
        };
        assert_eq!(m.iv_rv_ratio(), None);
        m.realized_vol = dec!(0.40);
        assert_eq!(m.iv_rv_ratio(), Some(dec!(1.5)));
    }
}
