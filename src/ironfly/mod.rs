//! Iron-fly structure pricing from a chain snapshot.
//!
//! Short an ATM straddle, buy wings roughly one expected move out. The
//! calculator only prices the structure listed on the venue; it never
//! invents strikes, so thin chains surface as `StrikeUnavailable`.

use crate::error::ScanError;
use crate::provider::{OptionQuote, RawMetrics};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

/// A fully priced iron-fly candidate on one expiration.
#[derive(Debug, Clone, Serialize)]
pub struct IronFlyPlan {
    pub expiration: NaiveDate,
    pub short_call_strike: Decimal,
    pub short_put_strike: Decimal,
    pub long_call_strike: Decimal,
    pub long_put_strike: Decimal,
    /// Premium collected on the short straddle, at mids.
    pub short_credit: Decimal,
    /// Premium paid for both wings, at mids.
    pub long_debit: Decimal,
    pub net_credit: Decimal,
    pub call_wing_width: Decimal,
    pub put_wing_width: Decimal,
    /// Worst case at expiration: narrower wing minus the credit.
    pub max_loss: Decimal,
    pub upper_breakeven: Decimal,
    pub lower_breakeven: Decimal,
}

/// Computes `IronFlyPlan`s. Stateless; methods are associated functions
/// on per-ticker metrics.
pub struct IronFlyCalculator;

impl IronFlyCalculator {
    /// Price the iron fly for one ticker's nearest-expiration chain.
    pub fn compute(metrics: &RawMetrics) -> Result<IronFlyPlan, ScanError> {
        let chain = &metrics.chain;
        let short_call = select_short(&chain.calls, metrics.price).ok_or_else(|| {
            ScanError::StrikeUnavailable {
                ticker: metrics.ticker.clone(),
                detail: "no call quotes in chain".to_string(),
            }
        })?;
        let short_put = select_short(&chain.puts, metrics.price).ok_or_else(|| {
            ScanError::StrikeUnavailable {
                ticker: metrics.ticker.clone(),
                detail: "no put quotes in chain".to_string(),
            }
        })?;

        // Wing targets sit one expected move beyond each short strike,
        // snapped to whatever the venue actually lists.
        let long_call = snap_wing(
            &chain.calls,
            short_call.strike + metrics.expected_move,
            Side::Above(short_call.strike),
        )
        .ok_or_else(|| ScanError::StrikeUnavailable {
            ticker: metrics.ticker.clone(),
            detail: format!("no call strike above {}", short_call.strike),
        })?;
        let long_put = snap_wing(
            &chain.puts,
            short_put.strike - metrics.expected_move,
            Side::Below(short_put.strike),
        )
        .ok_or_else(|| ScanError::StrikeUnavailable {
            ticker: metrics.ticker.clone(),
            detail: format!("no put strike below {}", short_put.strike),
        })?;

        let short_credit = short_call.mid() + short_put.mid();
        let long_debit = long_call.mid() + long_put.mid();
        let net_credit = short_credit - long_debit;
        let call_wing_width = long_call.strike - short_call.strike;
        let put_wing_width = short_put.strike - long_put.strike;
        let max_loss = call_wing_width.min(put_wing_width) - net_credit;

        let plan = IronFlyPlan {
            expiration: chain.expiration,
            short_call_strike: short_call.strike,
            short_put_strike: short_put.strike,
            long_call_strike: long_call.strike,
            long_put_strike: long_put.strike,
            short_credit,
            long_debit,
            net_credit,
            call_wing_width,
            put_wing_width,
            max_loss,
            upper_breakeven: short_call.strike + net_credit,
            lower_breakeven: short_put.strike - net_credit,
        };
        debug!(
            ticker = %metrics.ticker,
            net_credit = %plan.net_credit,
            max_loss = %plan.max_loss,
            "iron fly priced"
        );
        Ok(plan)
    }
}

enum Side {
    Above(Decimal),
    Below(Decimal),
}

/// Short leg selection: the quote whose delta magnitude is nearest 0.50,
/// falling back to the strike nearest spot when the feed has no greeks.
fn select_short(quotes: &[OptionQuote], spot: Decimal) -> Option<&OptionQuote> {
    let by_delta = quotes
        .iter()
        .filter(|q| q.delta.is_some())
        .min_by_key(|q| {
            q.delta
                .map(|d| (d.abs() - dec!(0.50)).abs())
                .unwrap_or(Decimal::MAX)
        });
    by_delta.or_else(|| quotes.iter().min_by_key(|q| (q.strike - spot).abs()))
}

/// Nearest listed strike to `target` strictly beyond the short strike.
fn snap_wing(quotes: &[OptionQuote], target: Decimal, side: Side) -> Option<&OptionQuote> {
    quotes
        .iter()
        .filter(|q| match side {
            Side::Above(short) => q.strike > short,
            Side::Below(short) => q.strike < short,
        })
        .min_by_key(|q| (q.strike - target).abs())
}
