//! Position sizing: turn cash, price and portfolio weight into share counts.

mod cash_at_risk;

pub use cash_at_risk::CashAtRiskSizer;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a symbol gets no order this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Last price was zero, negative or not a number.
    NonPositivePrice,
    EmptyWatchlist,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NonPositivePrice => "last price is not positive",
            Self::EmptyWatchlist => "watchlist is empty",
        })
    }
}

/// Outcome of sizing one symbol. A skip is "no trade", never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDecision {
    Quantity(u64),
    Skip(SkipReason),
}

impl SizeDecision {
    pub fn quantity(&self) -> Option<u64> {
        match self {
            Self::Quantity(q) => Some(*q),
            Self::Skip(_) => None,
        }
    }
}

/// Raw quantity for one symbol before the portfolio tilt.
pub trait PositionSizer: Send + Sync {
    fn name(&self) -> &str;

    fn size(&self, cash: f64, last_price: f64, watchlist_size: usize) -> SizeDecision;
}

/// Scale a raw quantity by a portfolio weight, rounding half away from zero.
///
/// Weights are non-negative; anything else (negative, NaN) yields zero.
pub fn apply_weight(quantity: u64, weight: f64) -> u64 {
    if weight.is_nan() || weight <= 0.0 {
        return 0;
    }
    round_to_shares(quantity as f64 * weight)
}

/// Round to a whole share count, saturating below at zero.
pub(crate) fn round_to_shares(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}
