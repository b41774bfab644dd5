//! Equal cash split across the watchlist.

use super::{round_to_shares, PositionSizer, SizeDecision, SkipReason};

/// `round(cash * cash_at_risk / watchlist_size / last_price)`.
///
/// Guards the two divisions: a non-positive (or NaN) price or an empty
/// watchlist is a skip. Negative cash sizes to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashAtRiskSizer {
    pub cash_at_risk: f64,
}

impl CashAtRiskSizer {
    pub fn new(cash_at_risk: f64) -> Self {
        Self { cash_at_risk }
    }
}

impl Default for CashAtRiskSizer {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl PositionSizer for CashAtRiskSizer {
    fn name(&self) -> &str {
        "cash_at_risk"
    }

    fn size(&self, cash: f64, last_price: f64, watchlist_size: usize) -> SizeDecision {
        if watchlist_size == 0 {
            return SizeDecision::Skip(SkipReason::EmptyWatchlist);
        }
        if !last_price.is_finite() || last_price <= 0.0 {
            return SizeDecision::Skip(SkipReason::NonPositivePrice);
        }
        let budget = cash * self.cash_at_risk / watchlist_size as f64;
        SizeDecision::Quantity(round_to_shares(budget / last_price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_cash_evenly() {
        let sizer = CashAtRiskSizer::new(0.5);
        // 10_000 * 0.5 / 25 = 200 per symbol; 200 / 40 = 5 shares.
        assert_eq!(sizer.size(10_000.0, 40.0, 25), SizeDecision::Quantity(5));
    }

    #[test]
    fn rounds_half_away_from_zero() {
        let sizer = CashAtRiskSizer::new(1.0);
        assert_eq!(sizer.size(250.0, 100.0, 1), SizeDecision::Quantity(3));
        assert_eq!(sizer.size(249.0, 100.0, 1), SizeDecision::Quantity(2));
    }

    #[test]
    fn guards_division() {
        let sizer = CashAtRiskSizer::default();
        assert_eq!(
            sizer.size(1000.0, 0.0, 5),
            SizeDecision::Skip(SkipReason::NonPositivePrice)
        );
        assert_eq!(
            sizer.size(1000.0, -3.0, 5),
            SizeDecision::Skip(SkipReason::NonPositivePrice)
        );
        assert_eq!(
            sizer.size(1000.0, f64::NAN, 5),
            SizeDecision::Skip(SkipReason::NonPositivePrice)
        );
        assert_eq!(
            sizer.size(1000.0, 10.0, 0),
            SizeDecision::Skip(SkipReason::EmptyWatchlist)
        );
    }

    #[test]
    fn no_cash_means_zero_shares() {
        let sizer = CashAtRiskSizer::default();
        assert_eq!(sizer.size(0.0, 10.0, 5), SizeDecision::Quantity(0));
        assert_eq!(sizer.size(-500.0, 10.0, 5), SizeDecision::Quantity(0));
    }
}
