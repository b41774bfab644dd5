//! Liquidity gate on the bid/ask spread.

use crate::config::SignalSettings;
use crate::domain::TradingPlan;

use super::{symbol_log, MarketContext, SignalError, SignalKind, SignalModule};

/// Cancels every plan entry, buy or sell, whose spread is strictly above the
/// limit. Symbols with no known spread count as zero and are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadFilterSignal;

impl SignalModule for SpreadFilterSignal {
    fn kind(&self) -> SignalKind {
        SignalKind::SpreadFilter
    }

    fn propose(
        &self,
        plan: &mut TradingPlan,
        ctx: &MarketContext<'_>,
        settings: &SignalSettings,
    ) -> Result<(), SignalError> {
        let config = &settings.spread;
        if config.limit.is_nan() || config.limit < 0.0 {
            return Err(SignalError::InvalidConfig(format!(
                "spread limit must be >= 0, got {}",
                config.limit
            )));
        }

        for symbol in plan.symbols() {
            let spread = ctx.spreads.get(&symbol).copied().unwrap_or(0.0);
            if spread > config.limit {
                if let Some(action) = plan.cancel(&symbol) {
                    tracing::info!(%symbol, spread, limit = config.limit, %action, "spread too wide, cancelled");
                }
            } else {
                symbol_log!(config.verbose, %symbol, spread, "spread within limit");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;
    use crate::signals::test_support::Fixture;

    #[test]
    fn removes_only_wide_spreads() {
        let mut fx = Fixture::new(&["AAPL", "GOOG"]);
        fx.spreads.insert("AAPL".into(), 0.03);
        fx.spreads.insert("GOOG".into(), 0.01);
        let mut plan = TradingPlan::new();
        plan.propose("AAPL", Action::buy());
        plan.propose("GOOG", Action::sell());

        SpreadFilterSignal
            .propose(&mut plan, &fx.ctx(), &SignalSettings::default())
            .unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.get("GOOG"), Some(&Action::sell()));
    }

    #[test]
    fn spread_equal_to_limit_is_kept() {
        let mut fx = Fixture::new(&["AAPL"]);
        fx.spreads.insert("AAPL".into(), 0.02);
        let mut plan = TradingPlan::new();
        plan.propose("AAPL", Action::buy_qty(3));
        SpreadFilterSignal
            .propose(&mut plan, &fx.ctx(), &SignalSettings::default())
            .unwrap();
        assert!(plan.contains("AAPL"));
    }

    #[test]
    fn unknown_spread_is_never_filtered() {
        let fx = Fixture::new(&["AAPL"]);
        let mut plan = TradingPlan::new();
        plan.propose("AAPL", Action::buy());
        let mut strict = SignalSettings::default();
        strict.spread.limit = 0.0;
        SpreadFilterSignal
            .propose(&mut plan, &fx.ctx(), &strict)
            .unwrap();
        assert!(plan.contains("AAPL"));
    }

    #[test]
    fn symbols_outside_plan_are_ignored() {
        let mut fx = Fixture::new(&["AAPL", "GOOG"]);
        fx.spreads.insert("GOOG".into(), 5.0);
        let mut plan = TradingPlan::new();
        plan.propose("AAPL", Action::buy());
        SpreadFilterSignal
            .propose(&mut plan, &fx.ctx(), &SignalSettings::default())
            .unwrap();
        assert_eq!(plan.symbols(), vec!["AAPL".to_string()]);
    }
}
