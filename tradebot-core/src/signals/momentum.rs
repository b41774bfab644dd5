//! One-bar momentum: the sign of the latest close-to-close change.

use crate::config::SignalSettings;
use crate::domain::{Action, TradingPlan};

use super::{symbol_log, MarketContext, SignalError, SignalKind, SignalModule};

/// Buys on a rising last bar, sells on a falling one.
///
/// `momentum = close[-1] - close[-2]`. With a threshold `t`, momentum must be
/// strictly above `t` to buy and strictly below `-t` to sell; at the default
/// `t = 0` an exactly flat bar proposes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentumSignal;

impl MomentumSignal {
    /// Direction for one series, if any.
    pub fn direction(closes: &[f64], threshold: f64) -> Option<Action> {
        let n = closes.len();
        if n < 2 {
            return None;
        }
        let momentum = closes[n - 1] - closes[n - 2];
        if !momentum.is_finite() {
            return None;
        }
        if momentum > threshold {
            Some(Action::buy())
        } else if momentum < -threshold {
            Some(Action::sell())
        } else {
            None
        }
    }
}

impl SignalModule for MomentumSignal {
    fn kind(&self) -> SignalKind {
        SignalKind::Momentum
    }

    fn propose(
        &self,
        plan: &mut TradingPlan,
        ctx: &MarketContext<'_>,
        settings: &SignalSettings,
    ) -> Result<(), SignalError> {
        let config = &settings.momentum;
        if config.threshold < 0.0 || !config.threshold.is_finite() {
            return Err(SignalError::InvalidConfig(format!(
                "momentum threshold must be a non-negative number, got {}",
                config.threshold
            )));
        }

        for symbol in ctx.watchlist {
            let Some(series) = ctx.prices.get(symbol).filter(|s| !s.is_empty()) else {
                tracing::warn!(%symbol, "no price data, skipping momentum");
                continue;
            };
            match Self::direction(series.closes(), config.threshold) {
                Some(action) => {
                    symbol_log!(config.verbose, %symbol, %action, "momentum proposal");
                    plan.propose(symbol.clone(), action);
                }
                None => {
                    symbol_log!(config.verbose, %symbol, bars = series.len(), "no momentum signal");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::test_support::Fixture;

    #[test]
    fn rising_buys_and_falling_sells() {
        let mut fx = Fixture::new(&["AAPL", "GOOG"]);
        fx.prices.insert("AAPL", vec![150.0, 155.0]);
        fx.prices.insert("GOOG", vec![1000.0, 995.0]);

        let mut plan = TradingPlan::new();
        MomentumSignal
            .propose(&mut plan, &fx.ctx(), &SignalSettings::default())
            .unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.get("AAPL"), Some(&Action::buy()));
        assert_eq!(plan.get("GOOG"), Some(&Action::sell()));
    }

    #[test]
    fn flat_or_short_series_leave_existing_entry() {
        let mut fx = Fixture::new(&["AAPL", "MSFT", "TSLA"]);
        fx.prices.insert("AAPL", vec![100.0, 100.0]);
        fx.prices.insert("MSFT", vec![300.0]);

        let mut plan = TradingPlan::new();
        plan.propose("AAPL", Action::sell());
        plan.propose("MSFT", Action::buy());
        MomentumSignal
            .propose(&mut plan, &fx.ctx(), &SignalSettings::default())
            .unwrap();

        assert_eq!(plan.get("AAPL"), Some(&Action::sell()));
        assert_eq!(plan.get("MSFT"), Some(&Action::buy()));
        assert!(!plan.contains("TSLA"));
    }

    #[test]
    fn overwrites_earlier_module() {
        let mut fx = Fixture::new(&["AAPL"]);
        fx.prices.insert("AAPL", vec![10.0, 9.0]);
        let mut plan = TradingPlan::new();
        plan.propose("AAPL", Action::buy());

        MomentumSignal
            .propose(&mut plan, &fx.ctx(), &SignalSettings::default())
            .unwrap();
        assert_eq!(plan.get("AAPL"), Some(&Action::sell()));
    }

    #[test]
    fn threshold_is_a_dead_band() {
        assert_eq!(MomentumSignal::direction(&[10.0, 10.5], 1.0), None);
        assert_eq!(MomentumSignal::direction(&[10.0, 9.5], 1.0), None);
        assert_eq!(MomentumSignal::direction(&[10.0, 11.5], 1.0), Some(Action::buy()));
        assert_eq!(MomentumSignal::direction(&[10.0, 8.5], 1.0), Some(Action::sell()));
    }

    #[test]
    fn only_last_two_bars_matter() {
        assert_eq!(
            MomentumSignal::direction(&[1.0, 50.0, 40.0, 41.0], 0.0),
            Some(Action::buy())
        );
    }

    #[test]
    fn nan_close_is_ignored() {
        assert_eq!(MomentumSignal::direction(&[1.0, f64::NAN], 0.0), None);
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let fx = Fixture::new(&["AAPL"]);
        let mut settings = SignalSettings::default();
        settings.momentum.threshold = -1.0;
        let mut plan = TradingPlan::new();
        let err = MomentumSignal
            .propose(&mut plan, &fx.ctx(), &settings)
            .unwrap_err();
        assert!(matches!(err, SignalError::InvalidConfig(_)));
        assert!(plan.is_empty());
    }
}
