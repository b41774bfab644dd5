//! Exploratory random trades.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{RandomConfig, SignalSettings};
use crate::domain::{Action, TradingPlan};

use super::{MarketContext, SignalError, SignalKind, SignalModule};

/// With probability `buy_probability`, buys one watchlist symbol picked
/// uniformly; independently, with probability `sell_probability`, sells one
/// symbol whose last executed trade was a buy. Quantities are uniform in
/// `[min_quantity, max_quantity]`.
///
/// Draws come from the `(date, "random_trading")` stream of the seed
/// hierarchy, so a replayed day makes the same picks.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSignal;

fn check(config: &RandomConfig) -> Result<(), SignalError> {
    for (name, p) in [
        ("buy_probability", config.buy_probability),
        ("sell_probability", config.sell_probability),
    ] {
        if !(0.0..=1.0).contains(&p) {
            return Err(SignalError::InvalidConfig(format!(
                "random.{name} must be in [0, 1], got {p}"
            )));
        }
    }
    if config.min_quantity > config.max_quantity {
        return Err(SignalError::InvalidConfig(format!(
            "random.min_quantity {} exceeds max_quantity {}",
            config.min_quantity, config.max_quantity
        )));
    }
    Ok(())
}

impl SignalModule for RandomSignal {
    fn kind(&self) -> SignalKind {
        SignalKind::RandomTrading
    }

    fn propose(
        &self,
        plan: &mut TradingPlan,
        ctx: &MarketContext<'_>,
        settings: &SignalSettings,
    ) -> Result<(), SignalError> {
        let config = &settings.random;
        check(config)?;

        let mut rng = ctx.seeds.rng_for(ctx.date, self.kind().as_str());
        let quantity_range = config.min_quantity..=config.max_quantity;

        if rng.gen_bool(config.buy_probability) {
            if let Some(symbol) = ctx.watchlist.choose(&mut rng) {
                let quantity = rng.gen_range(quantity_range.clone());
                tracing::info!(%symbol, quantity, "random buy");
                plan.propose(symbol.clone(), Action::buy_qty(quantity));
            }
        }

        if rng.gen_bool(config.sell_probability) {
            let candidates = ctx.ledger.last_bought();
            match candidates.choose(&mut rng) {
                Some(symbol) => {
                    let quantity = rng.gen_range(quantity_range);
                    tracing::info!(%symbol, quantity, "random sell");
                    plan.propose(symbol.to_string(), Action::sell_qty(quantity));
                }
                None => tracing::debug!("no previously bought symbols to sell"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::rng::SeedHierarchy;
    use crate::signals::test_support::Fixture;

    fn settings(buy: f64, sell: f64) -> SignalSettings {
        let mut s = SignalSettings::default();
        s.random.buy_probability = buy;
        s.random.sell_probability = sell;
        s
    }

    #[test]
    fn certain_buy_yields_exactly_one_buy() {
        for seed in 0..50 {
            let mut fx = Fixture::new(&["AAPL", "GOOG"]);
            fx.seeds = SeedHierarchy::new(seed);
            let mut plan = TradingPlan::new();
            RandomSignal
                .propose(&mut plan, &fx.ctx(), &settings(1.0, 0.0))
                .unwrap();
            assert_eq!(plan.buys(), 1);
            assert_eq!(plan.sells(), 0);
            let (symbol, action) = plan.iter().next().unwrap();
            assert!(symbol == "AAPL" || symbol == "GOOG");
            let qty = action.quantity().unwrap();
            assert!((1..=10).contains(&qty));
        }
    }

    #[test]
    fn sell_only_targets_last_bought() {
        let mut fx = Fixture::new(&["AAPL", "GOOG", "MSFT"]);
        fx.ledger.record("GOOG", Side::Buy);
        fx.ledger.record("MSFT", Side::Sell);
        let mut plan = TradingPlan::new();
        RandomSignal
            .propose(&mut plan, &fx.ctx(), &settings(0.0, 1.0))
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan.get("GOOG").unwrap().is_sell());
    }

    #[test]
    fn sell_without_candidates_is_noop() {
        let fx = Fixture::new(&["AAPL"]);
        let mut plan = TradingPlan::new();
        RandomSignal
            .propose(&mut plan, &fx.ctx(), &settings(0.0, 1.0))
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn same_seed_and_date_repeat_picks() {
        let fx = Fixture::new(&["AAPL", "GOOG", "MSFT", "AMZN"]);
        let mut first = TradingPlan::new();
        let mut second = TradingPlan::new();
        RandomSignal
            .propose(&mut first, &fx.ctx(), &settings(1.0, 0.0))
            .unwrap();
        RandomSignal
            .propose(&mut second, &fx.ctx(), &settings(1.0, 0.0))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn fixed_quantity_range() {
        let fx = Fixture::new(&["AAPL"]);
        let mut s = settings(1.0, 0.0);
        s.random.min_quantity = 4;
        s.random.max_quantity = 4;
        let mut plan = TradingPlan::new();
        RandomSignal.propose(&mut plan, &fx.ctx(), &s).unwrap();
        assert_eq!(plan.get("AAPL"), Some(&Action::buy_qty(4)));
    }

    #[test]
    fn invalid_probability_is_an_error() {
        let fx = Fixture::new(&["AAPL"]);
        let mut plan = TradingPlan::new();
        let err = RandomSignal
            .propose(&mut plan, &fx.ctx(), &settings(1.5, 0.0))
            .unwrap_err();
        assert!(matches!(err, SignalError::InvalidConfig(_)));
    }
}
