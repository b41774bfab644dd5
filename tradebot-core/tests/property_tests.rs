//! Property-based tests for sizing, signals and portfolio weights.
//!
//! 1. Sizing is deterministic and never divides by a bad price or empty watchlist
//! 2. Weight tilt never exceeds the untilted quantity for weights in [0, 1]
//! 3. Momentum direction follows the sign of the last change outside the dead band
//! 4. Spread filter removes exactly the entries strictly above the limit
//! 5. Optimizer weights are non-negative whatever the input
//! 6. Random trading proposes at most one buy and one sell

use std::collections::BTreeMap;

use chrono::NaiveDate;
use proptest::prelude::*;

use tradebot_core::config::SignalSettings;
use tradebot_core::data::NeutralClassifier;
use tradebot_core::domain::{Action, PriceHistory, PriceMatrix, Side, TradeLedger, TradingPlan};
use tradebot_core::optimizer::{optimize_or_empty, MaxSharpeOptimizer, PortfolioWeights};
use tradebot_core::rng::SeedHierarchy;
use tradebot_core::signals::{
    MarketContext, MomentumSignal, RandomSignal, SignalModule, SpreadFilterSignal,
};
use tradebot_core::sizers::{apply_weight, CashAtRiskSizer, PositionSizer, SizeDecision};

const SYMBOLS: &[&str] = &["AAPL", "AMZN", "GOOG", "MSFT", "NVDA", "TSLA"];

fn run_module(
    module: &dyn SignalModule,
    plan: &mut TradingPlan,
    spreads: &BTreeMap<String, f64>,
    ledger: &TradeLedger,
    settings: &SignalSettings,
    seed: u64,
) {
    let watchlist: Vec<String> = SYMBOLS.iter().map(|s| s.to_string()).collect();
    let prices = PriceHistory::new();
    let headlines = BTreeMap::new();
    let seeds = SeedHierarchy::new(seed);
    let ctx = MarketContext {
        date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        watchlist: &watchlist,
        prices: &prices,
        headlines: &headlines,
        spreads,
        ledger,
        classifier: &NeutralClassifier,
        seeds: &seeds,
    };
    module.propose(plan, &ctx, settings).unwrap();
}

proptest! {
    // ── 1. Sizing guard and determinism ──

    #[test]
    fn sizing_is_deterministic_and_guarded(
        cash in 0.0f64..1e7,
        price in prop_oneof![-100.0f64..=0.0, 0.01f64..5_000.0],
        n in 0usize..50,
        car in 0.0f64..1.0,
    ) {
        let sizer = CashAtRiskSizer::new(car);
        let a = sizer.size(cash, price, n);
        let b = sizer.size(cash, price, n);
        prop_assert_eq!(a, b);

        if n == 0 || price <= 0.0 {
            prop_assert!(matches!(a, SizeDecision::Skip(_)));
        } else {
            let q = a.quantity().unwrap() as f64;
            let exact = cash * car / n as f64 / price;
            prop_assert!((q - exact).abs() <= 0.5 + 1e-9);
        }
    }

    // ── 2. Weight tilt ──

    #[test]
    fn tilt_is_bounded(q in 0u64..100_000, w in 0.0f64..=1.0) {
        let tilted = apply_weight(q, w);
        prop_assert!(tilted <= q);
        prop_assert_eq!(apply_weight(q, 0.0), 0);
        prop_assert_eq!(apply_weight(q, 1.0), q);
    }

    #[test]
    fn negative_or_nan_weight_gives_zero(q in 0u64..100_000, w in -10.0f64..0.0) {
        prop_assert_eq!(apply_weight(q, w), 0);
        prop_assert_eq!(apply_weight(q, f64::NAN), 0);
    }

    // ── 3. Momentum direction ──

    #[test]
    fn momentum_follows_last_change(
        prev in 1.0f64..1_000.0,
        delta in -50.0f64..50.0,
        threshold in 0.0f64..10.0,
    ) {
        let closes = [prev, prev + delta];
        let momentum = closes[1] - closes[0];
        match MomentumSignal::direction(&closes, threshold) {
            Some(action) if action.side() == Side::Buy => prop_assert!(momentum > threshold),
            Some(_) => prop_assert!(momentum < -threshold),
            None => prop_assert!(momentum.abs() <= threshold),
        }
    }

    // ── 4. Spread filter exactness ──

    #[test]
    fn spread_filter_removes_exactly_wide_entries(
        spreads in prop::collection::vec(0.0f64..0.1, SYMBOLS.len()),
        buys in prop::collection::vec(any::<bool>(), SYMBOLS.len()),
        limit in 0.0f64..0.1,
    ) {
        let spread_map: BTreeMap<String, f64> = SYMBOLS
            .iter()
            .zip(&spreads)
            .map(|(s, v)| (s.to_string(), *v))
            .collect();
        let mut plan = TradingPlan::new();
        for (symbol, buy) in SYMBOLS.iter().zip(&buys) {
            plan.propose(*symbol, if *buy { Action::buy() } else { Action::sell() });
        }
        let before = plan.clone();

        let mut settings = SignalSettings::default();
        settings.spread.limit = limit;
        run_module(&SpreadFilterSignal, &mut plan, &spread_map, &TradeLedger::new(), &settings, 1);

        for (symbol, spread) in &spread_map {
            if *spread > limit {
                prop_assert!(!plan.contains(symbol));
            } else {
                prop_assert_eq!(plan.get(symbol), before.get(symbol));
            }
        }
    }

    // ── 5. Non-negative weights ──

    #[test]
    fn optimizer_weights_are_non_negative(
        columns in prop::collection::vec(prop::collection::vec(1.0f64..500.0, 30), 1..5),
    ) {
        let matrix = PriceMatrix::from_columns(
            columns
                .into_iter()
                .enumerate()
                .map(|(i, c)| (SYMBOLS[i].to_string(), c))
                .collect(),
        );
        let weights: PortfolioWeights = optimize_or_empty(&MaxSharpeOptimizer::default(), &matrix);
        for (_, w) in weights.iter() {
            prop_assert!(w >= 0.0);
        }
        prop_assert!(weights.total() <= 1.0 + 1e-3);
    }

    // ── 6. Random trading bounds ──

    #[test]
    fn random_trading_proposes_at_most_one_each(
        seed in any::<u64>(),
        buy_p in 0.0f64..=1.0,
        sell_p in 0.0f64..=1.0,
    ) {
        let mut ledger = TradeLedger::new();
        ledger.record("AAPL", Side::Buy);
        ledger.record("GOOG", Side::Buy);

        let mut settings = SignalSettings::default();
        settings.random.buy_probability = buy_p;
        settings.random.sell_probability = sell_p;

        let mut plan = TradingPlan::new();
        run_module(&RandomSignal, &mut plan, &BTreeMap::new(), &ledger, &settings, seed);

        prop_assert!(plan.len() <= 2);
        prop_assert!(plan.buys() <= 1);
        prop_assert!(plan.sells() <= 1);
        for (symbol, action) in plan.iter() {
            if action.is_sell() {
                prop_assert!(symbol == "AAPL" || symbol == "GOOG");
            }
            let q = action.quantity().unwrap();
            prop_assert!((1..=10).contains(&q));
        }
    }
}
