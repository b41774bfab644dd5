//! Tradebot core: signal aggregation and trading-plan reconciliation.
//!
//! - Domain types (plans, trade ledger, prices, orders)
//! - Four signal modules and the failure-isolating plan aggregator
//! - Cash-at-risk position sizing with portfolio-weight tilt
//! - Max-Sharpe portfolio optimizer behind a validating wrapper
//! - Advisory plan review through a text-completion model
//! - Collaborator traits plus Alpaca / hosted-model HTTP clients
//! - The per-cycle iteration controller

pub mod aggregator;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod optimizer;
pub mod reviewer;
pub mod rng;
pub mod signals;
pub mod sizers;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: shared state and everything a live scheduler moves
    /// to a worker thread is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::TradingPlan>();
        require_sync::<domain::TradingPlan>();
        require_send::<domain::TradeLedger>();
        require_sync::<domain::TradeLedger>();
        require_send::<domain::PriceHistory>();
        require_sync::<domain::PriceHistory>();
        require_send::<config::ConfigRegistry>();
        require_sync::<config::ConfigRegistry>();
        require_send::<rng::SeedHierarchy>();
        require_sync::<rng::SeedHierarchy>();
        require_send::<optimizer::PortfolioWeights>();
        require_sync::<optimizer::PortfolioWeights>();
        require_send::<aggregator::PlanAggregator>();
        require_sync::<aggregator::PlanAggregator>();
        require_send::<reviewer::PlanReviewer>();
        require_sync::<reviewer::PlanReviewer>();
        require_send::<engine::IterationReport>();
        require_sync::<engine::IterationReport>();
        require_send::<engine::TradingIterationController>();
        require_sync::<engine::TradingIterationController>();
        require_send::<data::AlpacaClient>();
        require_sync::<data::AlpacaClient>();
    }

    /// Signal modules see market state and the trade ledger, never the broker.
    #[test]
    fn signal_module_trait_has_no_broker_parameter() {
        fn _check_trait_object_builds(
            module: &dyn signals::SignalModule,
            plan: &mut domain::TradingPlan,
            ctx: &signals::MarketContext<'_>,
            settings: &config::SignalSettings,
        ) -> Result<(), signals::SignalError> {
            module.propose(plan, ctx, settings)
        }
    }
}
