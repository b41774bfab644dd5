//! The trading iteration controller.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use crate::aggregator::PlanAggregator;
use crate::config::{ConfigRegistry, TradingConfig};
use crate::data::{Broker, MarketData, NewsProvider, SentimentClassifier};
use crate::domain::{PriceHistory, PriceMatrix, TradeLedger};
use crate::optimizer::{optimize_or_empty, PortfolioOptimizer};
use crate::reviewer::{PlanReviewer, ReviewStatus};
use crate::rng::SeedHierarchy;
use crate::signals::{MarketContext, SignalKind};
use crate::sizers::{CashAtRiskSizer, PositionSizer};

use super::execution::execute_plan;
use super::report::{Abort, IterationPhase, IterationReport};
use super::sizing::{size_plan, SizingInputs};
use super::IterationError;

/// External services one iteration talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub market: Arc<dyn MarketData>,
    pub news: Arc<dyn NewsProvider>,
    pub classifier: Arc<dyn SentimentClassifier>,
    pub broker: Arc<dyn Broker>,
    pub optimizer: Arc<dyn PortfolioOptimizer>,
}

/// Runs trading cycles one at a time.
///
/// Owns the trade ledger and the per-date price cache; both persist across
/// cycles. Signal settings are read from the shared registry.
pub struct TradingIterationController {
    config: TradingConfig,
    registry: Arc<ConfigRegistry>,
    collaborators: Collaborators,
    reviewer: Option<PlanReviewer>,
    sizer: Box<dyn PositionSizer>,
    seeds: SeedHierarchy,
    ledger: TradeLedger,
    price_cache: Option<(NaiveDate, PriceHistory)>,
    phase: IterationPhase,
}

impl TradingIterationController {
    pub fn new(
        config: TradingConfig,
        registry: Arc<ConfigRegistry>,
        collaborators: Collaborators,
        seeds: SeedHierarchy,
    ) -> Self {
        let sizer = Box::new(CashAtRiskSizer::new(config.cash_at_risk));
        Self {
            config,
            registry,
            collaborators,
            reviewer: None,
            sizer,
            seeds,
            ledger: TradeLedger::new(),
            price_cache: None,
            phase: IterationPhase::Idle,
        }
    }

    pub fn with_reviewer(mut self, reviewer: PlanReviewer) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn with_sizer(mut self, sizer: Box<dyn PositionSizer>) -> Self {
        self.sizer = sizer;
        self
    }

    /// Start from a ledger restored elsewhere (e.g. a previous backtest day).
    pub fn with_ledger(mut self, ledger: TradeLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn phase(&self) -> IterationPhase {
        self.phase
    }

    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    /// Run one full cycle. Never fails: an early end is recorded in
    /// [`IterationReport::aborted`] and the controller returns to Idle.
    pub fn run_iteration(&mut self) -> IterationReport {
        let mut report = IterationReport::new(Utc::now());
        tracing::info!("trading iteration started");

        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_phases(&mut report)));
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(panic) => Some(IterationError::Panicked(panic_text(panic.as_ref()))),
        };

        if let Some(e) = error {
            tracing::error!(phase = %self.phase, error = %e, "iteration aborted");
            report.aborted = Some(Abort {
                phase: self.phase,
                reason: e.to_string(),
            });
        } else {
            tracing::info!(
                orders = report.orders.len(),
                skipped = report.skipped.len(),
                failures = report.execution_failures.len(),
                "trading iteration finished"
            );
        }
        self.phase = IterationPhase::Idle;
        report
    }

    fn enter(&mut self, phase: IterationPhase) {
        tracing::debug!(%phase, "entering phase");
        self.phase = phase;
    }

    fn run_phases(&mut self, report: &mut IterationReport) -> Result<(), IterationError> {
        self.enter(IterationPhase::FetchPrices);
        let now = self
            .collaborators
            .market
            .now()
            .map_err(IterationError::Clock)?;
        let date = now.date_naive();
        report.date = Some(date);
        let prices = self.prices_for(date)?;

        self.enter(IterationPhase::Optimize);
        let matrix = PriceMatrix::from_history(&prices, self.config.optimizer_lookback);
        report.weights = optimize_or_empty(self.collaborators.optimizer.as_ref(), &matrix);

        self.enter(IterationPhase::Aggregate);
        let order = self.registry.snapshot().order;
        let signal_prices = prices.truncated(self.config.price_lookback);
        let headlines = if order.contains(&SignalKind::NewsReaction) {
            self.fetch_headlines(date)
        } else {
            BTreeMap::new()
        };
        let spreads = if order.contains(&SignalKind::SpreadFilter) {
            self.fetch_spreads()
        } else {
            BTreeMap::new()
        };
        let ctx = MarketContext {
            date,
            watchlist: &self.config.watchlist,
            prices: &signal_prices,
            headlines: &headlines,
            spreads: &spreads,
            ledger: &self.ledger,
            classifier: self.collaborators.classifier.as_ref(),
            seeds: &self.seeds,
        };
        let aggregation = PlanAggregator::from_order(&order).aggregate(&ctx, &self.registry);
        report.proposed = aggregation.plan;
        report.module_failures = aggregation.failures;

        self.enter(IterationPhase::Size);
        let weights = report.weights.clone();
        let inputs = SizingInputs {
            sizer: self.sizer.as_ref(),
            weights: &weights,
            watchlist_size: self.config.watchlist.len(),
            market: self.collaborators.market.as_ref(),
            broker: self.collaborators.broker.as_ref(),
        };
        let proposed = report.proposed.clone();
        let sized = size_plan(&proposed, &inputs, report)?;
        report.sized = sized;

        self.enter(IterationPhase::Review);
        let (reviewed, status) = match &self.reviewer {
            Some(reviewer) => {
                let outcome = reviewer.review(&report.sized);
                (outcome.plan, outcome.status)
            }
            None => (report.sized.clone(), ReviewStatus::Disabled),
        };
        report.reviewed = reviewed;
        report.review = Some(status);

        self.enter(IterationPhase::Execute);
        let reviewed = report.reviewed.clone();
        execute_plan(
            &reviewed,
            self.collaborators.broker.as_ref(),
            &mut self.ledger,
            self.config.gate_sells_on_last_buy,
            report,
        );
        Ok(())
    }

    /// Price history for `date`, fetched once per calendar date.
    fn prices_for(&mut self, date: NaiveDate) -> Result<PriceHistory, IterationError> {
        if let Some((cached_date, history)) = &self.price_cache {
            if *cached_date == date {
                tracing::debug!(%date, "using cached prices");
                return Ok(history.clone());
            }
        }

        let history = self
            .collaborators
            .market
            .daily_closes(&self.config.watchlist, self.config.fetch_lookback())
            .map_err(IterationError::PriceFetch)?;
        if history.is_empty() {
            return Err(IterationError::NoPrices);
        }
        tracing::info!(%date, symbols = history.len(), "price history fetched");
        self.price_cache = Some((date, history.clone()));
        Ok(history)
    }

    fn fetch_headlines(&self, date: NaiveDate) -> BTreeMap<String, Vec<String>> {
        let start = date - Duration::days(self.config.news_window_days);
        let mut headlines = BTreeMap::new();
        for symbol in &self.config.watchlist {
            match self.collaborators.news.headlines(symbol, start, date) {
                Ok(items) if !items.is_empty() => {
                    headlines.insert(symbol.clone(), items);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(%symbol, error = %e, "news unavailable, treating as neutral"),
            }
        }
        headlines
    }

    fn fetch_spreads(&self) -> BTreeMap<String, f64> {
        let mut spreads = BTreeMap::new();
        for symbol in &self.config.watchlist {
            match self.collaborators.market.spread(symbol) {
                Ok(Some(spread)) if spread.is_finite() => {
                    spreads.insert(symbol.clone(), spread);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(%symbol, error = %e, "quote unavailable"),
            }
        }
        spreads
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
