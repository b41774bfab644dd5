//! Day-by-day backtest: replay bars through the live iteration controller.
//!
//! The controller is the same one the live bot runs; only its collaborators
//! change. A [`HistoricalMarket`] supplies the clock and prices, a
//! [`PaperBroker`] fills orders at the day's close, and an optional archive
//! supplies headlines. One iteration runs per trading day in the window.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tradebot_core::config::{ConfigRegistry, TradingConfig};
use tradebot_core::data::{NewsProvider, SentimentClassifier};
use tradebot_core::engine::{Collaborators, IterationReport, TradingIterationController};
use tradebot_core::optimizer::PortfolioOptimizer;
use tradebot_core::reviewer::{PlanReviewer, ReviewStatus};
use tradebot_core::rng::SeedHierarchy;

use crate::data_loader::BarSet;
use crate::historical::HistoricalMarket;
use crate::journal::IterationJournal;
use crate::paper::{Fill, PaperBroker};
use crate::RunError;

/// Everything except market and broker, which the backtest builds itself.
pub struct BacktestSetup {
    pub config: TradingConfig,
    pub registry: Arc<ConfigRegistry>,
    pub news: Arc<dyn NewsProvider>,
    pub classifier: Arc<dyn SentimentClassifier>,
    pub optimizer: Arc<dyn PortfolioOptimizer>,
    pub reviewer: Option<PlanReviewer>,
    pub seeds: SeedHierarchy,
}

/// Date window (inclusive, open ends allowed) and starting cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub initial_cash: f64,
}

impl Default for BacktestWindow {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            initial_cash: 100_000.0,
        }
    }
}

impl BacktestWindow {
    fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    fn describe(&self) -> String {
        let bound = |d: Option<NaiveDate>| d.map_or_else(|| "..".to_string(), |d| d.to_string());
        format!("{} to {}", bound(self.start), bound(self.end))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub cash: f64,
    pub equity: f64,
}

/// Condensed view of one iteration for the result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub date: NaiveDate,
    pub proposed: usize,
    pub orders: usize,
    pub skipped: usize,
    pub execution_failures: usize,
    pub module_failures: usize,
    pub review: Option<ReviewStatus>,
    pub aborted: Option<String>,
}

impl IterationSummary {
    fn from_report(date: NaiveDate, report: &IterationReport) -> Self {
        Self {
            date,
            proposed: report.proposed.len(),
            orders: report.orders.len(),
            skipped: report.skipped.len(),
            execution_failures: report.execution_failures.len(),
            module_failures: report.module_failures.len(),
            review: report.review.clone(),
            aborted: report
                .aborted
                .as_ref()
                .map(|a| format!("{}: {}", a.phase, a.reason)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub initial_cash: f64,
    pub final_equity: f64,
    /// `final_equity / initial_cash - 1`.
    pub total_return: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
    pub final_holdings: BTreeMap<String, u64>,
    pub iterations: Vec<IterationSummary>,
}

impl BacktestResult {
    pub fn to_json(&self) -> Result<String, RunError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), RunError> {
        let io_err = |source| RunError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_json()?).map_err(io_err)
    }
}

/// Run one iteration per trading day of `bars` inside `window`.
///
/// Every iteration report is appended to `journal` when one is given.
pub fn run_backtest(
    setup: BacktestSetup,
    bars: BarSet,
    window: &BacktestWindow,
    journal: Option<&IterationJournal>,
) -> Result<BacktestResult, RunError> {
    if !window.initial_cash.is_finite() || window.initial_cash <= 0.0 {
        return Err(RunError::InvalidCash(window.initial_cash));
    }
    let market = Arc::new(HistoricalMarket::new(bars).ok_or(RunError::NoBars)?);
    let days: Vec<NaiveDate> = market
        .calendar()
        .iter()
        .copied()
        .filter(|d| window.contains(*d))
        .collect();
    let (Some(&start), Some(&end)) = (days.first(), days.last()) else {
        return Err(RunError::NoTradingDays {
            window: window.describe(),
        });
    };

    let broker = Arc::new(PaperBroker::new(market.clone(), window.initial_cash));
    let collaborators = Collaborators {
        market: market.clone(),
        news: setup.news,
        classifier: setup.classifier,
        broker: broker.clone(),
        optimizer: setup.optimizer,
    };
    let mut controller =
        TradingIterationController::new(setup.config, setup.registry, collaborators, setup.seeds);
    if let Some(reviewer) = setup.reviewer {
        controller = controller.with_reviewer(reviewer);
    }

    tracing::info!(%start, %end, days = days.len(), cash = window.initial_cash, "backtest started");

    let mut equity_curve = Vec::with_capacity(days.len());
    let mut iterations = Vec::with_capacity(days.len());
    for date in days {
        market.set_date(date);
        let report = controller.run_iteration();
        if let Some(journal) = journal {
            journal.append(&report).map_err(RunError::Journal)?;
        }
        iterations.push(IterationSummary::from_report(date, &report));

        let cash = broker.cash_balance();
        let equity = broker.equity();
        tracing::debug!(%date, cash, equity, orders = report.orders.len(), "backtest day done");
        equity_curve.push(EquityPoint { date, cash, equity });
    }

    let final_equity = equity_curve.last().map_or(window.initial_cash, |p| p.equity);
    let result = BacktestResult {
        start,
        end,
        initial_cash: window.initial_cash,
        final_equity,
        total_return: final_equity / window.initial_cash - 1.0,
        equity_curve,
        fills: broker.fills(),
        final_holdings: broker.holdings(),
        iterations,
    };
    tracing::info!(
        final_equity = result.final_equity,
        total_return = result.total_return,
        fills = result.fills.len(),
        "backtest finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds_are_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let window = BacktestWindow {
            start: Some(d(2)),
            end: Some(d(4)),
            ..BacktestWindow::default()
        };
        assert!(window.contains(d(2)));
        assert!(window.contains(d(4)));
        assert!(!window.contains(d(5)));
        assert!(BacktestWindow::default().contains(d(31)));
        assert_eq!(window.describe(), "2024-01-02 to 2024-01-04");
    }
}
