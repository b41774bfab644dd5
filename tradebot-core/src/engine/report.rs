//! What one iteration did, in a form that can be journaled.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::ModuleFailure;
use crate::domain::{Side, TradingPlan};
use crate::optimizer::PortfolioWeights;
use crate::reviewer::ReviewStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationPhase {
    Idle,
    FetchPrices,
    Optimize,
    Aggregate,
    Size,
    Review,
    Execute,
}

impl fmt::Display for IterationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::FetchPrices => "fetch_prices",
            Self::Optimize => "optimize",
            Self::Aggregate => "aggregate",
            Self::Size => "size",
            Self::Review => "review",
            Self::Execute => "execute",
        })
    }
}

/// A plan entry that produced no order, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedOrder {
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    pub order_id: String,
    pub fill_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub symbol: String,
    pub side: Side,
    pub reason: String,
}

/// Phase in which a cycle stopped early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Abort {
    pub phase: IterationPhase,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationReport {
    pub started_at: DateTime<Utc>,
    /// Trading date; unset when the market clock could not be read.
    pub date: Option<NaiveDate>,
    pub weights: PortfolioWeights,
    /// Plan as aggregated from the signal modules.
    pub proposed: TradingPlan,
    /// Plan after sizing, as sent to the reviewer.
    pub sized: TradingPlan,
    /// Plan that was executed.
    pub reviewed: TradingPlan,
    pub review: Option<ReviewStatus>,
    pub module_failures: Vec<ModuleFailure>,
    pub skipped: Vec<SkippedEntry>,
    pub orders: Vec<ExecutedOrder>,
    pub execution_failures: Vec<ExecutionFailure>,
    pub aborted: Option<Abort>,
}

impl IterationReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            date: None,
            weights: PortfolioWeights::new(),
            proposed: TradingPlan::new(),
            sized: TradingPlan::new(),
            reviewed: TradingPlan::new(),
            review: None,
            module_failures: Vec::new(),
            skipped: Vec::new(),
            orders: Vec::new(),
            execution_failures: Vec::new(),
            aborted: None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub(crate) fn skip(&mut self, symbol: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::info!(%symbol, %reason, "no order");
        self.skipped.push(SkippedEntry {
            symbol: symbol.to_string(),
            reason,
        });
    }
}
