//! Per-cycle trading state machine.
//!
//! One iteration walks the phases in order:
//!
//! 1. FetchPrices: daily closes for the watchlist (cached per calendar date)
//! 2. Optimize: portfolio weights, zero tilt on failure
//! 3. Aggregate: signal modules in priority order
//! 4. Size: quantities for direction-only entries
//! 5. Review: optional advisory pass over the sized plan
//! 6. Execute: market orders, trade ledger updated on success
//!
//! and then returns to Idle. Only a failed price fetch, an empty price
//! history, a failed account query or a panic ends a cycle early.

pub mod controller;
pub mod execution;
pub mod report;
pub mod sizing;

pub use controller::{Collaborators, TradingIterationController};
pub use report::{
    Abort, ExecutedOrder, ExecutionFailure, IterationPhase, IterationReport, SkippedEntry,
};

use thiserror::Error;

use crate::data::{DataError, ExecutionError};

/// Errors that end a cycle early.
#[derive(Debug, Error)]
pub enum IterationError {
    #[error("market clock unavailable: {0}")]
    Clock(#[source] DataError),

    #[error("price fetch failed: {0}")]
    PriceFetch(#[source] DataError),

    #[error("no price history for any watched symbol")]
    NoPrices,

    #[error("account query failed: {0}")]
    Account(#[source] ExecutionError),

    #[error("iteration panicked: {0}")]
    Panicked(String),
}
