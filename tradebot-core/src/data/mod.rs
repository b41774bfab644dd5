//! Collaborator traits for market data, news, sentiment and order execution,
//! plus the structured error type they share.
//!
//! The trading loop only talks to these traits, so live HTTP clients, the
//! backtest replay and test fakes are interchangeable.

pub mod alpaca;
pub mod sentiment;

pub use alpaca::AlpacaClient;
pub use sentiment::{
    HostedSentimentClassifier, NeutralClassifier, SentimentEstimate, SentimentLabel,
};

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::{Order, OrderAck, Position, PriceHistory};

/// Structured error types for collaborator calls.
///
/// Shared by every market, news and sentiment collaborator.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no data available for {symbol}")]
    NoData { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Errors from order placement and position queries.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("invalid order quantity {quantity} for {symbol}")]
    InvalidQuantity { symbol: String, quantity: u64 },

    #[error("no price to fill {symbol}")]
    NoPrice { symbol: String },

    #[error("insufficient cash: need {needed:.2}, have {available:.2}")]
    InsufficientCash { needed: f64, available: f64 },

    #[error("broker unreachable: {0}")]
    Network(String),
}

/// Market context: clock, prices, quotes.
pub trait MarketData: Send + Sync {
    fn name(&self) -> &str;

    /// Current time as seen by the market (the backtest clock when replaying).
    fn now(&self) -> Result<DateTime<Utc>, DataError>;

    /// Most recent traded price.
    fn last_price(&self, symbol: &str) -> Result<f64, DataError>;

    /// Daily closing prices, oldest first, at most `lookback` bars per symbol.
    ///
    /// Symbols without data are left out (or mapped to an empty series); an
    /// error means the whole request failed.
    fn daily_closes(&self, symbols: &[String], lookback: usize)
        -> Result<PriceHistory, DataError>;

    /// Current bid/ask spread. `Ok(None)` when no quote is available.
    fn spread(&self, _symbol: &str) -> Result<Option<f64>, DataError> {
        Ok(None)
    }
}

/// Headline source.
pub trait NewsProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Headlines published for `symbol` between `start` and `end` (inclusive).
    fn headlines(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, DataError>;
}

/// Maps a batch of headlines to a single `(probability, label)` estimate.
pub trait SentimentClassifier: Send + Sync {
    fn name(&self) -> &str;

    fn estimate(&self, headlines: &[String]) -> Result<SentimentEstimate, DataError>;
}

/// Account and order execution.
pub trait Broker: Send + Sync {
    fn name(&self) -> &str;

    /// Cash available for new positions.
    fn cash(&self) -> Result<f64, ExecutionError>;

    /// Current holding; a flat position when nothing is held.
    fn position(&self, symbol: &str) -> Result<Position, ExecutionError>;

    fn submit_order(&self, order: &Order) -> Result<OrderAck, ExecutionError>;

    /// Build a day market order. Overridable for brokers with extra fields.
    fn create_order(&self, symbol: &str, quantity: u64, side: crate::domain::Side) -> Order {
        Order::market(symbol, quantity, side)
    }
}
