//! Orders and positions as exchanged with the brokerage collaborator.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::plan::Side;

/// Order type. The trading loop only places market orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
        }
    }
}

/// Time in force. Orders live for the trading day only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Day => "day",
        }
    }
}

/// An order ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub quantity: u64,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
}

impl Order {
    /// Market order valid for the day.
    pub fn market(symbol: impl Into<String>, quantity: u64, side: Side) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            side,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Day,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({}, {})",
            self.side,
            self.quantity,
            self.symbol,
            self.order_type.as_str(),
            self.time_in_force.as_str()
        )
    }
}

/// Broker acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    /// Fill price when the broker reports one synchronously (paper trading).
    pub fill_price: Option<f64>,
}

/// Current holding in one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: u64,
}

impl Position {
    pub fn flat() -> Self {
        Self { quantity: 0 }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }
}
