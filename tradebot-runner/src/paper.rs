//! Paper broker for backtests: fills market orders at the replay close.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tradebot_core::data::{Broker, ExecutionError};
use tradebot_core::domain::{Order, OrderAck, Position, Side};

use crate::historical::HistoricalMarket;

/// One filled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub date: NaiveDate,
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    pub price: f64,
}

#[derive(Debug, Default)]
struct Book {
    cash: f64,
    positions: BTreeMap<String, u64>,
    fills: Vec<Fill>,
}

/// Cash account with whole-share positions and no shorting or margin.
pub struct PaperBroker {
    market: Arc<HistoricalMarket>,
    book: Mutex<Book>,
}

impl PaperBroker {
    pub fn new(market: Arc<HistoricalMarket>, initial_cash: f64) -> Self {
        Self {
            market,
            book: Mutex::new(Book {
                cash: initial_cash,
                ..Book::default()
            }),
        }
    }

    fn book(&self) -> std::sync::MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cash_balance(&self) -> f64 {
        self.book().cash
    }

    pub fn fills(&self) -> Vec<Fill> {
        self.book().fills.clone()
    }

    pub fn holdings(&self) -> BTreeMap<String, u64> {
        self.book().positions.clone()
    }

    /// Cash plus positions marked at the current replay close.
    ///
    /// A holding with no visible close yet is valued at zero.
    pub fn equity(&self) -> f64 {
        let book = self.book();
        let marked: f64 = book
            .positions
            .iter()
            .map(|(symbol, qty)| self.market.close(symbol).unwrap_or(0.0) * *qty as f64)
            .sum();
        book.cash + marked
    }
}

impl Broker for PaperBroker {
    fn name(&self) -> &str {
        "paper"
    }

    fn cash(&self) -> Result<f64, ExecutionError> {
        Ok(self.cash_balance())
    }

    fn position(&self, symbol: &str) -> Result<Position, ExecutionError> {
        Ok(Position {
            quantity: self.book().positions.get(symbol).copied().unwrap_or(0),
        })
    }

    fn submit_order(&self, order: &Order) -> Result<OrderAck, ExecutionError> {
        if order.quantity == 0 {
            return Err(ExecutionError::InvalidQuantity {
                symbol: order.symbol.clone(),
                quantity: 0,
            });
        }
        let price = self
            .market
            .close(&order.symbol)
            .ok_or_else(|| ExecutionError::NoPrice {
                symbol: order.symbol.clone(),
            })?;
        let notional = price * order.quantity as f64;

        let mut book = self.book();
        match order.side {
            Side::Buy => {
                if notional > book.cash {
                    return Err(ExecutionError::InsufficientCash {
                        needed: notional,
                        available: book.cash,
                    });
                }
                book.cash -= notional;
                *book.positions.entry(order.symbol.clone()).or_insert(0) += order.quantity;
            }
            Side::Sell => {
                let held = book.positions.get(&order.symbol).copied().unwrap_or(0);
                if order.quantity > held {
                    return Err(ExecutionError::Rejected(format!(
                        "cannot sell {} {}, holding {held}",
                        order.quantity, order.symbol
                    )));
                }
                book.cash += notional;
                if held == order.quantity {
                    book.positions.remove(&order.symbol);
                } else {
                    book.positions.insert(order.symbol.clone(), held - order.quantity);
                }
            }
        }

        let order_id = format!("paper-{}", book.fills.len() + 1);
        book.fills.push(Fill {
            order_id: order_id.clone(),
            date: self.market.date(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price,
        });
        Ok(OrderAck {
            order_id,
            fill_price: Some(price),
        })
    }
}
