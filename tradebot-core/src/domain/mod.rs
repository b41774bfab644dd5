//! Domain types: plans, per-symbol trade state, prices, orders.

pub mod ledger;
pub mod order;
pub mod plan;
pub mod prices;

pub use ledger::TradeLedger;
pub use order::{Order, OrderAck, OrderType, Position, TimeInForce};
pub use plan::{Action, Side, TradingPlan};
pub use prices::{PriceHistory, PriceMatrix, PriceSeries};
