//! Execution step: turn the reviewed plan into market orders.

use crate::data::Broker;
use crate::domain::{Action, Side, TradeLedger, TradingPlan};

use super::report::{ExecutedOrder, ExecutionFailure, IterationReport};

/// Submit one order per plan entry and record successful trades.
///
/// Buys use the planned quantity. Sells always liquidate the whole live
/// position; with `gate_sells` they also require the symbol's last executed
/// trade to have been a buy. A failed submission is recorded and only affects
/// that symbol; the ledger changes only after the broker accepts an order.
pub fn execute_plan(
    plan: &TradingPlan,
    broker: &dyn Broker,
    ledger: &mut TradeLedger,
    gate_sells: bool,
    report: &mut IterationReport,
) {
    for (symbol, action) in plan.iter() {
        let quantity = match *action {
            Action::Buy { quantity } => match quantity {
                Some(q) if q > 0 => q,
                _ => {
                    report.skip(symbol, "buy has no quantity");
                    continue;
                }
            },
            Action::Sell { .. } => {
                if gate_sells && ledger.last_direction(symbol) != Some(Side::Buy) {
                    report.skip(symbol, "last trade was not a buy");
                    continue;
                }
                match broker.position(symbol) {
                    Ok(pos) if pos.is_flat() => {
                        report.skip(symbol, "no position to sell");
                        continue;
                    }
                    Ok(pos) => pos.quantity,
                    Err(e) => {
                        fail(report, symbol, Side::Sell, e.to_string());
                        continue;
                    }
                }
            }
        };

        let side = action.side();
        let order = broker.create_order(symbol, quantity, side);
        match broker.submit_order(&order) {
            Ok(ack) => {
                tracing::info!(%order, order_id = %ack.order_id, fill = ?ack.fill_price, "order submitted");
                ledger.record(symbol, side);
                report.orders.push(ExecutedOrder {
                    symbol: symbol.to_string(),
                    side,
                    quantity,
                    order_id: ack.order_id,
                    fill_price: ack.fill_price,
                });
            }
            Err(e) => fail(report, symbol, side, e.to_string()),
        }
    }
}

fn fail(report: &mut IterationReport, symbol: &str, side: Side, reason: String) {
    tracing::error!(%symbol, %side, %reason, "order failed");
    report.execution_failures.push(ExecutionFailure {
        symbol: symbol.to_string(),
        side,
        reason,
    });
}
