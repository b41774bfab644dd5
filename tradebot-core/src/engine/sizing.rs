//! Sizing step: fill in quantities the signal modules left open.

use crate::data::{Broker, MarketData};
use crate::domain::{Action, TradingPlan};
use crate::optimizer::PortfolioWeights;
use crate::sizers::{apply_weight, PositionSizer, SizeDecision};

use super::report::IterationReport;
use super::IterationError;

/// Inputs that stay fixed for one sizing pass.
pub struct SizingInputs<'a> {
    pub sizer: &'a dyn PositionSizer,
    pub weights: &'a PortfolioWeights,
    pub watchlist_size: usize,
    pub market: &'a dyn MarketData,
    pub broker: &'a dyn Broker,
}

/// Size every entry of `plan`.
///
/// - Buys without a quantity get `sizer × weight`; a skip or a zero result
///   drops the entry.
/// - Buys with an explicit quantity keep it (zero is dropped).
/// - Sells without a quantity are annotated with the live position so the
///   reviewer sees a number; execution always sells the whole position.
///
/// Cash is read once, and only if some buy needs sizing. A failed cash query
/// is the only error.
pub fn size_plan(
    plan: &TradingPlan,
    inputs: &SizingInputs<'_>,
    report: &mut IterationReport,
) -> Result<TradingPlan, IterationError> {
    let needs_cash = plan
        .iter()
        .any(|(_, a)| a.is_buy() && a.quantity().is_none());
    let cash = if needs_cash {
        let cash = inputs.broker.cash().map_err(IterationError::Account)?;
        tracing::info!(cash, "cash available for sizing");
        cash
    } else {
        0.0
    };

    let mut sized = TradingPlan::new();
    for (symbol, action) in plan.iter() {
        match *action {
            Action::Buy { quantity: Some(0) } => report.skip(symbol, "zero quantity"),
            Action::Buy { quantity: Some(_) } => {
                sized.propose(symbol, *action);
            }
            Action::Buy { quantity: None } => {
                let price = match inputs.market.last_price(symbol) {
                    Ok(p) => p,
                    Err(e) => {
                        report.skip(symbol, format!("no last price: {e}"));
                        continue;
                    }
                };
                let raw = match inputs.sizer.size(cash, price, inputs.watchlist_size) {
                    SizeDecision::Quantity(q) => q,
                    SizeDecision::Skip(reason) => {
                        report.skip(symbol, reason.to_string());
                        continue;
                    }
                };
                let weight = inputs.weights.get(symbol);
                let adjusted = apply_weight(raw, weight);
                tracing::debug!(%symbol, price, raw, weight, adjusted, "sized");
                if adjusted == 0 {
                    report.skip(
                        symbol,
                        format!("quantity {raw} rounds to zero at weight {weight}"),
                    );
                    continue;
                }
                sized.propose(symbol, Action::buy_qty(adjusted));
            }
            Action::Sell { quantity: Some(_) } => {
                sized.propose(symbol, *action);
            }
            Action::Sell { quantity: None } => {
                let annotated = match inputs.broker.position(symbol) {
                    Ok(pos) if !pos.is_flat() => Action::sell_qty(pos.quantity),
                    Ok(_) => Action::sell(),
                    Err(e) => {
                        tracing::warn!(%symbol, error = %e, "position unknown while sizing sell");
                        Action::sell()
                    }
                };
                sized.propose(symbol, annotated);
            }
        }
    }
    Ok(sized)
}
