//! Advisory plan review by a text-completion model.
//!
//! The plan is rendered one `SYMBOL ACTION QUANTITY` line per entry, sent to a
//! [`TextCompleter`], and the reply is parsed back line by line. The reviewer
//! can only ever make a plan smaller or resize it: lines for symbols that were
//! not submitted, or that flip an entry's side, are skipped, and buy
//! quantities are capped at the submitted size. It never blocks execution.
//! Any call failure, or a reply with no usable line, returns the original plan.

mod azure;

pub use azure::AzureCompleter;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Action, Side, TradingPlan};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("review call failed: {0}")]
    Call(String),

    #[error("reviewer returned no usable lines")]
    EmptyResponse,

    #[error("could not parse line '{line}': {reason}")]
    Parse { line: String, reason: String },
}

/// Text in, text out.
pub trait TextCompleter: Send + Sync {
    fn name(&self) -> &str;

    fn complete(&self, prompt: &str) -> Result<String, ReviewError>;
}

/// How the review step ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewStatus {
    /// No reviewer configured.
    Disabled,
    /// Nothing to review.
    EmptyPlan,
    Revised { accepted: usize, skipped: usize },
    /// The original plan was kept.
    FellBack { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub plan: TradingPlan,
    pub status: ReviewStatus,
}

/// One line per entry. Entries without a quantity render as 0.
pub fn render_plan(plan: &TradingPlan) -> String {
    plan.iter()
        .map(|(symbol, action)| {
            format!(
                "{symbol} {} {}",
                action.side(),
                action.quantity().unwrap_or(0)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(plan: &TradingPlan) -> String {
    format!(
        "You are a trading assistant. Review the following trading plan and suggest \
         any necessary revisions for sanity check.\n\
         Each line is SYMBOL ACTION QUANTITY, where ACTION is buy or sell.\n\n\
         {}\n\n\
         Provide your revised plan in the same format, one line per trade, with no \
         other text.",
        render_plan(plan)
    )
}

/// Parse one reply line against the plan that was sent for review.
///
/// Accepts `SYMBOL ACTION QUANTITY` and `SYMBOL: ACTION QUANTITY`. The symbol
/// must be on the watchlist and in `submitted` with the same side. A buy needs
/// a positive quantity and is capped at the submitted quantity; a sell of 0
/// means "sell the whole position".
pub fn parse_line(
    line: &str,
    watchlist: &BTreeSet<String>,
    submitted: &TradingPlan,
) -> Result<(String, Action), ReviewError> {
    let fail = |reason: &str| ReviewError::Parse {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [symbol, action, quantity] = tokens.as_slice() else {
        return Err(fail("expected SYMBOL ACTION QUANTITY"));
    };

    let symbol = symbol.trim_end_matches(':').to_ascii_uppercase();
    if !watchlist.contains(&symbol) {
        return Err(fail("symbol is not on the watchlist"));
    }
    let Some(original) = submitted.get(&symbol) else {
        return Err(fail("symbol was not in the submitted plan"));
    };
    let side = Side::parse(action).ok_or_else(|| fail("action must be buy or sell"))?;
    if side != original.side() {
        return Err(fail("action differs from the submitted plan"));
    }
    let quantity: u64 = quantity
        .parse()
        .map_err(|_| fail("quantity is not a whole number"))?;

    let action = match (side, quantity) {
        (Side::Buy, 0) => return Err(fail("buy quantity is zero")),
        (Side::Buy, q) => Action::buy_qty(original.quantity().map_or(q, |sized| q.min(sized))),
        (Side::Sell, 0) => Action::sell(),
        (Side::Sell, q) => Action::sell_qty(q),
    };
    Ok((symbol, action))
}

/// Parse a whole reply. Blank lines are ignored; malformed lines are returned
/// alongside the plan built from the good ones.
pub fn parse_reviewed_plan(
    reply: &str,
    watchlist: &BTreeSet<String>,
    submitted: &TradingPlan,
) -> (TradingPlan, Vec<ReviewError>) {
    let mut plan = TradingPlan::new();
    let mut errors = Vec::new();
    for line in reply.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match parse_line(line, watchlist, submitted) {
            Ok((symbol, action)) => {
                plan.propose(symbol, action);
            }
            Err(e) => errors.push(e),
        }
    }
    (plan, errors)
}

pub struct PlanReviewer {
    completer: Arc<dyn TextCompleter>,
    watchlist: BTreeSet<String>,
}

impl PlanReviewer {
    pub fn new(completer: Arc<dyn TextCompleter>, watchlist: &[String]) -> Self {
        Self {
            completer,
            watchlist: watchlist.iter().cloned().collect(),
        }
    }

    pub fn review(&self, plan: &TradingPlan) -> ReviewOutcome {
        if plan.is_empty() {
            return ReviewOutcome {
                plan: plan.clone(),
                status: ReviewStatus::EmptyPlan,
            };
        }

        match self.try_review(plan) {
            Ok((revised, skipped)) => {
                tracing::info!(
                    reviewer = self.completer.name(),
                    before = %plan,
                    after = %revised,
                    skipped,
                    "plan reviewed"
                );
                ReviewOutcome {
                    status: ReviewStatus::Revised {
                        accepted: revised.len(),
                        skipped,
                    },
                    plan: revised,
                }
            }
            Err(e) => {
                tracing::error!(reviewer = self.completer.name(), error = %e, "review failed, keeping original plan");
                ReviewOutcome {
                    plan: plan.clone(),
                    status: ReviewStatus::FellBack {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    fn try_review(&self, plan: &TradingPlan) -> Result<(TradingPlan, usize), ReviewError> {
        let reply = self.completer.complete(&build_prompt(plan))?;
        let (revised, errors) = parse_reviewed_plan(&reply, &self.watchlist, plan);
        for e in &errors {
            tracing::warn!(error = %e, "skipping reviewer line");
        }
        if revised.is_empty() {
            return Err(ReviewError::EmptyResponse);
        }
        Ok((revised, errors.len()))
    }
}
