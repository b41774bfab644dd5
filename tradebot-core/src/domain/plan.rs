//! Trading plan: the per-cycle mapping from symbol to proposed action.
//!
//! A plan holds at most one action per symbol. Signal modules write into the
//! same plan in priority order, so a later write replaces an earlier one and a
//! removal cancels whatever was proposed before it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of a proposed or executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    /// Parse a case-insensitive action token ("buy", "SELL", ...).
    pub fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("buy") {
            Some(Side::Buy)
        } else if token.eq_ignore_ascii_case("sell") {
            Some(Side::Sell)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed action for one symbol.
///
/// The quantity is optional at aggregation time: direction-only signals leave
/// it empty and the sizing step fills it in later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    Buy { quantity: Option<u64> },
    Sell { quantity: Option<u64> },
}

impl Action {
    pub fn buy() -> Self {
        Action::Buy { quantity: None }
    }

    pub fn sell() -> Self {
        Action::Sell { quantity: None }
    }

    pub fn buy_qty(quantity: u64) -> Self {
        Action::Buy {
            quantity: Some(quantity),
        }
    }

    pub fn sell_qty(quantity: u64) -> Self {
        Action::Sell {
            quantity: Some(quantity),
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Action::Buy { .. } => Side::Buy,
            Action::Sell { .. } => Side::Sell,
        }
    }

    pub fn quantity(&self) -> Option<u64> {
        match self {
            Action::Buy { quantity } | Action::Sell { quantity } => *quantity,
        }
    }

    /// Same direction, new quantity.
    pub fn with_quantity(&self, quantity: u64) -> Self {
        match self.side() {
            Side::Buy => Action::buy_qty(quantity),
            Side::Sell => Action::sell_qty(quantity),
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Action::Buy { .. })
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Action::Sell { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quantity() {
            Some(q) => write!(f, "{} {q}", self.side()),
            None => write!(f, "{}", self.side()),
        }
    }
}

/// Symbol → action mapping built fresh every iteration.
///
/// Backed by a `BTreeMap` so iteration (and therefore execution and the
/// reviewer prompt) always runs in symbol order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradingPlan {
    entries: BTreeMap<String, Action>,
}

impl TradingPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an action, replacing any earlier action for the symbol.
    ///
    /// Returns the replaced action, if any.
    pub fn propose(&mut self, symbol: impl Into<String>, action: Action) -> Option<Action> {
        self.entries.insert(symbol.into(), action)
    }

    /// Cancel whatever is proposed for the symbol.
    pub fn cancel(&mut self, symbol: &str) -> Option<Action> {
        self.entries.remove(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&Action> {
        self.entries.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Action)> {
        self.entries.iter().map(|(s, a)| (s.as_str(), a))
    }

    /// Snapshot of the symbols currently present.
    pub fn symbols(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn buys(&self) -> usize {
        self.entries.values().filter(|a| a.is_buy()).count()
    }

    pub fn sells(&self) -> usize {
        self.entries.values().filter(|a| a.is_sell()).count()
    }
}

impl FromIterator<(String, Action)> for TradingPlan {
    fn from_iter<I: IntoIterator<Item = (String, Action)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for TradingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("{}");
        }
        f.write_str("{")?;
        for (i, (symbol, action)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{symbol}: {action}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_write_replaces_earlier() {
        let mut plan = TradingPlan::new();
        assert_eq!(plan.propose("AAPL", Action::buy()), None);
        assert_eq!(plan.propose("AAPL", Action::sell_qty(3)), Some(Action::buy()));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.get("AAPL"), Some(&Action::sell_qty(3)));
    }

    #[test]
    fn cancel_removes_entry() {
        let mut plan = TradingPlan::new();
        plan.propose("GOOG", Action::sell());
        assert_eq!(plan.cancel("GOOG"), Some(Action::sell()));
        assert!(plan.is_empty());
        assert_eq!(plan.cancel("GOOG"), None);
    }

    #[test]
    fn iteration_is_symbol_ordered() {
        let mut plan = TradingPlan::new();
        plan.propose("MSFT", Action::buy());
        plan.propose("AAPL", Action::sell());
        plan.propose("GOOG", Action::buy());
        let symbols: Vec<&str> = plan.iter().map(|(s, _)| s).collect();
        assert_eq!(symbols, vec!["AAPL", "GOOG", "MSFT"]);
    }

    #[test]
    fn side_parse_is_case_insensitive() {
        assert_eq!(Side::parse("BUY"), Some(Side::Buy));
        assert_eq!(Side::parse("Sell"), Some(Side::Sell));
        assert_eq!(Side::parse("hold"), None);
    }

    #[test]
    fn with_quantity_keeps_direction() {
        assert_eq!(Action::buy().with_quantity(7), Action::buy_qty(7));
        assert_eq!(Action::sell_qty(1).with_quantity(9), Action::sell_qty(9));
    }

    #[test]
    fn display_lists_entries() {
        let mut plan = TradingPlan::new();
        plan.propose("AAPL", Action::buy_qty(10));
        plan.propose("GOOG", Action::sell());
        assert_eq!(plan.to_string(), "{AAPL: buy 10, GOOG: sell}");
    }

    #[test]
    fn plan_serializes_as_map() {
        let mut plan = TradingPlan::new();
        plan.propose("AAPL", Action::buy_qty(2));
        let json = serde_json::to_string(&plan).unwrap();
        assert_eq!(json, r#"{"AAPL":{"action":"buy","quantity":2}}"#);
        let back: TradingPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
