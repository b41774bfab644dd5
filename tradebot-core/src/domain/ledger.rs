//! Per-symbol trade state that survives across iterations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::plan::Side;

/// Last executed trade direction per symbol.
///
/// Owned by the iteration controller and mutated only after a successful
/// order submission. Signal modules get a shared reference (the random module
/// only sells symbols whose last trade was a buy).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeLedger {
    last: BTreeMap<String, Side>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_direction(&self, symbol: &str) -> Option<Side> {
        self.last.get(symbol).copied()
    }

    pub fn record(&mut self, symbol: impl Into<String>, side: Side) {
        self.last.insert(symbol.into(), side);
    }

    /// Symbols whose most recent trade was a buy, in symbol order.
    pub fn last_bought(&self) -> Vec<&str> {
        self.last
            .iter()
            .filter(|(_, side)| **side == Side::Buy)
            .map(|(s, _)| s.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
