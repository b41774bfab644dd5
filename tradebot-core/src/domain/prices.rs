//! Closing-price history for the watchlist.
//!
//! Series are oldest-first and immutable for the lifetime of one iteration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered closing prices for one symbol, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSeries(Vec<f64>);

impl PriceSeries {
    pub fn new(closes: Vec<f64>) -> Self {
        Self(closes)
    }

    pub fn closes(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.0.last().copied()
    }

    /// The two most recent closes as `(previous, latest)`.
    pub fn last_two(&self) -> Option<(f64, f64)> {
        match self.0.as_slice() {
            [.., prev, latest] => Some((*prev, *latest)),
            _ => None,
        }
    }

    /// The most recent `n` closes (all of them if fewer).
    pub fn tail(&self, n: usize) -> &[f64] {
        let start = self.0.len().saturating_sub(n);
        &self.0[start..]
    }
}

impl From<Vec<f64>> for PriceSeries {
    fn from(closes: Vec<f64>) -> Self {
        Self(closes)
    }
}

/// Per-symbol price series for one iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceHistory {
    series: BTreeMap<String, PriceSeries>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, series: impl Into<PriceSeries>) {
        self.series.insert(symbol.into(), series.into());
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// True when no symbol has any price at all.
    pub fn is_empty(&self) -> bool {
        self.series.values().all(PriceSeries::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PriceSeries)> {
        self.series.iter().map(|(s, p)| (s.as_str(), p))
    }

    /// Keep only the most recent `n` closes of every series.
    pub fn truncated(&self, n: usize) -> Self {
        Self {
            series: self
                .series
                .iter()
                .map(|(s, p)| (s.clone(), PriceSeries::new(p.tail(n).to_vec())))
                .collect(),
        }
    }
}

impl<S: Into<String>, P: Into<PriceSeries>> FromIterator<(S, P)> for PriceHistory {
    fn from_iter<I: IntoIterator<Item = (S, P)>>(iter: I) -> Self {
        Self {
            series: iter
                .into_iter()
                .map(|(s, p)| (s.into(), p.into()))
                .collect(),
        }
    }
}

/// Fewest closes a series needs to produce one return.
const MIN_MATRIX_ROWS: usize = 2;

/// Column-per-symbol price matrix handed to the portfolio optimizer.
///
/// `columns[i]` holds the closes of `symbols[i]`. Columns built by
/// [`PriceMatrix::from_history`] are aligned on their most recent rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceMatrix {
    symbols: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl PriceMatrix {
    /// Build a matrix from raw columns. Lengths are not checked here; the
    /// optimizer wrapper rejects ragged input.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Self {
        let (symbols, columns) = columns.into_iter().unzip();
        Self { symbols, columns }
    }

    /// Align every series with at least two closes on its most recent
    /// `max_rows` closes, cut to the length of the shortest one.
    ///
    /// Shorter series (a fresh listing, a data gap) are left out so they do
    /// not cut every other column down to a single row.
    pub fn from_history(history: &PriceHistory, max_rows: usize) -> Self {
        let usable = || history.iter().filter(|(_, p)| p.len() >= MIN_MATRIX_ROWS);
        let rows = usable()
            .map(|(_, p)| p.len())
            .min()
            .unwrap_or(0)
            .min(max_rows);

        let columns = usable()
            .map(|(s, p)| (s.to_string(), p.tail(rows).to_vec()))
            .collect();
        Self::from_columns(columns)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    pub fn n_symbols(&self) -> usize {
        self.symbols.len()
    }

    /// Row count of the shortest column (zero for an empty matrix).
    pub fn n_rows(&self) -> usize {
        self.columns.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() || self.n_rows() == 0
    }

    pub fn is_ragged(&self) -> bool {
        let first = self.columns.first().map(Vec::len);
        self.columns.iter().any(|c| Some(c.len()) != first)
    }

    pub fn has_missing(&self) -> bool {
        self.columns.iter().flatten().any(|v| !v.is_finite())
    }
}
