//! Portfolio weights from price history.
//!
//! [`PortfolioOptimizer`] is the seam; [`MaxSharpeOptimizer`] is the built-in
//! implementation. [`optimize_or_empty`] wraps any optimizer with input checks
//! and turns every failure into an empty mapping, which downstream reads as
//! weight 0 for every symbol.

mod max_sharpe;

pub use max_sharpe::MaxSharpeOptimizer;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PriceMatrix;

#[derive(Debug, Error, PartialEq)]
pub enum OptimizationError {
    #[error("price matrix is empty")]
    EmptyMatrix,

    #[error("price matrix contains missing values")]
    MissingValues,

    #[error("need at least 2 rows per symbol, got {rows}")]
    InsufficientRows { rows: usize },

    #[error("price columns have different lengths")]
    RaggedMatrix,

    #[error("non-positive price for {symbol}")]
    NonPositivePrice { symbol: String },

    #[error("no asset has an expected return above the risk-free rate")]
    NoPositiveExcessReturn,

    #[error("covariance matrix is singular")]
    SingularCovariance,
}

/// Target allocation per symbol. Weights are finite and non-negative; a
/// symbol not in the mapping has weight 0. Weights need not sum to 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortfolioWeights {
    weights: BTreeMap<String, f64>,
}

impl PortfolioWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a weight. Negative or non-finite weights are stored as 0.
    pub fn insert(&mut self, symbol: impl Into<String>, weight: f64) {
        let weight = if weight.is_finite() && weight > 0.0 {
            weight
        } else {
            0.0
        };
        self.weights.insert(symbol.into(), weight);
    }

    pub fn get(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(s, w)| (s.as_str(), *w))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for PortfolioWeights {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut weights = Self::new();
        for (symbol, weight) in iter {
            weights.insert(symbol, weight);
        }
        weights
    }
}

pub trait PortfolioOptimizer: Send + Sync {
    fn name(&self) -> &str;

    /// Weights for the symbols of `prices`. Callers pass validated input.
    fn optimize(&self, prices: &PriceMatrix) -> Result<PortfolioWeights, OptimizationError>;
}

/// Reject matrices an optimizer cannot work with.
pub fn validate_matrix(prices: &PriceMatrix) -> Result<(), OptimizationError> {
    if prices.n_symbols() == 0 || prices.columns().iter().all(Vec::is_empty) {
        return Err(OptimizationError::EmptyMatrix);
    }
    if prices.is_ragged() {
        return Err(OptimizationError::RaggedMatrix);
    }
    if prices.has_missing() {
        return Err(OptimizationError::MissingValues);
    }
    let rows = prices.n_rows();
    if rows < 2 {
        return Err(OptimizationError::InsufficientRows { rows });
    }
    Ok(())
}

/// Validate, delegate, and fall back to an empty mapping on any failure.
pub fn optimize_or_empty(optimizer: &dyn PortfolioOptimizer, prices: &PriceMatrix) -> PortfolioWeights {
    let result = validate_matrix(prices).and_then(|()| optimizer.optimize(prices));
    match result {
        Ok(weights) => {
            tracing::info!(
                optimizer = optimizer.name(),
                symbols = prices.n_symbols(),
                allocated = weights.iter().filter(|(_, w)| *w > 0.0).count(),
                total = weights.total(),
                "portfolio weights computed"
            );
            weights
        }
        Err(e) => {
            tracing::warn!(optimizer = optimizer.name(), error = %e, "optimization failed, using zero weights");
            PortfolioWeights::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant;

    impl PortfolioOptimizer for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn optimize(&self, prices: &PriceMatrix) -> Result<PortfolioWeights, OptimizationError> {
            Ok(prices.symbols().iter().map(|s| (s.clone(), 0.5)).collect())
        }
    }

    fn matrix(cols: &[(&str, &[f64])]) -> PriceMatrix {
        PriceMatrix::from_columns(
            cols.iter()
                .map(|(s, c)| (s.to_string(), c.to_vec()))
                .collect(),
        )
    }

    #[test]
    fn missing_symbol_weighs_zero() {
        let weights: PortfolioWeights = [("AAPL", 0.7)].into_iter().collect();
        assert_eq!(weights.get("AAPL"), 0.7);
        assert_eq!(weights.get("GOOG"), 0.0);
    }

    #[test]
    fn negative_weights_are_floored() {
        let weights: PortfolioWeights = [("AAPL", -0.2), ("GOOG", f64::NAN)].into_iter().collect();
        assert_eq!(weights.get("AAPL"), 0.0);
        assert_eq!(weights.get("GOOG"), 0.0);
    }

    #[test]
    fn validation_catches_bad_input() {
        assert_eq!(
            validate_matrix(&PriceMatrix::default()),
            Err(OptimizationError::EmptyMatrix)
        );
        assert_eq!(
            validate_matrix(&matrix(&[("A", &[1.0, f64::NAN])])),
            Err(OptimizationError::MissingValues)
        );
        assert_eq!(
            validate_matrix(&matrix(&[("A", &[1.0])])),
            Err(OptimizationError::InsufficientRows { rows: 1 })
        );
        assert_eq!(
            validate_matrix(&matrix(&[("A", &[1.0, 2.0]), ("B", &[1.0, 2.0, 3.0])])),
            Err(OptimizationError::RaggedMatrix)
        );
        assert!(validate_matrix(&matrix(&[("A", &[1.0, 2.0])])).is_ok());
    }

    #[test]
    fn wrapper_returns_empty_instead_of_raising() {
        assert!(optimize_or_empty(&Constant, &PriceMatrix::default()).is_empty());
        assert!(optimize_or_empty(&Constant, &matrix(&[("A", &[f64::NAN, 1.0])])).is_empty());
        assert!(optimize_or_empty(&Constant, &matrix(&[("A", &[1.0])])).is_empty());
    }

    #[test]
    fn wrapper_passes_valid_input_through() {
        let weights = optimize_or_empty(&Constant, &matrix(&[("A", &[1.0, 2.0])]));
        assert_eq!(weights.get("A"), 0.5);
    }
}
