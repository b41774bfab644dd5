//! Long-only maximum Sharpe ratio portfolio.
//!
//! - expected returns: compounded mean of daily simple returns, annualised
//! - risk model: Ledoit-Wolf shrinkage of the sample covariance toward a
//!   scaled identity, annualised
//! - weights: tangency portfolio restricted to non-negative weights, solved
//!   by dropping the most negative asset until the solution is long-only
//! - cleaning: weights below 1e-4 are zeroed, the rest rounded to 5 decimals

use nalgebra::{DMatrix, DVector};

use super::{OptimizationError, PortfolioOptimizer, PortfolioWeights};
use crate::domain::PriceMatrix;

const CUTOFF: f64 = 1e-4;
const ROUNDING_DECIMALS: i32 = 5;
/// Smallest Cholesky diagonal accepted before the covariance counts as singular.
const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct MaxSharpeOptimizer {
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
}

impl Default for MaxSharpeOptimizer {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            periods_per_year: 252.0,
        }
    }
}

impl MaxSharpeOptimizer {
    pub fn new(risk_free_rate: f64) -> Self {
        Self {
            risk_free_rate,
            ..Self::default()
        }
    }
}

/// Simple returns `p[t] / p[t-1] - 1`, one row per period and one column
/// per symbol.
pub(crate) fn simple_returns(prices: &PriceMatrix) -> Result<DMatrix<f64>, OptimizationError> {
    for (symbol, col) in prices.symbols().iter().zip(prices.columns()) {
        if col.iter().any(|p| *p <= 0.0) {
            return Err(OptimizationError::NonPositivePrice {
                symbol: symbol.clone(),
            });
        }
    }
    let periods = prices.n_rows().saturating_sub(1);
    Ok(DMatrix::from_fn(periods, prices.n_symbols(), |t, j| {
        let col = prices.column(j);
        col[t + 1] / col[t] - 1.0
    }))
}

/// Geometric mean return scaled to `periods_per_year`.
pub(crate) fn annualised_mean(
    returns: impl IntoIterator<Item = f64>,
    periods_per_year: f64,
) -> f64 {
    let (growth, n) = returns
        .into_iter()
        .fold((1.0, 0usize), |(g, n), r| (g * (1.0 + r), n + 1));
    if n == 0 {
        return 0.0;
    }
    growth.powf(periods_per_year / n as f64) - 1.0
}

/// Ledoit-Wolf shrinkage of the sample covariance of `returns` (rows are
/// observations, columns assets) toward a scaled identity. Returns the
/// matrix and the shrinkage intensity.
pub(crate) fn ledoit_wolf(returns: &DMatrix<f64>) -> (DMatrix<f64>, f64) {
    let (n, p) = returns.shape();
    if n == 0 || p == 0 {
        return (DMatrix::zeros(p, p), 0.0);
    }
    let (nf, pf) = (n as f64, p as f64);

    let means: Vec<f64> = returns.column_iter().map(|c| c.mean()).collect();
    let centered = DMatrix::from_fn(n, p, |t, j| returns[(t, j)] - means[j]);
    let emp_cov = centered.transpose() * &centered / nf;

    let trace = emp_cov.trace();
    let mu = trace / pf;

    // beta: dispersion of the per-observation outer products around emp_cov.
    let squared = centered.component_mul(&centered);
    let beta_sum = (squared.transpose() * &squared).sum();
    let delta_raw = emp_cov.norm_squared();
    let beta = (beta_sum / nf - delta_raw) / (pf * nf);
    let delta = (delta_raw - 2.0 * mu * trace + pf * mu * mu) / pf;
    let beta = beta.min(delta);
    let shrinkage = if beta <= 0.0 || delta <= 0.0 {
        0.0
    } else {
        beta / delta
    };

    let target = DMatrix::<f64>::identity(p, p) * mu;
    let shrunk = emp_cov * (1.0 - shrinkage) + target * shrinkage;
    (shrunk, shrinkage)
}

/// Solve `a · x = b` for a symmetric positive definite `a`.
fn solve_spd(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let chol = a.cholesky()?;
    if chol.l_dirty().diagonal().iter().any(|d| d.is_nan() || *d <= PIVOT_EPSILON) {
        return None;
    }
    let x = chol.solve(b);
    x.iter().all(|v| v.is_finite()).then_some(x)
}

fn clean(raw: &[f64]) -> Vec<f64> {
    let scale = 10f64.powi(ROUNDING_DECIMALS);
    raw.iter()
        .map(|&w| {
            if w.abs() < CUTOFF {
                0.0
            } else {
                (w * scale).round() / scale
            }
        })
        .collect()
}

impl MaxSharpeOptimizer {
    /// Tangency weights on the active set, shrinking it until all are >= 0.
    fn tangency(
        &self,
        mu: &DVector<f64>,
        cov: &DMatrix<f64>,
    ) -> Result<Vec<f64>, OptimizationError> {
        let n = mu.len();
        if !mu.iter().any(|m| *m > self.risk_free_rate) {
            return Err(OptimizationError::NoPositiveExcessReturn);
        }

        let mut active: Vec<usize> = (0..n).collect();
        loop {
            if active.is_empty() {
                return Err(OptimizationError::NoPositiveExcessReturn);
            }
            let sub = cov.select_rows(&active).select_columns(&active);
            let excess = active.iter().map(|&i| mu[i] - self.risk_free_rate);
            let excess = DVector::from_iterator(active.len(), excess);
            let y = solve_spd(sub, &excess).ok_or(OptimizationError::SingularCovariance)?;

            let (worst, worst_value) = y
                .iter()
                .copied()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap_or((0, 0.0));

            if worst_value < 0.0 {
                active.remove(worst);
                continue;
            }

            let total = y.sum();
            if total <= 0.0 {
                return Err(OptimizationError::NoPositiveExcessReturn);
            }

            let mut weights = vec![0.0; n];
            for (k, &i) in active.iter().enumerate() {
                weights[i] = y[k] / total;
            }
            return Ok(weights);
        }
    }
}

impl PortfolioOptimizer for MaxSharpeOptimizer {
    fn name(&self) -> &str {
        "max_sharpe"
    }

    fn optimize(&self, prices: &PriceMatrix) -> Result<PortfolioWeights, OptimizationError> {
        let returns = simple_returns(prices)?;
        let mu = DVector::from_iterator(
            returns.ncols(),
            returns
                .column_iter()
                .map(|c| annualised_mean(c.iter().copied(), self.periods_per_year)),
        );

        let (cov, shrinkage) = ledoit_wolf(&returns);
        let cov = cov * self.periods_per_year;
        tracing::debug!(shrinkage, assets = mu.len(), "covariance shrunk");

        let raw = self.tangency(&mu, &cov)?;
        Ok(prices
            .symbols()
            .iter()
            .cloned()
            .zip(clean(&raw))
            .collect())
    }
}
