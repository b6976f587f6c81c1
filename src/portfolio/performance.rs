//! # Portfolio Performance
//!
//! $$
//! \mu_p=\mathbf w^\top\mu,\qquad \sigma_p=\sqrt{\mathbf w^\top\Sigma\mathbf w},\qquad S=\frac{\mu_p-r_f}{\sigma_p}
//! $$
//!
//! Expected return, volatility and Sharpe ratio of a weight vector.

use ndarray::ArrayView1;
use ndarray::ArrayView2;

use super::types::PortfolioStats;
use crate::error::PortfolioError;
use crate::error::Result;

/// Annualized risk-free rate used when none is configured.
pub const DEFAULT_RISK_FREE: f64 = 0.02;

/// Negative variance below this is reported as degenerate; above it is clamped to zero.
pub const VARIANCE_TOLERANCE: f64 = 1e-12;

fn check_dims(weights: ArrayView1<f64>, n: usize) -> Result<()> {
  if weights.len() != n {
    return Err(PortfolioError::DimensionMismatch {
      expected: n,
      actual: weights.len(),
    });
  }
  Ok(())
}

/// `wᵀΣw`, clamped to zero within [`VARIANCE_TOLERANCE`].
pub fn portfolio_variance(weights: ArrayView1<f64>, covariance: ArrayView2<f64>) -> Result<f64> {
  let (rows, cols) = covariance.dim();
  if rows != cols {
    return Err(PortfolioError::DimensionMismatch {
      expected: rows,
      actual: cols,
    });
  }
  check_dims(weights, rows)?;

  let variance = weights.dot(&covariance.dot(&weights));
  if variance < -VARIANCE_TOLERANCE || variance.is_nan() {
    return Err(PortfolioError::DegenerateVariance { variance });
  }

  Ok(variance.max(0.0))
}

/// `sqrt(wᵀΣw)`.
pub fn portfolio_volatility(weights: ArrayView1<f64>, covariance: ArrayView2<f64>) -> Result<f64> {
  portfolio_variance(weights, covariance).map(f64::sqrt)
}

/// `wᵀμ`.
pub fn portfolio_return(weights: ArrayView1<f64>, mean_returns: ArrayView1<f64>) -> Result<f64> {
  check_dims(weights, mean_returns.len())?;
  Ok(weights.dot(&mean_returns))
}

/// Return, volatility and Sharpe ratio of `weights`. The Sharpe ratio is left
/// out when the portfolio has exactly zero volatility.
pub fn portfolio_stats(
  weights: ArrayView1<f64>,
  mean_returns: ArrayView1<f64>,
  covariance: ArrayView2<f64>,
  risk_free: f64,
) -> Result<PortfolioStats> {
  let expected_return = portfolio_return(weights, mean_returns)?;
  let volatility = portfolio_volatility(weights, covariance)?;

  Ok(PortfolioStats {
    expected_return,
    volatility,
    sharpe: (volatility > 0.0).then(|| (expected_return - risk_free) / volatility),
  })
}

/// Like [`portfolio_stats`], but fails with [`PortfolioError::DivisionByZero`]
/// when the portfolio has exactly zero volatility.
pub fn performance(
  weights: ArrayView1<f64>,
  mean_returns: ArrayView1<f64>,
  covariance: ArrayView2<f64>,
  risk_free: f64,
) -> Result<PortfolioStats> {
  let stats = portfolio_stats(weights, mean_returns, covariance, risk_free)?;
  if stats.sharpe.is_none() {
    return Err(PortfolioError::DivisionByZero);
  }
  Ok(stats)
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn unit_weight_reproduces_single_asset_moments() {
    let mu = array![0.12, 0.07, 0.03];
    let cov = array![[0.09, 0.01, 0.0], [0.01, 0.04, 0.0], [0.0, 0.0, 0.01]];
    let w = array![1.0, 0.0, 0.0];

    let stats = performance(w.view(), mu.view(), cov.view(), DEFAULT_RISK_FREE).unwrap();
    assert_eq!(stats.expected_return, mu[0]);
    assert_eq!(stats.volatility, cov[[0, 0]].sqrt());
    assert_relative_eq!(stats.sharpe.unwrap(), (0.12 - 0.02) / 0.3, epsilon = 1e-12);
  }

  #[test]
  fn diversified_two_asset_stats() {
    let mu = array![0.10, 0.20];
    let cov = array![[0.04, 0.0], [0.0, 0.09]];
    let w = array![0.5, 0.5];

    let stats = performance(w.view(), mu.view(), cov.view(), 0.02).unwrap();
    assert_relative_eq!(stats.expected_return, 0.15, epsilon = 1e-12);
    assert_relative_eq!(stats.volatility, 0.0325_f64.sqrt(), epsilon = 1e-12);
    assert_relative_eq!(stats.sharpe.unwrap(), 0.13 / 0.0325_f64.sqrt(), epsilon = 1e-12);
  }

  #[test]
  fn zero_volatility_is_division_by_zero() {
    let mu = array![0.05];
    let cov = array![[0.0]];
    let err = performance(array![1.0].view(), mu.view(), cov.view(), 0.02).unwrap_err();
    assert_eq!(err, PortfolioError::DivisionByZero);
  }

  #[test]
  fn riskless_stats_omit_sharpe() {
    let stats =
      portfolio_stats(array![1.0].view(), array![0.05].view(), array![[0.0]].view(), 0.02).unwrap();
    assert_eq!(stats.expected_return, 0.05);
    assert_eq!(stats.volatility, 0.0);
    assert_eq!(stats.sharpe, None);
  }

  #[test]
  fn negative_variance_is_degenerate() {
    let cov = array![[0.01, 0.05], [0.05, 0.01]];
    let err = portfolio_variance(array![0.5, -0.5].view(), cov.view()).unwrap_err();
    assert!(matches!(err, PortfolioError::DegenerateVariance { .. }));
  }

  #[test]
  fn tiny_negative_variance_is_clamped() {
    let cov = array![[-1e-14]];
    let v = portfolio_variance(array![1.0].view(), cov.view()).unwrap();
    assert_eq!(v, 0.0);
  }

  #[test]
  fn mismatched_lengths_fail() {
    let err = portfolio_return(array![1.0].view(), array![0.1, 0.2].view()).unwrap_err();
    assert_eq!(
      err,
      PortfolioError::DimensionMismatch {
        expected: 2,
        actual: 1
      }
    );
  }
}
