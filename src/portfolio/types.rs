//! # Portfolio Types
//!
//! $$
//! \mu\in\mathbb R^n,\quad \Sigma=\Sigma^\top\succeq 0,\quad \mathbf w\in\Delta^{n-1}
//! $$
//!
//! Moment containers, weight vectors and result types shared by the estimator,
//! the optimizers and the engine.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;

use crate::error::PortfolioError;
use crate::error::Result;

/// Absolute tolerance on `sum(w) == 1` for a feasible weight vector.
pub const SIMPLEX_TOLERANCE: f64 = 1e-6;

/// Relative tolerance used when checking covariance symmetry.
const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// How per-period returns are derived from consecutive prices.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReturnKind {
  /// `p_t / p_{t-1} - 1`
  #[default]
  Simple,
  /// `ln(p_t / p_{t-1})`
  Log,
}

/// Starting point of the constrained solver.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum InitialGuess {
  /// `1/n` in every component.
  #[default]
  Uniform,
  /// i.i.d. `U(0, 1)` draws normalized onto the simplex, seeded from the optimizer config.
  Random,
}

impl InitialGuess {
  /// Parse a string into an [`InitialGuess`].
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "random" | "rand" => Self::Random,
      _ => Self::Uniform,
    }
  }
}

/// Annualized expected return per asset.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnVector {
  assets: Vec<String>,
  values: Array1<f64>,
}

impl ReturnVector {
  /// Build a return vector, checking that every asset has exactly one finite value.
  pub fn new(assets: Vec<String>, values: Array1<f64>) -> Result<Self> {
    if assets.len() != values.len() {
      return Err(PortfolioError::DimensionMismatch {
        expected: assets.len(),
        actual: values.len(),
      });
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
      return Err(PortfolioError::InvalidReturns(format!(
        "expected return of '{}' is {}",
        assets[i], values[i]
      )));
    }

    Ok(Self { assets, values })
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn values(&self) -> ArrayView1<'_, f64> {
    self.values.view()
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Expected return of a single asset, if present.
  pub fn get(&self, asset: &str) -> Option<f64> {
    self
      .assets
      .iter()
      .position(|a| a == asset)
      .map(|i| self.values[i])
  }
}

/// Annualized covariance of asset returns.
#[derive(Clone, Debug, PartialEq)]
pub struct CovarianceMatrix {
  assets: Vec<String>,
  values: Array2<f64>,
}

impl CovarianceMatrix {
  /// Build a covariance matrix.
  ///
  /// The matrix must be square, sized to the asset list, finite, symmetric up to
  /// round-off and have a non-negative diagonal. Round-off asymmetry is removed by
  /// averaging with the transpose.
  pub fn new(assets: Vec<String>, values: Array2<f64>) -> Result<Self> {
    let n = assets.len();
    let (rows, cols) = values.dim();
    if rows != n || cols != n {
      return Err(PortfolioError::DimensionMismatch {
        expected: n,
        actual: if rows != n { rows } else { cols },
      });
    }
    if values.iter().any(|v| !v.is_finite()) {
      return Err(PortfolioError::InvalidCovariance(
        "matrix contains non-finite values".to_string(),
      ));
    }

    let scale = values.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
    for i in 0..n {
      if values[[i, i]] < 0.0 {
        return Err(PortfolioError::InvalidCovariance(format!(
          "negative variance {} on the diagonal of '{}'",
          values[[i, i]],
          assets[i]
        )));
      }
      for j in (i + 1)..n {
        if (values[[i, j]] - values[[j, i]]).abs() > SYMMETRY_TOLERANCE * scale {
          return Err(PortfolioError::InvalidCovariance(format!(
            "asymmetric entries for ('{}', '{}')",
            assets[i], assets[j]
          )));
        }
      }
    }

    let values = (&values + &values.t()) * 0.5;
    Ok(Self { assets, values })
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn values(&self) -> ArrayView2<'_, f64> {
    self.values.view()
  }

  pub fn dim(&self) -> usize {
    self.assets.len()
  }

  /// Per-asset volatility, `sqrt(diag(Σ))`.
  pub fn volatilities(&self) -> Array1<f64> {
    self.values.diag().mapv(f64::sqrt)
  }
}

/// Check that mean returns and covariance describe the same assets in the same order.
pub(crate) fn ensure_aligned(mean: &ReturnVector, cov: &CovarianceMatrix) -> Result<()> {
  if mean.len() != cov.dim() {
    return Err(PortfolioError::DimensionMismatch {
      expected: cov.dim(),
      actual: mean.len(),
    });
  }
  if mean.assets() != cov.assets() {
    return Err(PortfolioError::AssetMismatch);
  }
  Ok(())
}

/// Long-only, fully invested allocation.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightVector {
  assets: Vec<String>,
  values: Array1<f64>,
}

impl WeightVector {
  /// Wrap solver output. Fails unless every weight lies in `[0, 1]` and the
  /// weights sum to one within [`SIMPLEX_TOLERANCE`].
  pub fn new(assets: Vec<String>, values: Array1<f64>) -> Result<Self> {
    if assets.len() != values.len() {
      return Err(PortfolioError::DimensionMismatch {
        expected: assets.len(),
        actual: values.len(),
      });
    }
    if !is_feasible(values.view(), SIMPLEX_TOLERANCE) {
      return Err(PortfolioError::failed(
        0,
        format!("weights {values} violate the simplex constraint"),
      ));
    }

    Ok(Self { assets, values })
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn values(&self) -> ArrayView1<'_, f64> {
    self.values.view()
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Weight of a single asset, if present.
  pub fn get(&self, asset: &str) -> Option<f64> {
    self
      .assets
      .iter()
      .position(|a| a == asset)
      .map(|i| self.values[i])
  }

  /// `(asset, weight)` pairs in asset order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
    self
      .assets
      .iter()
      .map(String::as_str)
      .zip(self.values.iter().copied())
  }

  pub fn into_inner(self) -> Array1<f64> {
    self.values
  }
}

/// `true` when every weight is in `[0, 1]` and the weights sum to one within `tol`.
pub fn is_feasible(weights: ArrayView1<f64>, tol: f64) -> bool {
  !weights.is_empty()
    && weights.iter().all(|&w| (0.0..=1.0).contains(&w))
    && (weights.sum() - 1.0).abs() <= tol
}

/// Model return, volatility and Sharpe ratio of a weight vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PortfolioStats {
  /// Expected portfolio return (annualized if inputs are annualized).
  pub expected_return: f64,
  /// Portfolio volatility, `sqrt(wᵀΣw)`.
  pub volatility: f64,
  /// `(expected_return - risk_free) / volatility`, `None` for a riskless portfolio.
  pub sharpe: Option<f64>,
}

/// Output of a single optimization run.
#[derive(Clone, Debug, PartialEq)]
pub struct PortfolioResult {
  /// Optimized weights.
  pub weights: WeightVector,
  /// Performance of the optimized weights.
  pub stats: PortfolioStats,
  /// Objective value at the optimum. `NaN` when the objective is undefined there,
  /// e.g. the Sharpe ratio of a single riskless asset.
  pub objective: f64,
  /// Solver iterations used (zero for the single-asset shortcut).
  pub iterations: usize,
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::*;

  fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("A{i}")).collect()
  }

  #[test]
  fn covariance_rejects_negative_diagonal() {
    let err = CovarianceMatrix::new(names(2), array![[-0.01, 0.0], [0.0, 0.04]]).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidCovariance(_)));
  }

  #[test]
  fn covariance_rejects_asymmetry() {
    let err = CovarianceMatrix::new(names(2), array![[0.04, 0.01], [0.02, 0.09]]).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidCovariance(_)));
  }

  #[test]
  fn covariance_rejects_wrong_shape() {
    let err = CovarianceMatrix::new(names(3), array![[0.04, 0.0], [0.0, 0.09]]).unwrap_err();
    assert_eq!(
      err,
      PortfolioError::DimensionMismatch {
        expected: 3,
        actual: 2
      }
    );
  }

  #[test]
  fn weight_vector_enforces_simplex() {
    assert!(WeightVector::new(names(2), array![0.4, 0.6]).is_ok());
    assert!(WeightVector::new(names(2), array![0.5, 0.6]).is_err());
    assert!(WeightVector::new(names(2), array![-0.1, 1.1]).is_err());
  }

  #[test]
  fn weight_lookup_by_asset() {
    let w = WeightVector::new(names(2), array![0.25, 0.75]).unwrap();
    assert_eq!(w.get("A1"), Some(0.75));
    assert_eq!(w.get("ZZZ"), None);
    assert_eq!(w.iter().count(), 2);
  }

  #[test]
  fn return_vector_rejects_nan() {
    let err = ReturnVector::new(names(2), array![0.1, f64::NAN]).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidReturns(_)));
  }

  #[test]
  fn initial_guess_parsing() {
    assert_eq!(InitialGuess::from_str("Random"), InitialGuess::Random);
    assert_eq!(InitialGuess::from_str("uniform"), InitialGuess::Uniform);
    assert_eq!(InitialGuess::from_str("whatever"), InitialGuess::Uniform);
  }
}
