//! # Portfolio Objectives
//!
//! $$
//! f_{\mathrm{SR}}(\mathbf w)=-\frac{\mathbf w^\top\mu-r_f}{\sqrt{\mathbf w^\top\Sigma\mathbf w}},\qquad
//! f_{\sigma}(\mathbf w)=\sqrt{\mathbf w^\top\Sigma\mathbf w}
//! $$
//!
//! Scalar objectives over the weight vector and their argmin adapter.

use argmin::core::CostFunction;
use argmin::core::Gradient;
use impl_new_derive::ImplNew;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;

use super::performance::portfolio_stats;
use super::performance::portfolio_volatility;
use super::types::ensure_aligned;
use super::types::CovarianceMatrix;
use super::types::ReturnVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// A scalar function of the weight vector to be minimized.
pub trait Objective {
  /// Short label used in logs and reports.
  fn name(&self) -> &'static str;

  /// Number of assets the objective is defined over.
  fn dim(&self) -> usize;

  /// Objective value at `weights`.
  fn evaluate(&self, weights: ArrayView1<f64>) -> Result<f64>;
}

/// Negative Sharpe ratio. Minimizing it maximizes the Sharpe ratio.
#[derive(ImplNew, Clone, Debug)]
pub struct NegativeSharpe {
  /// Annualized expected returns.
  pub mean_returns: Array1<f64>,
  /// Annualized covariance.
  pub covariance: Array2<f64>,
  /// Annualized risk-free rate.
  pub risk_free: f64,
}

impl NegativeSharpe {
  pub fn from_moments(mean: &ReturnVector, cov: &CovarianceMatrix, risk_free: f64) -> Result<Self> {
    ensure_aligned(mean, cov)?;
    Ok(Self::new(
      mean.values().to_owned(),
      cov.values().to_owned(),
      risk_free,
    ))
  }
}

impl Objective for NegativeSharpe {
  fn name(&self) -> &'static str {
    "max-sharpe"
  }

  fn dim(&self) -> usize {
    self.mean_returns.len()
  }

  fn evaluate(&self, weights: ArrayView1<f64>) -> Result<f64> {
    portfolio_stats(
      weights,
      self.mean_returns.view(),
      self.covariance.view(),
      self.risk_free,
    )?
    .sharpe
    .map(|s| -s)
    .ok_or(PortfolioError::DivisionByZero)
  }
}

/// Portfolio volatility.
#[derive(ImplNew, Clone, Debug)]
pub struct Volatility {
  /// Annualized covariance.
  pub covariance: Array2<f64>,
}

impl Volatility {
  pub fn from_moments(cov: &CovarianceMatrix) -> Self {
    Self::new(cov.values().to_owned())
  }
}

impl Objective for Volatility {
  fn name(&self) -> &'static str {
    "min-volatility"
  }

  fn dim(&self) -> usize {
    self.covariance.nrows()
  }

  fn evaluate(&self, weights: ArrayView1<f64>) -> Result<f64> {
    portfolio_volatility(weights, self.covariance.view())
  }
}

/// Forward-difference step, `sqrt(f64::EPSILON)`.
pub const FD_STEP: f64 = 1.490_116_119_384_765_6e-8;

/// Adapts an [`Objective`] to argmin's cost and gradient traits.
///
/// Gradients are forward finite differences since the objectives carry no
/// analytic derivatives.
pub struct ObjectiveProblem<'a, O: Objective> {
  objective: &'a O,
  step: f64,
}

impl<'a, O: Objective> ObjectiveProblem<'a, O> {
  pub fn new(objective: &'a O) -> Self {
    Self {
      objective,
      step: FD_STEP,
    }
  }

  pub fn with_step(mut self, step: f64) -> Self {
    self.step = step;
    self
  }
}

impl<O: Objective> CostFunction for ObjectiveProblem<'_, O> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    Ok(self.objective.evaluate(ArrayView1::from(x.as_slice()))?)
  }
}

impl<O: Objective> Gradient for ObjectiveProblem<'_, O> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> std::result::Result<Self::Gradient, argmin::core::Error> {
    let f0 = self.cost(x)?;
    let mut grad = vec![0.0; x.len()];
    let mut x_plus = x.clone();

    for i in 0..x.len() {
      let h = self.step * x[i].abs().max(1.0);
      x_plus[i] = x[i] + h;
      grad[i] = (self.cost(&x_plus)? - f0) / h;
      x_plus[i] = x[i];
    }

    Ok(grad)
  }
}
