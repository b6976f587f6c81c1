//! # Errors
//!
//! Error taxonomy shared by the estimator, the objectives and the optimizer.

use thiserror::Error;

/// Portfolio estimation and optimization errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
  #[error("insufficient data: need at least {required} price rows, got {actual}")]
  InsufficientData { required: usize, actual: usize },

  #[error("degenerate variance {variance:e}: covariance matrix is not positive semi-definite")]
  DegenerateVariance { variance: f64 },

  #[error("division by zero: portfolio volatility is exactly zero")]
  DivisionByZero,

  #[error("optimization failed after {iterations} iterations: {reason}")]
  OptimizationFailed { iterations: usize, reason: String },

  #[error("dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  #[error("invalid price table: {0}")]
  InvalidPriceTable(String),

  #[error("invalid covariance matrix: {0}")]
  InvalidCovariance(String),

  #[error("invalid expected returns: {0}")]
  InvalidReturns(String),

  #[error("asset ordering of the return vector does not match the covariance matrix")]
  AssetMismatch,
}

pub type Result<T> = std::result::Result<T, PortfolioError>;

impl PortfolioError {
  pub(crate) fn failed(iterations: usize, reason: impl Into<String>) -> Self {
    Self::OptimizationFailed {
      iterations,
      reason: reason.into(),
    }
  }

  /// Recover a [`PortfolioError`] from an argmin error raised inside a cost function.
  pub(crate) fn from_argmin(err: argmin::core::Error, iterations: usize) -> Self {
    match err.downcast::<PortfolioError>() {
      Ok(err) => err,
      Err(other) => Self::failed(iterations, other.to_string()),
    }
  }
}
