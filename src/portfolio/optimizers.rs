//! # Portfolio Optimizers
//!
//! $$
//! \mathbf w^\*=\arg\min_{\mathbf w}\ f(\mathbf w)\quad\text{s.t.}\quad \mathbf 1^\top\mathbf w=1,\ 0\le w_i\le 1
//! $$
//!
//! Long-only maximum-Sharpe and minimum-volatility allocations.

use ndarray::Array1;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use super::objective::NegativeSharpe;
use super::objective::Objective;
use super::objective::ObjectiveProblem;
use super::objective::Volatility;
use super::objective::FD_STEP;
use super::performance::portfolio_stats;
use super::slsqp::Slsqp;
use super::slsqp::SolverOutcome;
use super::types::ensure_aligned;
use super::types::is_feasible;
use super::types::CovarianceMatrix;
use super::types::InitialGuess;
use super::types::PortfolioResult;
use super::types::ReturnVector;
use super::types::WeightVector;
use super::types::SIMPLEX_TOLERANCE;
use crate::error::PortfolioError;
use crate::error::Result;

/// Solver settings shared by both optimizers.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
  /// Outer SQP iteration cap.
  pub max_iters: usize,
  /// Relative objective change treated as converged.
  pub ftol: f64,
  /// Step size treated as converged.
  pub xtol: f64,
  /// Starting point of the search.
  pub initial_guess: InitialGuess,
  /// Seed of the generator behind [`InitialGuess::Random`].
  pub seed: u64,
  /// Relative forward-difference step of the numerical gradient.
  pub fd_step: f64,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      max_iters: 100,
      ftol: 1e-10,
      xtol: 1e-10,
      initial_guess: InitialGuess::Uniform,
      seed: 42,
      fd_step: FD_STEP,
    }
  }
}

impl OptimizerConfig {
  fn solver(&self) -> Slsqp {
    Slsqp::new(self.max_iters, self.ftol, self.xtol)
  }
}

/// Uniform `1/n` weights.
pub fn uniform_weights(n: usize) -> Array1<f64> {
  Array1::from_elem(n, 1.0 / n as f64)
}

/// i.i.d. `U(0, 1)` draws normalized to sum to one.
pub fn random_weights(n: usize, rng: &mut StdRng) -> Array1<f64> {
  let raw = Array1::random_using(n, Uniform::new(0.0, 1.0), rng);
  let total = raw.sum();
  if total > 0.0 {
    raw / total
  } else {
    uniform_weights(n)
  }
}

/// Starting point for `n` assets. The random variant draws from a generator
/// seeded with `config.seed`, so equal configs give equal starting points.
pub fn initial_weights(n: usize, config: &OptimizerConfig) -> Array1<f64> {
  match config.initial_guess {
    InitialGuess::Uniform => uniform_weights(n),
    InitialGuess::Random => {
      let mut rng = StdRng::seed_from_u64(config.seed);
      random_weights(n, &mut rng)
    }
  }
}

/// Clip round-off outside `[0, 1]`, renormalize, and verify the simplex constraint.
fn clean_weights(raw: &[f64], iterations: usize) -> Result<Array1<f64>> {
  let clipped = Array1::from_iter(raw.iter().map(|&w| w.clamp(0.0, 1.0)));
  let total = clipped.sum();
  if !total.is_finite() || total <= 0.0 {
    return Err(PortfolioError::failed(
      iterations,
      "solver returned a degenerate weight vector",
    ));
  }

  let w = clipped / total;
  let drift = raw
    .iter()
    .zip(w.iter())
    .fold(0.0_f64, |acc, (r, c)| acc.max((r - c).abs()));
  if drift > SIMPLEX_TOLERANCE || !is_feasible(w.view(), SIMPLEX_TOLERANCE) {
    return Err(PortfolioError::failed(
      iterations,
      format!("solver output violates the simplex constraint by {drift:e}"),
    ));
  }

  Ok(w)
}

/// Minimize any [`Objective`] over the long-only simplex.
///
/// A single asset is trivially `[1.0]`; the solver is not run and an undefined
/// objective value is reported as `NaN`.
pub fn optimize_objective<O: Objective>(
  objective: &O,
  config: &OptimizerConfig,
) -> Result<SolverOutcome> {
  let n = objective.dim();
  if n == 0 {
    return Err(PortfolioError::DimensionMismatch {
      expected: 1,
      actual: 0,
    });
  }
  if n == 1 {
    let cost = objective
      .evaluate(Array1::from_elem(1, 1.0).view())
      .unwrap_or(f64::NAN);
    return Ok(SolverOutcome {
      param: vec![1.0],
      cost,
      iterations: 0,
    });
  }

  let x0 = initial_weights(n, config);
  let problem = ObjectiveProblem::new(objective).with_step(config.fd_step);
  let outcome = config.solver().minimize(&problem, &x0.to_vec())?;
  let weights = clean_weights(&outcome.param, outcome.iterations)?;
  debug!(
    objective = objective.name(),
    assets = n,
    iterations = outcome.iterations,
    cost = outcome.cost,
    "optimized"
  );

  Ok(SolverOutcome {
    param: weights.to_vec(),
    ..outcome
  })
}

fn into_result(
  outcome: SolverOutcome,
  mean: &ReturnVector,
  cov: &CovarianceMatrix,
  risk_free: f64,
) -> Result<PortfolioResult> {
  let weights = WeightVector::new(mean.assets().to_vec(), Array1::from_vec(outcome.param))?;
  let stats = portfolio_stats(weights.values(), mean.values(), cov.values(), risk_free)?;

  Ok(PortfolioResult {
    weights,
    stats,
    objective: outcome.cost,
    iterations: outcome.iterations,
  })
}

/// Long-only weights maximizing `(wᵀμ - r_f) / sqrt(wᵀΣw)`.
pub fn optimize_max_sharpe(
  mean: &ReturnVector,
  cov: &CovarianceMatrix,
  risk_free: f64,
  config: &OptimizerConfig,
) -> Result<PortfolioResult> {
  let objective = NegativeSharpe::from_moments(mean, cov, risk_free)?;
  let outcome = optimize_objective(&objective, config)?;
  into_result(outcome, mean, cov, risk_free)
}

/// Long-only weights minimizing `sqrt(wᵀΣw)`.
///
/// `risk_free` only enters the reported Sharpe ratio.
pub fn optimize_min_volatility(
  mean: &ReturnVector,
  cov: &CovarianceMatrix,
  risk_free: f64,
  config: &OptimizerConfig,
) -> Result<PortfolioResult> {
  ensure_aligned(mean, cov)?;
  let objective = Volatility::from_moments(cov);
  let outcome = optimize_objective(&objective, config)?;
  into_result(outcome, mean, cov, risk_free)
}
