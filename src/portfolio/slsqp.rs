//! # Sequential Quadratic Programming on the Simplex
//!
//! $$
//! \min_{\mathbf d}\ \mathbf g_k^\top\mathbf d+\tfrac12\mathbf d^\top B_k\mathbf d
//! \quad\text{s.t.}\quad \mathbf 1^\top(\mathbf x_k+\mathbf d)=1,\ \ \mathbf x_k+\mathbf d\ge 0
//! $$
//!
//! SLSQP-style minimizer for `min f(x)` subject to `sum(x) = 1` and `0 <= x_i <= 1`.
//! Upper bounds are implied by the other two constraints, so the QP subproblem
//! only carries the equality and the lower bounds.
//!
//! Each outer iteration takes a finite-difference gradient through argmin's
//! [`Gradient`] trait, solves the QP with a primal active-set method, runs an
//! Armijo backtracking line search and refreshes a damped BFGS Hessian model.
//! Iterates never leave the feasible set, so the objective itself is the merit
//! function.

use argmin::core::CostFunction;
use argmin::core::Gradient;
use nalgebra::DMatrix;
use nalgebra::DVector;
use tracing::debug;
use tracing::trace;

use crate::error::PortfolioError;
use crate::error::Result;

const ARMIJO_C1: f64 = 1e-4;
const MIN_STEP: f64 = 1e-10;
const DAMPING: f64 = 0.2;
const QP_ZERO_STEP: f64 = 1e-13;
const QP_MULTIPLIER_TOL: f64 = 1e-12;

/// Outcome of a converged run.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverOutcome {
  /// Feasible minimizer.
  pub param: Vec<f64>,
  /// Objective value at `param`.
  pub cost: f64,
  /// Outer iterations performed.
  pub iterations: usize,
}

/// Constrained minimizer over the probability simplex.
#[derive(Clone, Copy, Debug)]
pub struct Slsqp {
  max_iters: usize,
  ftol: f64,
  xtol: f64,
}

impl Default for Slsqp {
  fn default() -> Self {
    Self {
      max_iters: 100,
      ftol: 1e-10,
      xtol: 1e-10,
    }
  }
}

impl Slsqp {
  pub fn new(max_iters: usize, ftol: f64, xtol: f64) -> Self {
    Self {
      max_iters,
      ftol,
      xtol,
    }
  }

  /// Minimize `problem` starting from `x0`, which is first projected onto the simplex.
  pub fn minimize<P>(&self, problem: &P, x0: &[f64]) -> Result<SolverOutcome>
  where
    P: CostFunction<Param = Vec<f64>, Output = f64>
      + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
  {
    let n = x0.len();
    if n == 0 {
      return Err(PortfolioError::DimensionMismatch {
        expected: 1,
        actual: 0,
      });
    }

    let mut x = DVector::from_vec(project_onto_simplex(x0));
    let mut f = cost(problem, &x, 0)?;
    if !f.is_finite() {
      return Err(PortfolioError::failed(0, "objective is not finite at the initial point"));
    }
    let mut g = gradient(problem, &x, 0)?;

    let mut hessian = DMatrix::<f64>::identity(n, n);
    let mut fresh_hessian = true;

    for iter in 1..=self.max_iters {
      let d = match solve_qp(&hessian, &g, &x) {
        Some(d) => d,
        None if !fresh_hessian => {
          hessian = DMatrix::identity(n, n);
          fresh_hessian = true;
          continue;
        }
        None => return Err(PortfolioError::failed(iter, "QP subproblem failed")),
      };

      let step_norm = d.amax();
      if step_norm <= self.xtol {
        return Ok(self.finish(x, f, iter));
      }

      let slope = g.dot(&d);
      if slope >= 0.0 {
        if step_norm <= self.xtol.sqrt() {
          return Ok(self.finish(x, f, iter));
        }
        if !fresh_hessian {
          hessian = DMatrix::identity(n, n);
          fresh_hessian = true;
          continue;
        }
        return Err(PortfolioError::failed(
          iter,
          format!("QP direction is not a descent direction (slope {slope:e})"),
        ));
      }

      let Some((alpha, f_new)) = line_search(problem, &x, &d, f, slope) else {
        if slope.abs() <= self.ftol * f.abs().max(1.0) {
          return Ok(self.finish(x, f, iter));
        }
        if !fresh_hessian {
          hessian = DMatrix::identity(n, n);
          fresh_hessian = true;
          continue;
        }
        return Err(PortfolioError::failed(
          iter,
          format!("line search could not decrease the objective (slope {slope:e})"),
        ));
      };

      let s = &d * alpha;
      let x_new = &x + &s;
      let g_new = gradient(problem, &x_new, iter)?;

      if damped_bfgs_update(&mut hessian, &s, &(&g_new - &g)) {
        fresh_hessian = false;
      } else {
        hessian = DMatrix::identity(n, n);
        fresh_hessian = true;
      }

      let f_change = (f - f_new).abs();
      trace!(iter, f = f_new, alpha, step = s.amax(), "slsqp iteration");

      x = x_new;
      g = g_new;
      let prev_f = f;
      f = f_new;

      if f_change <= self.ftol * prev_f.abs().max(1.0) && s.amax() <= self.xtol.sqrt() {
        return Ok(self.finish(x, f, iter));
      }
    }

    Err(PortfolioError::failed(
      self.max_iters,
      "iteration limit reached",
    ))
  }

  fn finish(&self, x: DVector<f64>, cost: f64, iterations: usize) -> SolverOutcome {
    debug!(iterations, cost, "slsqp converged");
    SolverOutcome {
      param: x.iter().copied().collect(),
      cost,
      iterations,
    }
  }
}

fn cost<P>(problem: &P, x: &DVector<f64>, iter: usize) -> Result<f64>
where
  P: CostFunction<Param = Vec<f64>, Output = f64>,
{
  problem
    .cost(&x.as_slice().to_vec())
    .map_err(|e| PortfolioError::from_argmin(e, iter))
}

fn gradient<P>(problem: &P, x: &DVector<f64>, iter: usize) -> Result<DVector<f64>>
where
  P: Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
{
  let grad = problem
    .gradient(&x.as_slice().to_vec())
    .map_err(|e| PortfolioError::from_argmin(e, iter))?;
  if grad.iter().any(|v| !v.is_finite()) {
    return Err(PortfolioError::failed(iter, "gradient is not finite"));
  }
  Ok(DVector::from_vec(grad))
}

/// Armijo backtracking. Trial points whose objective fails or is not finite are rejected.
fn line_search<P>(
  problem: &P,
  x: &DVector<f64>,
  d: &DVector<f64>,
  f: f64,
  slope: f64,
) -> Option<(f64, f64)>
where
  P: CostFunction<Param = Vec<f64>, Output = f64>,
{
  let mut alpha = 1.0;
  while alpha >= MIN_STEP {
    let trial = x + d * alpha;
    if let Ok(f_trial) = cost(problem, &trial, 0) {
      if f_trial.is_finite() && f_trial <= f + ARMIJO_C1 * alpha * slope {
        return Some((alpha, f_trial));
      }
    }
    alpha *= 0.5;
  }
  None
}

/// Powell-damped BFGS update. Returns `false` when the update broke down.
fn damped_bfgs_update(b: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>) -> bool {
  let bs = &*b * s;
  let sbs = s.dot(&bs);
  if sbs <= f64::EPSILON * s.norm_squared() {
    return false;
  }

  let sy = s.dot(y);
  let y = if sy < DAMPING * sbs {
    let theta = (1.0 - DAMPING) * sbs / (sbs - sy);
    y * theta + &bs * (1.0 - theta)
  } else {
    y.clone()
  };
  let sy = s.dot(&y);
  if sy <= 0.0 {
    return false;
  }

  *b -= &bs * bs.transpose() / sbs;
  *b += &y * y.transpose() / sy;

  b.iter().all(|v| v.is_finite())
}

/// Solve `min gᵀd + ½dᵀBd` s.t. `1ᵀ(x+d) = 1`, `x+d >= 0` for a feasible `x`.
///
/// Works in `y = x + d` with a primal active-set method: the working set holds
/// coordinates pinned at zero, the free block is solved through its KKT system.
fn solve_qp(b: &DMatrix<f64>, g: &DVector<f64>, x: &DVector<f64>) -> Option<DVector<f64>> {
  let n = x.len();
  let q = g - b * x;
  let mut y = x.clone();
  let mut active: Vec<bool> = y.iter().map(|&v| v <= 0.0).collect();
  for (i, a) in active.iter().enumerate() {
    if *a {
      y[i] = 0.0;
    }
  }
  if active.iter().all(|&a| a) {
    return None;
  }

  for _ in 0..(10 * n + 50) {
    let free: Vec<usize> = (0..n).filter(|&i| !active[i]).collect();
    let k = free.len();
    let grad = b * &y + &q;

    let mut kkt = DMatrix::<f64>::zeros(k + 1, k + 1);
    let mut rhs = DVector::<f64>::zeros(k + 1);
    for (a, &i) in free.iter().enumerate() {
      for (c, &j) in free.iter().enumerate() {
        kkt[(a, c)] = b[(i, j)];
      }
      kkt[(a, k)] = 1.0;
      kkt[(k, a)] = 1.0;
      rhs[a] = -grad[i];
    }

    let sol = kkt.lu().solve(&rhs)?;
    let lambda = sol[k];
    let p_norm = (0..k).fold(0.0_f64, |acc, a| acc.max(sol[a].abs()));

    if p_norm <= QP_ZERO_STEP {
      // Multipliers of the pinned coordinates: mu_i = grad_i + lambda.
      let release = (0..n)
        .filter(|&i| active[i])
        .map(|i| (i, grad[i] + lambda))
        .filter(|&(_, mu)| mu < -QP_MULTIPLIER_TOL)
        .min_by(|a, b| a.1.total_cmp(&b.1));

      match release {
        Some((i, _)) => active[i] = false,
        None => return Some(y - x),
      }
      continue;
    }

    let mut alpha = 1.0;
    let mut blocking = None;
    for (a, &i) in free.iter().enumerate() {
      if sol[a] < -QP_ZERO_STEP {
        let ratio = -y[i].max(0.0) / sol[a];
        if ratio < alpha {
          alpha = ratio;
          blocking = Some(i);
        }
      }
    }

    for (a, &i) in free.iter().enumerate() {
      y[i] += alpha * sol[a];
    }
    if let Some(i) = blocking {
      y[i] = 0.0;
      active[i] = true;
    }
  }

  None
}

/// Euclidean projection onto `{x : x >= 0, sum(x) = 1}`.
pub fn project_onto_simplex(v: &[f64]) -> Vec<f64> {
  let n = v.len();
  if n == 0 {
    return Vec::new();
  }

  let mut sorted: Vec<f64> = v.to_vec();
  sorted.sort_by(|a, b| b.total_cmp(a));

  let mut cumsum = 0.0;
  let mut theta = 0.0;
  for (i, &u) in sorted.iter().enumerate() {
    cumsum += u;
    let t = (cumsum - 1.0) / (i + 1) as f64;
    if u - t > 0.0 {
      theta = t;
    }
  }

  v.iter().map(|&vi| (vi - theta).max(0.0)).collect()
}
