//! # Portfolio Engine
//!
//! $$
//! (\hat\mu,\hat\Sigma)=\operatorname{Estimate}(P),\qquad
//! \mathbf w_{\mathrm{SR}},\ \mathbf w_{\sigma}=\operatorname{Optimize}(\hat\mu,\hat\Sigma)
//! $$
//!
//! High-level orchestration: estimate moments once, then run the max-Sharpe and
//! min-volatility optimizers on them.

use tracing::debug;

use super::data::estimate_with;
use super::data::PriceTable;
use super::data::TRADING_DAYS;
use super::estimators::HistoricalMeanEstimator;
use super::estimators::ReturnEstimator;
use super::optimizers::optimize_max_sharpe;
use super::optimizers::optimize_min_volatility;
use super::optimizers::OptimizerConfig;
use super::performance::DEFAULT_RISK_FREE;
use super::types::ensure_aligned;
use super::types::CovarianceMatrix;
use super::types::PortfolioResult;
use super::types::ReturnKind;
use super::types::ReturnVector;
use crate::error::Result;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct PortfolioEngineConfig {
  /// Periods per year used to annualize moments.
  pub annualization_factor: f64,
  /// Annualized risk-free rate used by the Sharpe objective and reports.
  pub risk_free: f64,
  /// Simple or log returns.
  pub return_kind: ReturnKind,
  /// Solver settings, including the seed for random starting points.
  pub optimizer: OptimizerConfig,
  /// Run the two optimizations concurrently.
  pub parallel: bool,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      annualization_factor: TRADING_DAYS,
      risk_free: DEFAULT_RISK_FREE,
      return_kind: ReturnKind::Simple,
      optimizer: OptimizerConfig::default(),
      parallel: false,
    }
  }
}

/// Both allocations computed from one set of moments.
#[derive(Clone, Debug)]
pub struct AllocationReport {
  /// Expected returns fed to the optimizers.
  pub mean_returns: ReturnVector,
  /// Annualized covariance fed to the optimizers.
  pub covariance: CovarianceMatrix,
  /// Risk-free rate used for Sharpe ratios.
  pub risk_free: f64,
  /// Maximum Sharpe ratio allocation.
  pub max_sharpe: PortfolioResult,
  /// Minimum volatility allocation.
  pub min_volatility: PortfolioResult,
}

/// Single entry point for the estimate-then-optimize workflow.
#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// Estimate historical moments from `prices` and optimize both allocations.
  pub fn run(&self, prices: &PriceTable) -> Result<AllocationReport> {
    let estimator =
      HistoricalMeanEstimator::new(self.config.annualization_factor, self.config.return_kind);
    self.run_with_estimator(prices, &estimator)
  }

  /// Like [`PortfolioEngine::run`], with expected returns taken from `estimator`.
  /// The covariance is always the historical one.
  pub fn run_with_estimator<E: ReturnEstimator>(
    &self,
    prices: &PriceTable,
    estimator: &E,
  ) -> Result<AllocationReport> {
    let (_, covariance) = estimate_with(
      prices,
      self.config.annualization_factor,
      self.config.return_kind,
    )?;
    let mean_returns = estimator.expected_returns(prices)?;
    debug!(
      assets = prices.assets().len(),
      rows = prices.len(),
      "estimated annualized moments"
    );

    self.optimize(mean_returns, covariance)
  }

  /// Optimize both allocations on precomputed moments.
  pub fn optimize(
    &self,
    mean_returns: ReturnVector,
    covariance: CovarianceMatrix,
  ) -> Result<AllocationReport> {
    ensure_aligned(&mean_returns, &covariance)?;
    let risk_free = self.config.risk_free;
    let optimizer = &self.config.optimizer;

    let sharpe = || optimize_max_sharpe(&mean_returns, &covariance, risk_free, optimizer);
    let volatility = || optimize_min_volatility(&mean_returns, &covariance, risk_free, optimizer);

    let (max_sharpe, min_volatility) = if self.config.parallel {
      rayon::join(sharpe, volatility)
    } else {
      (sharpe(), volatility())
    };
    let max_sharpe = max_sharpe?;
    let min_volatility = min_volatility?;

    debug!(
      sharpe = ?max_sharpe.stats.sharpe,
      iterations = max_sharpe.iterations,
      "max-sharpe allocation"
    );
    debug!(
      volatility = min_volatility.stats.volatility,
      iterations = min_volatility.iterations,
      "min-volatility allocation"
    );

    Ok(AllocationReport {
      mean_returns,
      covariance,
      risk_free,
      max_sharpe,
      min_volatility,
    })
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use tracing_test::traced_test;

  use super::*;
  use crate::error::PortfolioError;
  use crate::portfolio::data::tests::daily_dates;
  use crate::portfolio::data::tests::synthetic_prices;
  use crate::portfolio::data::tests::tickers;
  use crate::portfolio::estimators::ForecastEstimator;
  use crate::portfolio::types::InitialGuess;

  fn sample_table() -> PriceTable {
    synthetic_prices(
      750,
      &[0.0006, 0.0003, 0.0009, 0.0002],
      &[0.012, 0.008, 0.02, 0.01],
      2024,
    )
  }

  #[test]
  fn run_produces_two_feasible_allocations() {
    let engine = PortfolioEngine::default();
    let report = engine.run(&sample_table()).unwrap();

    for res in [&report.max_sharpe, &report.min_volatility] {
      assert_abs_diff_eq!(res.weights.values().sum(), 1.0, epsilon = 1e-6);
      assert!(res.weights.values().iter().all(|&w| (0.0..=1.0).contains(&w)));
      assert_eq!(res.weights.assets(), report.mean_returns.assets());
    }
    assert!(
      report.max_sharpe.stats.sharpe.unwrap() >= report.min_volatility.stats.sharpe.unwrap() - 1e-9
    );
    assert!(report.min_volatility.stats.volatility <= report.max_sharpe.stats.volatility + 1e-9);
  }

  #[test]
  fn seeded_runs_are_bit_identical() {
    let config = PortfolioEngineConfig {
      optimizer: OptimizerConfig {
        initial_guess: InitialGuess::Random,
        seed: 42,
        ..OptimizerConfig::default()
      },
      ..PortfolioEngineConfig::default()
    };
    let table = sample_table();

    let a = PortfolioEngine::new(config.clone()).run(&table).unwrap();
    let b = PortfolioEngine::new(config).run(&table).unwrap();

    assert_eq!(a.max_sharpe, b.max_sharpe);
    assert_eq!(a.min_volatility, b.min_volatility);
  }

  #[test]
  fn parallel_matches_sequential() {
    let table = sample_table();
    let seq = PortfolioEngine::default().run(&table).unwrap();
    let par = PortfolioEngine::new(PortfolioEngineConfig {
      parallel: true,
      ..PortfolioEngineConfig::default()
    })
    .run(&table)
    .unwrap();

    assert_eq!(seq.max_sharpe, par.max_sharpe);
    assert_eq!(seq.min_volatility, par.min_volatility);
  }

  #[test]
  fn forecast_estimator_drives_sharpe_allocation() {
    let table = sample_table();
    let forecast = ReturnVector::new(tickers(4), array![0.02, 0.02, 0.02, 0.40]).unwrap();
    let report = PortfolioEngine::default()
      .run_with_estimator(&table, &ForecastEstimator::new(forecast.clone()))
      .unwrap();

    assert_eq!(report.mean_returns, forecast);
    let w = report.max_sharpe.weights.values();
    assert!(w[3] > w[0] && w[3] > w[1] && w[3] > w[2]);
  }

  #[test]
  fn single_row_table_fails() {
    let table = PriceTable::new(daily_dates(1), tickers(3), array![[1.0, 2.0, 3.0]]).unwrap();
    let err = PortfolioEngine::default().run(&table).unwrap_err();
    assert!(matches!(err, PortfolioError::InsufficientData { actual: 1, .. }));
  }

  #[traced_test]
  #[test]
  fn run_logs_both_allocations() {
    PortfolioEngine::default().run(&sample_table()).unwrap();
    assert!(logs_contain("estimated annualized moments"));
    assert!(logs_contain("max-sharpe allocation"));
    assert!(logs_contain("min-volatility allocation"));
  }
}
