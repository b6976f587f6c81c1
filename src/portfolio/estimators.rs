//! # Expected Return Estimators
//!
//! $$
//! \hat\mu = k\,\frac1T\sum_{t=1}^T r_t \quad\text{or}\quad \hat\mu=\mu^{\mathrm{forecast}}
//! $$
//!
//! Pluggable sources of the expected-return vector. The optimizers only see a
//! [`ReturnVector`], so historical means and external forecasts are interchangeable.

use impl_new_derive::ImplNew;

use super::data::annualized_mean;
use super::data::period_returns;
use super::data::PriceTable;
use super::data::TRADING_DAYS;
use super::types::ReturnKind;
use super::types::ReturnVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// Source of annualized expected returns for the assets of a price table.
pub trait ReturnEstimator {
  /// Expected returns in the column order of `prices`.
  fn expected_returns(&self, prices: &PriceTable) -> Result<ReturnVector>;
}

/// Annualized historical mean of per-period returns.
#[derive(ImplNew, Clone, Copy, Debug)]
pub struct HistoricalMeanEstimator {
  /// Periods per year.
  pub annualization_factor: f64,
  /// Simple or log returns.
  pub return_kind: ReturnKind,
}

impl Default for HistoricalMeanEstimator {
  fn default() -> Self {
    Self {
      annualization_factor: TRADING_DAYS,
      return_kind: ReturnKind::Simple,
    }
  }
}

impl ReturnEstimator for HistoricalMeanEstimator {
  fn expected_returns(&self, prices: &PriceTable) -> Result<ReturnVector> {
    let returns = period_returns(prices, self.return_kind)?;
    let mean = annualized_mean(returns.view(), self.annualization_factor)?;
    ReturnVector::new(prices.assets().to_vec(), mean)
  }
}

/// Externally supplied forecast, e.g. from a regression model.
#[derive(ImplNew, Clone, Debug)]
pub struct ForecastEstimator {
  /// Forecast expected returns; must follow the price table's asset order.
  pub forecast: ReturnVector,
}

impl ReturnEstimator for ForecastEstimator {
  fn expected_returns(&self, prices: &PriceTable) -> Result<ReturnVector> {
    if self.forecast.assets() != prices.assets() {
      return Err(PortfolioError::AssetMismatch);
    }
    Ok(self.forecast.clone())
  }
}
