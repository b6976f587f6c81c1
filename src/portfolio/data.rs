//! # Portfolio Data Utilities
//!
//! $$
//! \hat\mu = k\,\bar r,\qquad \hat\Sigma = \frac{k}{T-1}\sum_{t=1}^{T}(r_t-\bar r)(r_t-\bar r)^\top
//! $$
//!
//! Price table validation and annualized moment estimation.

use chrono::NaiveDate;
use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use super::types::CovarianceMatrix;
use super::types::ReturnKind;
use super::types::ReturnVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// Trading days per year.
pub const TRADING_DAYS: f64 = 252.0;

/// Minimum number of price rows for one return period.
const MIN_PRICE_ROWS: usize = 2;

/// Daily close prices, one column per asset, rows in strictly increasing date order.
#[derive(Clone, Debug)]
pub struct PriceTable {
  dates: Vec<NaiveDate>,
  assets: Vec<String>,
  prices: Array2<f64>,
}

impl PriceTable {
  /// Build a price table from a `dates × assets` matrix.
  pub fn new(dates: Vec<NaiveDate>, assets: Vec<String>, prices: Array2<f64>) -> Result<Self> {
    let (rows, cols) = prices.dim();
    if assets.is_empty() {
      return Err(PortfolioError::InvalidPriceTable(
        "no asset columns".to_string(),
      ));
    }
    if rows != dates.len() {
      return Err(PortfolioError::InvalidPriceTable(format!(
        "{} dates for {rows} price rows",
        dates.len()
      )));
    }
    if cols != assets.len() {
      return Err(PortfolioError::InvalidPriceTable(format!(
        "{} asset names for {cols} price columns",
        assets.len()
      )));
    }

    for (i, a) in assets.iter().enumerate() {
      if assets[..i].contains(a) {
        return Err(PortfolioError::InvalidPriceTable(format!(
          "duplicate asset '{a}'"
        )));
      }
    }

    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
      return Err(PortfolioError::InvalidPriceTable(format!(
        "dates not strictly increasing at {} -> {}",
        w[0], w[1]
      )));
    }

    if let Some(((row, col), p)) = prices
      .indexed_iter()
      .find(|(_, p)| !p.is_finite() || **p <= 0.0)
    {
      return Err(PortfolioError::InvalidPriceTable(format!(
        "price {p} for '{}' on {} is not a positive finite number",
        assets[col], dates[row]
      )));
    }

    Ok(Self {
      dates,
      assets,
      prices,
    })
  }

  /// Build a price table from row-major price vectors.
  pub fn from_rows(dates: Vec<NaiveDate>, assets: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
    let n = assets.len();
    let mut prices = Array2::zeros((rows.len(), n));
    for (i, row) in rows.iter().enumerate() {
      if row.len() != n {
        return Err(PortfolioError::InvalidPriceTable(format!(
          "row {i} has {} prices for {n} assets",
          row.len()
        )));
      }
      prices.row_mut(i).assign(&Array1::from_vec(row.clone()));
    }

    Self::new(dates, assets, prices)
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn prices(&self) -> ArrayView2<'_, f64> {
    self.prices.view()
  }

  /// Number of price rows.
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }
}

/// Per-period returns, `(rows - 1) × assets`. The first row has no prior price and is dropped.
pub fn period_returns(prices: &PriceTable, kind: ReturnKind) -> Result<Array2<f64>> {
  if prices.len() < MIN_PRICE_ROWS {
    return Err(PortfolioError::InsufficientData {
      required: MIN_PRICE_ROWS,
      actual: prices.len(),
    });
  }

  let p = prices.prices();
  let simple = &p.slice(s![1.., ..]) / &p.slice(s![..-1, ..]) - 1.0;

  Ok(match kind {
    ReturnKind::Simple => simple,
    ReturnKind::Log => simple.mapv_into(f64::ln_1p),
  })
}

/// Annualized mean of each return column.
pub fn annualized_mean(returns: ArrayView2<f64>, annualization_factor: f64) -> Result<Array1<f64>> {
  returns
    .mean_axis(Axis(0))
    .map(|m| m * annualization_factor)
    .ok_or(PortfolioError::InsufficientData {
      required: MIN_PRICE_ROWS,
      actual: returns.nrows() + 1,
    })
}

/// Annualized covariance of return columns.
///
/// Uses the sample divisor `T - 1`; a single return period falls back to the
/// population divisor, which yields a zero matrix.
pub fn annualized_covariance(
  returns: ArrayView2<f64>,
  annualization_factor: f64,
) -> Result<Array2<f64>> {
  let periods = returns.nrows();
  let ddof = if periods > 1 { 1.0 } else { 0.0 };

  returns
    .t()
    .cov(ddof)
    .map(|c| c * annualization_factor)
    .map_err(|_| PortfolioError::InsufficientData {
      required: MIN_PRICE_ROWS,
      actual: periods + 1,
    })
}

/// Annualized mean returns and covariance from simple daily returns.
pub fn estimate(
  prices: &PriceTable,
  annualization_factor: f64,
) -> Result<(ReturnVector, CovarianceMatrix)> {
  estimate_with(prices, annualization_factor, ReturnKind::Simple)
}

/// Annualized mean returns and covariance for the given return kind.
pub fn estimate_with(
  prices: &PriceTable,
  annualization_factor: f64,
  kind: ReturnKind,
) -> Result<(ReturnVector, CovarianceMatrix)> {
  let returns = period_returns(prices, kind)?;
  let mean = annualized_mean(returns.view(), annualization_factor)?;
  let cov = annualized_covariance(returns.view(), annualization_factor)?;

  Ok((
    ReturnVector::new(prices.assets().to_vec(), mean)?,
    CovarianceMatrix::new(prices.assets().to_vec(), cov)?,
  ))
}

#[cfg(test)]
pub(crate) mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use chrono::Duration;
  use ndarray::array;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;

  pub(crate) fn daily_dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2017, 1, 3).unwrap();
    (0..n).map(|i| start + Duration::days(i as i64)).collect()
  }

  pub(crate) fn tickers(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("ASSET{i}")).collect()
  }

  /// Geometric random-walk prices with per-asset drift and volatility.
  pub(crate) fn synthetic_prices(days: usize, drifts: &[f64], vols: &[f64], seed: u64) -> PriceTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = drifts.len();
    let mut prices = Array2::zeros((days, n));
    prices.row_mut(0).fill(100.0);
    for t in 1..days {
      for j in 0..n {
        let shock = Normal::new(drifts[j], vols[j]).unwrap().sample(&mut rng);
        prices[[t, j]] = prices[[t - 1, j]] * (1.0 + shock);
      }
    }
    PriceTable::new(daily_dates(days), tickers(n), prices).unwrap()
  }

  #[test]
  fn single_row_is_insufficient() {
    let table = PriceTable::new(daily_dates(1), tickers(2), array![[10.0, 20.0]]).unwrap();
    let err = estimate(&table, TRADING_DAYS).unwrap_err();
    assert_eq!(
      err,
      PortfolioError::InsufficientData {
        required: 2,
        actual: 1
      }
    );
  }

  #[test]
  fn empty_table_is_insufficient() {
    let table = PriceTable::new(vec![], tickers(1), Array2::zeros((0, 1))).unwrap();
    assert!(matches!(
      estimate(&table, TRADING_DAYS),
      Err(PortfolioError::InsufficientData { actual: 0, .. })
    ));
  }

  #[test]
  fn simple_returns_drop_first_row() {
    let table = PriceTable::new(
      daily_dates(3),
      tickers(2),
      array![[100.0, 50.0], [110.0, 50.0], [99.0, 55.0]],
    )
    .unwrap();
    let r = period_returns(&table, ReturnKind::Simple).unwrap();

    assert_eq!(r.dim(), (2, 2));
    assert_abs_diff_eq!(r[[0, 0]], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(r[[1, 0]], -0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(r[[0, 1]], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(r[[1, 1]], 0.1, epsilon = 1e-12);
  }

  #[test]
  fn log_returns_match_ln_ratio() {
    let table =
      PriceTable::new(daily_dates(2), tickers(1), array![[100.0], [120.0]]).unwrap();
    let r = period_returns(&table, ReturnKind::Log).unwrap();
    assert_relative_eq!(r[[0, 0]], (1.2_f64).ln(), epsilon = 1e-12);
  }

  #[test]
  fn moments_are_annualized_sample_statistics() {
    let table = PriceTable::new(
      daily_dates(4),
      tickers(2),
      array![[100.0, 100.0], [101.0, 99.0], [102.01, 99.99], [100.99, 98.99]],
    )
    .unwrap();
    let (mean, cov) = estimate(&table, TRADING_DAYS).unwrap();

    let r = period_returns(&table, ReturnKind::Simple).unwrap();
    let a = r.column(0).to_vec();
    let b = r.column(1).to_vec();
    let ma = a.iter().sum::<f64>() / 3.0;
    let mb = b.iter().sum::<f64>() / 3.0;
    let cab: f64 = a.iter().zip(&b).map(|(x, y)| (x - ma) * (y - mb)).sum::<f64>() / 2.0;

    assert_relative_eq!(mean.values()[0], ma * 252.0, epsilon = 1e-12);
    assert_relative_eq!(mean.values()[1], mb * 252.0, epsilon = 1e-12);
    assert_relative_eq!(cov.values()[[0, 1]], cab * 252.0, epsilon = 1e-12);
    assert_eq!(cov.values()[[0, 1]], cov.values()[[1, 0]]);
    assert!(cov.values().diag().iter().all(|&v| v >= 0.0));
  }

  #[test]
  fn single_period_gives_zero_covariance() {
    let table =
      PriceTable::new(daily_dates(2), tickers(2), array![[10.0, 10.0], [11.0, 9.0]]).unwrap();
    let (mean, cov) = estimate(&table, TRADING_DAYS).unwrap();

    assert_relative_eq!(mean.values()[0], 0.1 * 252.0, epsilon = 1e-9);
    assert!(cov.values().iter().all(|&v| v == 0.0));
  }

  #[test]
  fn estimate_recovers_synthetic_drift_ordering() {
    let table = synthetic_prices(2000, &[0.0002, 0.002], &[0.01, 0.01], 42);
    let (mean, cov) = estimate(&table, TRADING_DAYS).unwrap();

    assert!(mean.values()[1] > mean.values()[0]);
    assert_abs_diff_eq!(cov.values()[[0, 0]], 0.0252, epsilon = 0.005);
    assert_eq!(mean.assets(), cov.assets());
  }

  #[test]
  fn table_rejects_unordered_dates() {
    let mut dates = daily_dates(3);
    dates.swap(1, 2);
    let err = PriceTable::new(dates, tickers(1), array![[1.0], [2.0], [3.0]]).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidPriceTable(_)));
  }

  #[test]
  fn table_rejects_duplicate_dates() {
    let d = daily_dates(1)[0];
    let err = PriceTable::new(vec![d, d], tickers(1), array![[1.0], [2.0]]).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidPriceTable(_)));
  }

  #[test]
  fn table_rejects_non_positive_prices() {
    let err =
      PriceTable::new(daily_dates(2), tickers(1), array![[1.0], [0.0]]).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidPriceTable(_)));
  }

  #[test]
  fn table_rejects_duplicate_assets() {
    let assets = vec!["AAPL".to_string(), "AAPL".to_string()];
    let err = PriceTable::new(daily_dates(1), assets, array![[1.0, 2.0]]).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidPriceTable(_)));
  }

  #[test]
  fn from_rows_checks_row_width() {
    let err = PriceTable::from_rows(daily_dates(2), tickers(2), &[vec![1.0, 2.0], vec![1.0]])
      .unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidPriceTable(_)));
  }
}
