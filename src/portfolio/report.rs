//! # Allocation Report
//!
//! Tabular rendering of an [`AllocationReport`].

use std::fmt;

use prettytable::format;
use prettytable::row;
use prettytable::Table;

use super::engine::AllocationReport;

fn pct(x: f64) -> String {
  format!("{:.2}%", x * 100.0)
}

impl AllocationReport {
  /// Per-asset weights with the inputs that produced them.
  pub fn weights_table(&self) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["Asset", "Exp. return", "Volatility", "Max Sharpe", "Min Vol"]);

    let vols = self.covariance.volatilities();
    let sharpe_w = self.max_sharpe.weights.values();
    let vol_w = self.min_volatility.weights.values();
    for (i, asset) in self.mean_returns.assets().iter().enumerate() {
      table.add_row(row![
        asset,
        r->pct(self.mean_returns.values()[i]),
        r->pct(vols[i]),
        r->pct(sharpe_w[i]),
        r->pct(vol_w[i])
      ]);
    }

    table
  }

  /// Return, volatility and Sharpe ratio of both allocations.
  pub fn summary_table(&self) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["Portfolio", "Return", "Volatility", "Sharpe", "Iterations"]);

    for (label, res) in [
      ("Max Sharpe", &self.max_sharpe),
      ("Min Volatility", &self.min_volatility),
    ] {
      let sharpe = res
        .stats
        .sharpe
        .map_or_else(|| "n/a".to_string(), |s| format!("{s:.4}"));
      table.add_row(row![
        label,
        r->pct(res.stats.expected_return),
        r->pct(res.stats.volatility),
        r->sharpe,
        r->res.iterations
      ]);
    }

    table
  }
}

impl fmt::Display for AllocationReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Risk-free rate: {}", pct(self.risk_free))?;
    write!(f, "{}", self.weights_table())?;
    write!(f, "{}", self.summary_table())
  }
}
