use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use csv::StringRecord;
use markowitz_rs::portfolio::InitialGuess;
use markowitz_rs::portfolio::OptimizerConfig;
use markowitz_rs::portfolio::PortfolioEngine;
use markowitz_rs::portfolio::PortfolioEngineConfig;
use markowitz_rs::portfolio::PriceTable;
use markowitz_rs::portfolio::ReturnKind;
use tracing::info;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "markowitz")]
#[command(about = "Max-Sharpe and min-volatility allocations from a CSV of daily prices")]
struct Cli {
  /// CSV with a `Date,<asset>,...` header and one row of prices per day
  #[arg(short, long)]
  prices: PathBuf,

  /// Annualized risk-free rate
  #[arg(long, default_value_t = 0.02)]
  risk_free: f64,

  /// Trading periods per year
  #[arg(long, default_value_t = 252.0)]
  annualization: f64,

  /// Seed for the random starting point
  #[arg(long, default_value_t = 42)]
  seed: u64,

  /// Starting point of the solver: `uniform` (1/n) or `random` (seeded)
  #[arg(long, default_value = "uniform")]
  init: String,

  /// Use log returns instead of simple returns
  #[arg(long)]
  log_returns: bool,

  /// Run both optimizations concurrently
  #[arg(long)]
  parallel: bool,

  /// Solver iteration cap
  #[arg(long, default_value_t = 100)]
  max_iters: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer())
    .with(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();
  let table = read_price_table(&cli.prices)
    .with_context(|| format!("reading prices from {}", cli.prices.display()))?;
  info!(
    assets = table.assets().len(),
    rows = table.len(),
    "loaded price table"
  );

  let engine = PortfolioEngine::new(PortfolioEngineConfig {
    annualization_factor: cli.annualization,
    risk_free: cli.risk_free,
    return_kind: if cli.log_returns {
      ReturnKind::Log
    } else {
      ReturnKind::Simple
    },
    optimizer: OptimizerConfig {
      max_iters: cli.max_iters,
      initial_guess: InitialGuess::from_str(&cli.init),
      seed: cli.seed,
      ..OptimizerConfig::default()
    },
    parallel: cli.parallel,
  });

  let report = engine.run(&table)?;
  println!("{report}");

  Ok(())
}

fn read_price_table(path: &Path) -> Result<PriceTable> {
  let file = File::open(path)?;
  parse_price_table(file)
}

/// Parse a `Date,<asset>,...` CSV. Quoted fields and thousands separators are
/// accepted; rows with a missing or non-numeric price are skipped.
fn parse_price_table<R: Read>(source: R) -> Result<PriceTable> {
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(true)
    .flexible(true)
    .trim(csv::Trim::All)
    .from_reader(source);

  let header = reader.headers()?.clone();
  if header.len() < 2 {
    bail!("price header needs a date column and at least one asset");
  }
  let assets: Vec<String> = header.iter().skip(1).map(String::from).collect();

  let mut dates = Vec::new();
  let mut rows = Vec::new();
  let mut record = StringRecord::new();
  while reader.read_record(&mut record)? {
    let line = record.position().map_or(0, |p| p.line());
    let date_field = record.get(0).unwrap_or_default();
    let day = date_field.get(..10).unwrap_or(date_field);
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
      .with_context(|| format!("line {line}: bad date '{date_field}'"))?;

    let prices: Vec<Option<f64>> = record
      .iter()
      .skip(1)
      .map(|f| {
        f.replace(',', "")
          .parse::<f64>()
          .ok()
          .filter(|p| p.is_finite())
      })
      .collect();
    if prices.len() != assets.len() || prices.iter().any(Option::is_none) {
      warn!(line, %date, "skipping row with missing prices");
      continue;
    }

    dates.push(date);
    rows.push(prices.into_iter().flatten().collect());
  }

  Ok(PriceTable::from_rows(dates, assets, &rows)?)
}
