//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Moment estimation, performance measures and long-only mean-variance optimization.

pub mod data;
pub mod engine;
pub mod estimators;
pub mod objective;
pub mod optimizers;
pub mod performance;
pub mod report;
pub mod slsqp;
pub mod types;

pub use data::estimate;
pub use data::estimate_with;
pub use data::PriceTable;
pub use data::TRADING_DAYS;
pub use engine::AllocationReport;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use estimators::ForecastEstimator;
pub use estimators::HistoricalMeanEstimator;
pub use estimators::ReturnEstimator;
pub use objective::NegativeSharpe;
pub use objective::Objective;
pub use objective::Volatility;
pub use optimizers::optimize_max_sharpe;
pub use optimizers::optimize_min_volatility;
pub use optimizers::optimize_objective;
pub use optimizers::OptimizerConfig;
pub use performance::performance;
pub use performance::portfolio_stats;
pub use performance::DEFAULT_RISK_FREE;
pub use types::CovarianceMatrix;
pub use types::InitialGuess;
pub use types::PortfolioResult;
pub use types::PortfolioStats;
pub use types::ReturnKind;
pub use types::ReturnVector;
pub use types::WeightVector;
