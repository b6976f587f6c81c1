//! # markowitz-rs
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}\in\Delta} \frac{\mathbf{w}^\top\mu-r_f}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}}
//! $$
//!
//! Mean-variance portfolio optimization on the long-only simplex.
//!
//! Price histories are turned into annualized moments, which feed two
//! constrained problems: maximum Sharpe ratio and minimum volatility.

pub mod error;
pub mod portfolio;

pub use error::PortfolioError;
pub use error::Result;
