//! # allocator-rs
//!
//! $$
//! \text{prices} \to (\mu, \Sigma),\quad \text{answers} \to \text{profile},\quad
//! (\mu, \Sigma, \text{profile}) \to \mathbf w^\*
//! $$
//!
//! Risk-profiled portfolio allocation: base-currency return models built from
//! multi-currency price histories, questionnaire risk profiling and constrained
//! optimization with an always-available rule-based fallback.
pub mod config;
pub mod error;
pub mod kyc;
pub mod market;
pub mod portfolio;
pub mod stats;

pub use config::EngineConfig;
pub use error::PortfolioError;
pub use error::Result;
pub use portfolio::PortfolioEngine;
