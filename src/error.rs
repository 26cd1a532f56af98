//! # Errors
//!
//! Caller-facing failures of the allocation pipeline. Solver non-convergence and
//! blocking questionnaire inconsistencies are outcomes, not errors, and live in
//! [`crate::portfolio::solver::Solution`] and [`crate::portfolio::AllocationOutcome`].

use thiserror::Error;

/// Errors raised by the data, validation and configuration layers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
  /// Too few overlapping observations to build a return matrix or convert an asset.
  #[error("insufficient data for {context}: need at least {required} observations, got {actual}")]
  DataInsufficiency {
    context: String,
    required: usize,
    actual: usize,
  },

  /// Malformed or out-of-range caller input.
  #[error("invalid {field}: {reason}")]
  Validation { field: String, reason: String },

  /// A price, FX or rate series violates its ordering or positivity invariants.
  #[error("invalid series {name}: {reason}")]
  InvalidSeries { name: String, reason: String },

  /// No FX series exists to convert an asset into the base currency.
  #[error("no FX series for {currency} (needed by {asset})")]
  MissingFxRate { asset: String, currency: String },

  /// Configuration could not be parsed or failed validation.
  #[error("invalid configuration: {0}")]
  Config(String),
}

impl PortfolioError {
  pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::Validation {
      field: field.into(),
      reason: reason.into(),
    }
  }

  pub(crate) fn insufficient(context: impl Into<String>, required: usize, actual: usize) -> Self {
    Self::DataInsufficiency {
      context: context.into(),
      required,
      actual,
    }
  }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PortfolioError>;
