//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w} \in \mathcal W} U(\mathbf{w})
//! $$
//!
//! Shared enums and result containers for portfolio optimization.

use std::collections::BTreeMap;
use std::fmt::Display;

use impl_new_derive::ImplNew;
use serde::Deserialize;
use serde::Serialize;

use super::analytics::PerformanceHistory;
use super::analytics::PerformanceMetrics;
use crate::kyc::QuestionnaireResponse;
use crate::kyc::RiskCategory;
use crate::kyc::RiskProfile;

/// Objective formulation used by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
  /// Blend of Sortino ratio and expected return; the recommended default.
  #[default]
  Sortino,
  /// Penalised utility. The quadratic variance term over-diversifies
  /// aggressive profiles unless the risk aversion is driven very low.
  Utility,
  /// Tangency portfolio on excess moments.
  MaxSharpe,
}

impl StrategyKind {
  /// Parse a string into a [`StrategyKind`], defaulting to Sortino.
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "utility" | "mean-utility" | "unified" => Self::Utility,
      "max-sharpe" | "maxsharpe" | "sharpe" | "tangency" => Self::MaxSharpe,
      _ => Self::Sortino,
    }
  }
}

impl Display for StrategyKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      StrategyKind::Sortino => write!(f, "sortino"),
      StrategyKind::Utility => write!(f, "utility"),
      StrategyKind::MaxSharpe => write!(f, "max-sharpe"),
    }
  }
}

/// Why the solver returned the rule-based allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackReason {
  Infeasible,
  IterationLimit,
  TimeBudget,
  ObjectiveError,
  NonFinite,
}

impl Display for FallbackReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      FallbackReason::Infeasible => write!(f, "feasible region is empty"),
      FallbackReason::IterationLimit => write!(f, "iteration limit reached"),
      FallbackReason::TimeBudget => write!(f, "wall-clock budget exceeded"),
      FallbackReason::ObjectiveError => write!(f, "objective evaluation failed"),
      FallbackReason::NonFinite => write!(f, "non-finite iterate"),
    }
  }
}

/// Per-asset decomposition of portfolio volatility.
#[derive(ImplNew, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskContribution {
  /// `(Σw)_i / σ_p`.
  pub marginal: f64,
  /// `w_i · marginal`.
  pub component: f64,
  /// `component / σ_p`; sums to one over the portfolio.
  pub percentage: f64,
}

/// Caller request for a single allocation.
#[derive(ImplNew, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
  pub responses: QuestionnaireResponse,
  /// Amount to invest, in the base currency.
  pub investment_amount: f64,
  /// Investment horizon in years.
  pub duration_years: f64,
}

/// Allocation produced for an investor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptimizationResult {
  /// Weights above the materiality threshold.
  pub weights: BTreeMap<String, f64>,
  /// Dense weights aligned with `assets`.
  pub dense_weights: Vec<f64>,
  pub assets: Vec<String>,
  /// Base-currency amount per asset in `weights`.
  pub amounts: BTreeMap<String, f64>,
  pub investment_amount: f64,
  /// Annual expected return including the risk-free rate.
  pub expected_return: f64,
  pub volatility: f64,
  pub sharpe: f64,
  pub sortino: f64,
  pub cvar_95: f64,
  pub max_drawdown: f64,
  pub risk_contributions: BTreeMap<String, RiskContribution>,
  pub concentration_hhi: f64,
  pub converged: bool,
  pub fallback_reason: Option<FallbackReason>,
  pub solve_time_ms: f64,
  pub strategy: StrategyKind,
  pub category: RiskCategory,
  pub composite_score: f64,
  pub risk_free_rate: f64,
  pub base_currency: String,
  pub metrics: PerformanceMetrics,
  pub history: PerformanceHistory,
}

/// Assessment that must not be turned into a portfolio.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockedAssessment {
  pub profile: RiskProfile,
  /// Messages of the error-severity inconsistencies.
  pub reasons: Vec<String>,
}

/// Result of running the pipeline for one request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AllocationOutcome {
  Allocated(Box<OptimizationResult>),
  Blocked(BlockedAssessment),
}

impl AllocationOutcome {
  pub fn is_blocked(&self) -> bool {
    matches!(self, AllocationOutcome::Blocked(_))
  }

  pub fn result(&self) -> Option<&OptimizationResult> {
    match self {
      AllocationOutcome::Allocated(r) => Some(r),
      AllocationOutcome::Blocked(_) => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strategy_parsing_defaults_to_sortino() {
    assert_eq!(StrategyKind::from_str("Utility"), StrategyKind::Utility);
    assert_eq!(StrategyKind::from_str("max-sharpe"), StrategyKind::MaxSharpe);
    assert_eq!(StrategyKind::from_str("whatever"), StrategyKind::Sortino);
    assert_eq!(StrategyKind::default(), StrategyKind::Sortino);
  }

  #[test]
  fn request_rejects_out_of_range_answers() {
    let toml = r#"
investment_amount = 100000.0
duration_years = 10.0

[responses]
horizon = 50
loss_tolerance = 50
experience = 50
financial = 50
goal = 50
sleep = 101
"#;
    let err = toml::from_str::<OptimizationRequest>(toml).unwrap_err();
    assert!(err.to_string().contains("invalid sleep"));
  }
}
