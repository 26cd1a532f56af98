//! # Optimization parameters
//!
//! $$
//! \lambda = 8(1-\ell) + 0.5\,\ell,\qquad
//! \alpha = 6(1-\ell)\bigl(1 + 0.5(1-h_f)\bigr),\qquad
//! \beta = 5(1-s) + s
//! $$
//!
//! Deterministic map from a risk profile and an investment horizon to objective
//! coefficients and hard limits.

use serde::Deserialize;
use serde::Serialize;

use crate::kyc::RiskCategory;
use crate::kyc::RiskProfile;
use crate::market::RiskClass;

/// Objective coefficients and limits derived from a [`RiskProfile`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationParams {
  /// Composite score rescaled to `[0, 1]`.
  pub aggressiveness: f64,
  pub risk_aversion_lambda: f64,
  pub cvar_penalty_alpha: f64,
  pub vol_penalty_beta: f64,
  pub concentration_penalty_gamma: f64,
  pub skewness_reward_delta: f64,
  pub target_volatility: f64,
  pub target_cvar: f64,
  pub max_volatility: f64,
  pub max_cvar: f64,
  /// `(min, max)` aggregate equity weight.
  pub equity_range: (f64, f64),
  /// Minimum aggregate bond weight.
  pub bond_min: f64,
  pub max_single_asset: f64,
  pub category: RiskCategory,
  pub composite_score: f64,
}

impl OptimizationParams {
  pub fn from_profile(profile: &RiskProfile, duration_years: f64) -> Self {
    Self::from_scores(
      profile.composite_score,
      profile.responses.loss_tolerance() as f64,
      profile.responses.horizon() as f64,
      duration_years,
    )
  }

  /// Build from raw scores in `[0, 100]`.
  pub fn from_scores(
    composite_score: f64,
    loss_tolerance: f64,
    horizon: f64,
    duration_years: f64,
  ) -> Self {
    let s = (composite_score / 100.0).clamp(0.0, 1.0);
    let lt = (loss_tolerance / 100.0).clamp(0.0, 1.0);
    let h = (horizon / 100.0).clamp(0.0, 1.0);
    let hf = h.max(0.2);

    let band = crate::kyc::categories::band_for(composite_score);
    let mut equity_range = band.equity_range;
    let target_volatility = 0.04 + 0.18 * s;
    let mut max_cvar = 0.03 + 0.37 * s;
    let mut bond_min: f64 = 0.0;

    if h < 0.3 {
      equity_range.1 = equity_range.1.min(0.5);
      max_cvar = max_cvar.min(0.08);
    }
    if duration_years < 2.0 {
      equity_range.1 = equity_range.1.min(0.5);
      bond_min = bond_min.max(0.3);
    }
    if composite_score < 50.0 {
      bond_min = bond_min.max((0.5 - s).max(0.1));
    }
    equity_range.0 = equity_range.0.min(equity_range.1);

    Self {
      aggressiveness: s,
      risk_aversion_lambda: 8.0 * (1.0 - lt) + 0.5 * lt,
      cvar_penalty_alpha: 6.0 * (1.0 - lt) * (1.0 + 0.5 * (1.0 - hf)),
      vol_penalty_beta: 5.0 * (1.0 - s) + s,
      concentration_penalty_gamma: 3.0 * (1.0 - s) + 0.2 * s,
      skewness_reward_delta: 2.0 * (s - 0.4).max(0.0),
      target_volatility,
      target_cvar: 0.03 + 0.12 * s,
      max_volatility: target_volatility + 0.03,
      max_cvar,
      equity_range,
      bond_min,
      max_single_asset: 0.15 + 0.25 * s,
      category: band.category,
      composite_score,
    }
  }

  /// Per-asset ceiling of the Sortino strategy.
  pub fn sortino_weight_cap(&self, class: RiskClass) -> f64 {
    let s = self.aggressiveness;
    match class {
      RiskClass::CoreEquity => 0.10 + 0.90 * s,
      RiskClass::HighRiskEquity => 0.05 + 0.75 * s,
      RiskClass::MediumRiskEquity => 0.10 + 0.70 * s,
      RiskClass::LowRiskEquity => 0.15 + 0.55 * s,
      RiskClass::SafeBond => 0.30 + 0.20 * s,
      RiskClass::Commodity if s >= 0.8 => 0.20,
      RiskClass::Commodity => 0.10 + 0.25 * s,
      RiskClass::Unknown => 0.05 + 0.25 * s,
    }
  }

  /// Drawdown ceiling of the Sortino strategy, `None` when unlimited.
  pub fn sortino_drawdown_limit(&self) -> Option<f64> {
    let s = self.aggressiveness;
    if s >= 0.9 {
      None
    } else {
      Some(0.05 + 0.5 * s.powf(0.7))
    }
  }
}
