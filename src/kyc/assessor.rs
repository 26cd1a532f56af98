//! # Risk assessor
//!
//! $$
//! \text{confidence} = \max\left(0.5,\; 1 - 0.1\,n_{\text{warn}}\right)
//! $$
//!
//! Maps validated questionnaire answers to a [`RiskProfile`].

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use super::categories::RiskCategory;
use super::categories::band_for;
use super::categories::risk_level;
use super::consistency::Inconsistency;
use super::consistency::Severity;
use super::consistency::adjust;
use super::consistency::detect;
use super::questionnaire::QuestionnaireResponse;

/// Outcome of a questionnaire assessment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
  /// Risk level on a 1–10 scale.
  pub risk_level: u8,
  /// Adjusted composite score in `[0, 100]`.
  pub composite_score: f64,
  pub category: RiskCategory,
  pub max_drawdown: f64,
  pub target_volatility: f64,
  pub recovery_time_months: u32,
  /// `(min, max)` aggregate equity weight.
  pub equity_range: (f64, f64),
  pub international_max: f64,
  pub alternatives_max: f64,
  pub inconsistencies: Vec<Inconsistency>,
  pub confidence_score: f64,
  pub responses: QuestionnaireResponse,
  pub assessed_at: DateTime<Utc>,
}

impl RiskProfile {
  /// True when an error-severity inconsistency forbids portfolio construction.
  pub fn is_blocked(&self) -> bool {
    self
      .inconsistencies
      .iter()
      .any(|i| i.severity == Severity::Error)
  }
}

/// Assess validated questionnaire answers.
#[tracing::instrument(skip_all)]
pub fn assess(responses: &QuestionnaireResponse) -> RiskProfile {
  let found = detect(responses);
  for inc in &found {
    warn!(kind = ?inc.kind, severity = ?inc.severity, "{}", inc.message);
  }

  let raw = responses.composite();
  let score = adjust(raw, responses, &found);
  let band = band_for(score);
  let level = risk_level(score);

  let warnings = found
    .iter()
    .filter(|i| i.severity == Severity::Warning)
    .count();
  let confidence = (1.0 - 0.1 * warnings as f64).max(0.5);

  info!(
    raw_score = raw,
    score,
    level,
    category = %band.category,
    "risk assessment complete"
  );

  RiskProfile {
    risk_level: level,
    composite_score: score,
    category: band.category,
    max_drawdown: band.max_drawdown,
    target_volatility: band.target_volatility,
    recovery_time_months: band.recovery_time_months,
    equity_range: band.equity_range,
    international_max: band.international_max,
    alternatives_max: band.alternatives_max,
    inconsistencies: found,
    confidence_score: confidence,
    responses: *responses,
    assessed_at: Utc::now(),
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use tracing_test::traced_test;

  use super::*;
  use crate::kyc::consistency::InconsistencyKind;

  fn profile(h: i64, l: i64, e: i64, f: i64, g: i64, s: i64) -> RiskProfile {
    assess(&QuestionnaireResponse::new(h, l, e, f, g, s).unwrap())
  }

  #[test]
  fn all_zero_is_ultra_conservative() {
    let p = profile(0, 0, 0, 0, 0, 0);
    assert_eq!(p.category, RiskCategory::UltraConservative);
    assert!(p.composite_score <= 25.0);
    assert!(p.risk_level <= 3);
    assert_eq!(p.equity_range, (0.05, 0.20));
    assert!(!p.is_blocked());
    assert_abs_diff_eq!(p.confidence_score, 1.0, epsilon = 1e-12);
  }

  #[test]
  fn all_hundred_is_very_aggressive() {
    let p = profile(100, 100, 100, 100, 100, 100);
    assert_eq!(p.category, RiskCategory::VeryAggressive);
    assert!(p.composite_score > 85.0);
    assert!(p.risk_level >= 9);
    assert_eq!(p.equity_range, (0.70, 0.95));
  }

  #[traced_test]
  #[test]
  fn short_horizon_high_loss_is_scaled_down() {
    let p = profile(10, 90, 50, 50, 50, 50);
    assert_eq!(p.inconsistencies.len(), 1);
    assert_eq!(
      p.inconsistencies[0].kind,
      InconsistencyKind::ShortHorizonHighRisk
    );
    assert_eq!(p.inconsistencies[0].severity, Severity::Warning);
    assert_abs_diff_eq!(p.composite_score, 41.6, epsilon = 1e-9);
    assert!(p.composite_score < 52.0);
    assert_abs_diff_eq!(p.confidence_score, 0.9, epsilon = 1e-12);
    assert!(logs_contain("Short-term investment"));
  }

  #[test]
  fn low_capacity_high_appetite_blocks() {
    let p = profile(50, 80, 50, 20, 50, 50);
    assert!(
      p.inconsistencies
        .iter()
        .any(|i| i.kind == InconsistencyKind::LowCapacityHighAppetite && i.severity == Severity::Error)
    );
    assert!(p.is_blocked());
    assert!(p.composite_score <= 45.0);
  }

  #[test]
  fn three_warnings_cost_thirty_points() {
    // short horizon, inexperienced aggressive and sleep mismatch all fire
    let p = profile(10, 100, 0, 100, 100, 0);
    assert_eq!(p.inconsistencies.len(), 3);
    assert_abs_diff_eq!(p.confidence_score, 0.7, epsilon = 1e-12);
  }
}
