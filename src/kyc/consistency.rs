//! # Consistency rules
//!
//! Cross-answer checks that flag contradictory questionnaire answers and adjust
//! the composite score. Rules are evaluated and applied in declaration order.

use serde::Deserialize;
use serde::Serialize;

use super::questionnaire::Dimension;
use super::questionnaire::QuestionnaireResponse;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InconsistencyKind {
  ShortHorizonHighRisk,
  InexperiencedAggressive,
  LowCapacityHighAppetite,
  SleepLossMismatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Warning,
  /// Blocks portfolio construction.
  Error,
}

/// Score adjustment attached to a rule.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Adjustment {
  /// Multiply the running score.
  Scale(f64),
  /// Cap the running score.
  Cap(f64),
  /// Replace the loss-tolerance answer with `min(sleep, loss)` in the composite.
  ///
  /// Applied as a shift of the already-adjusted score, not a recompute of the
  /// composite.
  SubstituteLossTolerance,
}

impl Adjustment {
  /// Apply to the running score.
  pub fn apply(&self, score: f64, responses: &QuestionnaireResponse) -> f64 {
    match *self {
      Adjustment::Scale(factor) => score * factor,
      Adjustment::Cap(cap) => score.min(cap),
      Adjustment::SubstituteLossTolerance => {
        let loss = responses.loss_tolerance() as f64;
        let conservative = loss.min(responses.sleep() as f64);
        score + Dimension::LossTolerance.weight() * (conservative - loss)
      }
    }
  }
}

/// A detected inconsistency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Inconsistency {
  pub kind: InconsistencyKind,
  pub severity: Severity,
  pub message: String,
  pub adjustment: Adjustment,
}

pub struct Rule {
  pub kind: InconsistencyKind,
  pub condition: fn(&QuestionnaireResponse) -> bool,
  pub adjustment: Adjustment,
  pub severity: Severity,
  pub message: &'static str,
}

pub static RULES: [Rule; 4] = [
  Rule {
    kind: InconsistencyKind::ShortHorizonHighRisk,
    condition: |r| r.horizon() < 30 && r.loss_tolerance() > 70,
    adjustment: Adjustment::Scale(0.8),
    severity: Severity::Warning,
    message: "Short-term investment with high risk tolerance; consider a more conservative approach",
  },
  Rule {
    kind: InconsistencyKind::InexperiencedAggressive,
    condition: |r| r.experience() < 30 && r.goal() > 80,
    adjustment: Adjustment::Cap(65.0),
    severity: Severity::Warning,
    message: "Inexperienced with aggressive growth goals; recommend starting with a moderate approach",
  },
  Rule {
    kind: InconsistencyKind::LowCapacityHighAppetite,
    condition: |r| r.financial() < 40 && r.loss_tolerance() > 60,
    adjustment: Adjustment::Cap(45.0),
    severity: Severity::Error,
    message: "Low financial capacity with high risk appetite; start conservatively",
  },
  Rule {
    kind: InconsistencyKind::SleepLossMismatch,
    condition: |r| (r.sleep() as i16 - r.loss_tolerance() as i16).abs() > 40,
    adjustment: Adjustment::SubstituteLossTolerance,
    severity: Severity::Warning,
    message: "Stated and practical loss tolerance disagree; using the more conservative answer",
  },
];

/// Every rule that fires for `responses`, in declaration order.
pub fn detect(responses: &QuestionnaireResponse) -> Vec<Inconsistency> {
  RULES
    .iter()
    .filter(|rule| (rule.condition)(responses))
    .map(|rule| Inconsistency {
      kind: rule.kind,
      severity: rule.severity,
      message: rule.message.to_string(),
      adjustment: rule.adjustment,
    })
    .collect()
}

/// Apply adjustments sequentially, then clamp to `[0, 100]`.
pub fn adjust(composite: f64, responses: &QuestionnaireResponse, found: &[Inconsistency]) -> f64 {
  found
    .iter()
    .fold(composite, |score, inc| inc.adjustment.apply(score, responses))
    .clamp(0.0, 100.0)
}
