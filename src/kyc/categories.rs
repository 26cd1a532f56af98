//! # Risk categories
//!
//! $$
//! L(S) = \left\lfloor L_k + \frac{S - S_k}{S_{k+1} - S_k}\,(L_{k+1} - L_k) \right\rfloor,
//! \qquad S \in (S_k, S_{k+1}]
//! $$
//!
//! Score bands mapping a composite score to a named category, its risk limits
//! and a 1–10 risk level.

use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;

use crate::error::PortfolioError;
use crate::error::Result;

/// Investor risk category, ordered from least to most aggressive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
  UltraConservative,
  Conservative,
  Moderate,
  Aggressive,
  VeryAggressive,
}

impl RiskCategory {
  pub fn label(&self) -> &'static str {
    match self {
      RiskCategory::UltraConservative => "Ultra Conservative",
      RiskCategory::Conservative => "Conservative",
      RiskCategory::Moderate => "Moderate",
      RiskCategory::Aggressive => "Aggressive",
      RiskCategory::VeryAggressive => "Very Aggressive",
    }
  }

  /// Band definition of this category.
  pub fn band(&self) -> &'static CategoryBand {
    &BANDS[*self as usize]
  }
}

impl Display for RiskCategory {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.label())
  }
}

/// Score interval `(lower, upper]` of a category and the limits attached to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CategoryBand {
  pub category: RiskCategory,
  /// Exclusive lower score bound (inclusive for the first band).
  pub lower: f64,
  /// Inclusive upper score bound.
  pub upper: f64,
  pub level_low: u8,
  pub level_high: u8,
  pub max_drawdown: f64,
  pub target_volatility: f64,
  pub recovery_time_months: u32,
  pub equity_range: (f64, f64),
  pub international_max: f64,
  pub alternatives_max: f64,
}

pub static BANDS: [CategoryBand; 5] = [
  CategoryBand {
    category: RiskCategory::UltraConservative,
    lower: 0.0,
    upper: 25.0,
    level_low: 1,
    level_high: 3,
    max_drawdown: 0.03,
    target_volatility: 0.04,
    recovery_time_months: 6,
    equity_range: (0.05, 0.20),
    international_max: 0.15,
    alternatives_max: 0.02,
  },
  CategoryBand {
    category: RiskCategory::Conservative,
    lower: 25.0,
    upper: 45.0,
    level_low: 3,
    level_high: 5,
    max_drawdown: 0.08,
    target_volatility: 0.08,
    recovery_time_months: 12,
    equity_range: (0.15, 0.40),
    international_max: 0.25,
    alternatives_max: 0.05,
  },
  CategoryBand {
    category: RiskCategory::Moderate,
    lower: 45.0,
    upper: 65.0,
    level_low: 5,
    level_high: 7,
    max_drawdown: 0.15,
    target_volatility: 0.12,
    recovery_time_months: 24,
    equity_range: (0.30, 0.65),
    international_max: 0.40,
    alternatives_max: 0.10,
  },
  CategoryBand {
    category: RiskCategory::Aggressive,
    lower: 65.0,
    upper: 85.0,
    level_low: 7,
    level_high: 9,
    max_drawdown: 0.25,
    target_volatility: 0.18,
    recovery_time_months: 36,
    equity_range: (0.55, 0.80),
    international_max: 0.60,
    alternatives_max: 0.20,
  },
  CategoryBand {
    category: RiskCategory::VeryAggressive,
    lower: 85.0,
    upper: 100.0,
    level_low: 9,
    level_high: 10,
    max_drawdown: 0.40,
    target_volatility: 0.22,
    recovery_time_months: 48,
    equity_range: (0.70, 0.95),
    international_max: 0.80,
    alternatives_max: 0.30,
  },
];

/// Check that the band table covers `[0, 100]` without gaps or overlaps.
pub fn validate_bands() -> Result<()> {
  let first = &BANDS[0];
  if first.lower != 0.0 {
    return Err(PortfolioError::Config(format!(
      "first band starts at {}, expected 0",
      first.lower
    )));
  }
  for pair in BANDS.windows(2) {
    if pair[0].upper != pair[1].lower || pair[0].level_high != pair[1].level_low {
      return Err(PortfolioError::Config(format!(
        "bands {} and {} are not contiguous",
        pair[0].category, pair[1].category
      )));
    }
  }
  for band in &BANDS {
    let (lo, hi) = band.equity_range;
    if band.lower >= band.upper || lo > hi || !(0.0..=1.0).contains(&hi) {
      return Err(PortfolioError::Config(format!(
        "band {} is malformed",
        band.category
      )));
    }
  }
  if BANDS[BANDS.len() - 1].upper != 100.0 {
    return Err(PortfolioError::Config("last band must end at 100".into()));
  }
  Ok(())
}

/// Band containing `score`; scores are clamped to `[0, 100]` first.
pub fn band_for(score: f64) -> &'static CategoryBand {
  let score = score.clamp(0.0, 100.0);
  BANDS
    .iter()
    .find(|b| score <= b.upper)
    .unwrap_or(&BANDS[BANDS.len() - 1])
}

/// Risk level 1–10 by linear interpolation inside the band, floored and clamped.
pub fn risk_level(score: f64) -> u8 {
  let band = band_for(score);
  let score = score.clamp(0.0, 100.0);
  let span = (band.level_high - band.level_low) as f64;
  let t = (score - band.lower) / (band.upper - band.lower);
  let level = (band.level_low as f64 + t * span).floor() as u8;
  level.clamp(band.level_low, band.level_high)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bands_are_contiguous() {
    assert!(validate_bands().is_ok());
  }

  #[test]
  fn boundaries_belong_to_lower_band() {
    assert_eq!(band_for(25.0).category, RiskCategory::UltraConservative);
    assert_eq!(band_for(25.5).category, RiskCategory::Conservative);
    assert_eq!(band_for(85.0).category, RiskCategory::Aggressive);
    assert_eq!(band_for(100.0).category, RiskCategory::VeryAggressive);
  }

  #[test]
  fn levels_span_one_to_ten() {
    assert_eq!(risk_level(0.0), 1);
    assert_eq!(risk_level(25.0), 3);
    assert_eq!(risk_level(55.0), 6);
    assert_eq!(risk_level(100.0), 10);
  }

  #[test]
  fn levels_are_monotone_in_score() {
    let mut last = 0;
    for s in 0..=100 {
      let level = risk_level(s as f64);
      assert!(level >= last);
      last = level;
    }
  }

  #[test]
  fn category_indexes_its_band() {
    for band in &BANDS {
      assert_eq!(band.category.band().category, band.category);
    }
  }
}
