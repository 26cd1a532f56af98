//! # Market series
//!
//! $$
//! t_0 < t_1 < \dots < t_n,\qquad p_{t_i} > 0
//! $$
//!
//! Validated price, FX and risk-free series plus the asset metadata carried
//! through the pipeline.

use std::fmt::Display;

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

use crate::error::PortfolioError;
use crate::error::Result;

/// Broad asset class used for category-level constraints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
  Equity,
  Bond,
  Commodity,
  Currency,
  Reit,
}

impl Display for AssetCategory {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      AssetCategory::Equity => write!(f, "equity"),
      AssetCategory::Bond => write!(f, "bond"),
      AssetCategory::Commodity => write!(f, "commodity"),
      AssetCategory::Currency => write!(f, "currency"),
      AssetCategory::Reit => write!(f, "reit"),
    }
  }
}

/// Risk tier driving the per-asset weight caps of the Sortino strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskClass {
  /// Broad large-cap benchmarks allowed to dominate aggressive portfolios.
  CoreEquity,
  HighRiskEquity,
  MediumRiskEquity,
  LowRiskEquity,
  SafeBond,
  Commodity,
  Unknown,
}

impl RiskClass {
  /// Default tier for an asset category when no explicit class is supplied.
  pub fn from_category(category: AssetCategory) -> Self {
    match category {
      AssetCategory::Equity => Self::MediumRiskEquity,
      AssetCategory::Reit => Self::LowRiskEquity,
      AssetCategory::Bond => Self::SafeBond,
      AssetCategory::Commodity => Self::Commodity,
      AssetCategory::Currency => Self::Unknown,
    }
  }
}

/// Static description of an asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetMeta {
  /// Unique asset identifier.
  pub name: String,
  /// Asset class.
  pub category: AssetCategory,
  /// Free-form region label (e.g. `US`, `Europe`, `Israel`).
  pub region: String,
  /// ISO code of the currency the prices are quoted in.
  pub currency: String,
  /// Explicit risk tier; derived from `category` when absent.
  pub risk_class: Option<RiskClass>,
}

impl AssetMeta {
  pub fn new(
    name: impl Into<String>,
    category: AssetCategory,
    region: impl Into<String>,
    currency: impl Into<String>,
  ) -> Self {
    Self {
      name: name.into(),
      category,
      region: region.into(),
      currency: currency.into(),
      risk_class: None,
    }
  }

  pub fn with_risk_class(mut self, risk_class: RiskClass) -> Self {
    self.risk_class = Some(risk_class);
    self
  }

  /// Effective risk tier.
  pub fn risk_class(&self) -> RiskClass {
    self
      .risk_class
      .unwrap_or_else(|| RiskClass::from_category(self.category))
  }
}

fn validate_points(name: &str, points: &[(NaiveDate, f64)], positive: bool) -> Result<()> {
  if points.is_empty() {
    return Err(PortfolioError::InvalidSeries {
      name: name.to_string(),
      reason: "series is empty".to_string(),
    });
  }

  for (i, &(date, value)) in points.iter().enumerate() {
    if !value.is_finite() || (positive && value <= 0.0) {
      return Err(PortfolioError::InvalidSeries {
        name: name.to_string(),
        reason: format!("non-positive or non-finite value {value} at {date}"),
      });
    }
    if i > 0 && points[i - 1].0 >= date {
      return Err(PortfolioError::InvalidSeries {
        name: name.to_string(),
        reason: format!("dates not strictly increasing at {date}"),
      });
    }
  }

  Ok(())
}

/// Years covered by an ordered date slice, using 365.25-day years.
pub fn span_years(dates: &[NaiveDate]) -> f64 {
  match (dates.first(), dates.last()) {
    (Some(first), Some(last)) => (*last - *first).num_days() as f64 / 365.25,
    _ => 0.0,
  }
}

/// Price history of a single asset in its native currency.
#[derive(Clone, Debug)]
pub struct AssetSeries {
  meta: AssetMeta,
  points: Vec<(NaiveDate, f64)>,
}

impl AssetSeries {
  /// Build a series, rejecting unordered dates and non-positive prices.
  pub fn new(meta: AssetMeta, points: Vec<(NaiveDate, f64)>) -> Result<Self> {
    validate_points(&meta.name, &points, true)?;
    Ok(Self { meta, points })
  }

  pub fn meta(&self) -> &AssetMeta {
    &self.meta
  }

  pub fn name(&self) -> &str {
    &self.meta.name
  }

  pub fn points(&self) -> &[(NaiveDate, f64)] {
    &self.points
  }

  /// Observed frequency in observations per year; zero for a single observation.
  pub fn observations_per_year(&self) -> f64 {
    let dates: Vec<NaiveDate> = self.points.iter().map(|p| p.0).collect();
    let years = span_years(&dates);
    if years > 0.0 {
      self.points.len() as f64 / years
    } else {
      0.0
    }
  }
}

/// Exchange-rate history quoted as base-currency units per one foreign unit.
#[derive(Clone, Debug)]
pub struct FxSeries {
  foreign: String,
  base: String,
  points: Vec<(NaiveDate, f64)>,
}

impl FxSeries {
  pub fn new(
    foreign: impl Into<String>,
    base: impl Into<String>,
    points: Vec<(NaiveDate, f64)>,
  ) -> Result<Self> {
    let foreign = foreign.into();
    let base = base.into();
    validate_points(&format!("{foreign}_{base}"), &points, true)?;
    Ok(Self {
      foreign,
      base,
      points,
    })
  }

  /// Pair identifier such as `USD_ILS`.
  pub fn pair(&self) -> String {
    format!("{}_{}", self.foreign, self.base)
  }

  pub fn foreign(&self) -> &str {
    &self.foreign
  }

  pub fn base(&self) -> &str {
    &self.base
  }

  pub fn points(&self) -> &[(NaiveDate, f64)] {
    &self.points
  }

  /// Last known quote on or before `date`, together with its own date.
  pub fn quote_as_of(&self, date: NaiveDate) -> Option<(NaiveDate, f64)> {
    let idx = self.points.partition_point(|p| p.0 <= date);
    idx.checked_sub(1).map(|i| self.points[i])
  }
}

/// Annualized risk-free rate history in the base currency.
#[derive(Clone, Debug)]
pub struct RiskFreeSeries {
  points: Vec<(NaiveDate, f64)>,
}

impl RiskFreeSeries {
  pub fn new(points: Vec<(NaiveDate, f64)>) -> Result<Self> {
    validate_points("risk_free", &points, false)?;
    Ok(Self { points })
  }

  /// A flat rate valid for every date.
  pub fn constant(rate: f64) -> Self {
    Self {
      points: vec![(NaiveDate::MIN, rate)],
    }
  }

  pub fn points(&self) -> &[(NaiveDate, f64)] {
    &self.points
  }

  /// Annual rates reindexed onto `dates` with forward fill.
  ///
  /// Dates before the first observation take the first observation.
  pub fn align(&self, dates: &[NaiveDate]) -> Vec<f64> {
    let first = self.points.first().map(|p| p.1).unwrap_or(0.0);
    dates
      .iter()
      .map(|&d| as_of(&self.points, d).unwrap_or(first))
      .collect()
  }

  /// Per-period rates on `dates`: `(1 + r)^(1 / periods_per_year) - 1`.
  pub fn periodic(&self, dates: &[NaiveDate], periods_per_year: f64) -> Vec<f64> {
    self
      .align(dates)
      .into_iter()
      .map(|r| (1.0 + r).powf(1.0 / periods_per_year) - 1.0)
      .collect()
  }

  /// Mean annual rate over `dates`.
  pub fn average(&self, dates: &[NaiveDate]) -> f64 {
    let aligned = self.align(dates);
    if aligned.is_empty() {
      0.0
    } else {
      aligned.iter().sum::<f64>() / aligned.len() as f64
    }
  }
}

/// Binary search for the last point on or before `date`.
pub(crate) fn as_of(points: &[(NaiveDate, f64)], date: NaiveDate) -> Option<f64> {
  let idx = points.partition_point(|p| p.0 <= date);
  if idx == 0 {
    None
  } else {
    Some(points[idx - 1].1)
  }
}
