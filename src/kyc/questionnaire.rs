//! # Questionnaire
//!
//! $$
//! S = 0.25\,h + 0.30\,\ell + 0.20\,e + 0.15\,f + 0.10\,g
//! $$
//!
//! Six-dimension investor questionnaire. Every answer is an integer score in
//! `[0, 100]`; the sleep dimension is collected for consistency checks only and
//! carries no weight in the composite.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;

use crate::error::PortfolioError;
use crate::error::Result;

/// Questionnaire dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
  Horizon,
  LossTolerance,
  Experience,
  Financial,
  Goal,
  Sleep,
}

impl Dimension {
  pub const ALL: [Dimension; 6] = [
    Dimension::Horizon,
    Dimension::LossTolerance,
    Dimension::Experience,
    Dimension::Financial,
    Dimension::Goal,
    Dimension::Sleep,
  ];

  /// Field name used in map input and error messages.
  pub fn key(&self) -> &'static str {
    match self {
      Dimension::Horizon => "horizon",
      Dimension::LossTolerance => "loss_tolerance",
      Dimension::Experience => "experience",
      Dimension::Financial => "financial",
      Dimension::Goal => "goal",
      Dimension::Sleep => "sleep",
    }
  }

  /// Weight in the composite score.
  pub fn weight(&self) -> f64 {
    match self {
      Dimension::Horizon => 0.25,
      Dimension::LossTolerance => 0.30,
      Dimension::Experience => 0.20,
      Dimension::Financial => 0.15,
      Dimension::Goal => 0.10,
      Dimension::Sleep => 0.0,
    }
  }
}

impl Display for Dimension {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.key())
  }
}

/// Validated questionnaire answers.
///
/// Deserialization goes through [`QuestionnaireResponse::new`], so an
/// out-of-range field is rejected at the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawResponse")]
pub struct QuestionnaireResponse {
  horizon: u8,
  loss_tolerance: u8,
  experience: u8,
  financial: u8,
  goal: u8,
  sleep: u8,
}

#[derive(Deserialize)]
struct RawResponse {
  horizon: i64,
  loss_tolerance: i64,
  experience: i64,
  financial: i64,
  goal: i64,
  sleep: i64,
}

impl TryFrom<RawResponse> for QuestionnaireResponse {
  type Error = PortfolioError;

  fn try_from(raw: RawResponse) -> Result<Self> {
    Self::new(
      raw.horizon,
      raw.loss_tolerance,
      raw.experience,
      raw.financial,
      raw.goal,
      raw.sleep,
    )
  }
}

fn check(dim: Dimension, value: i64) -> Result<u8> {
  if (0..=100).contains(&value) {
    Ok(value as u8)
  } else {
    Err(PortfolioError::validation(
      dim.key(),
      format!("must be within [0, 100], got {value}"),
    ))
  }
}

impl QuestionnaireResponse {
  /// Validate raw answers; the error names the first out-of-range field.
  pub fn new(
    horizon: i64,
    loss_tolerance: i64,
    experience: i64,
    financial: i64,
    goal: i64,
    sleep: i64,
  ) -> Result<Self> {
    Ok(Self {
      horizon: check(Dimension::Horizon, horizon)?,
      loss_tolerance: check(Dimension::LossTolerance, loss_tolerance)?,
      experience: check(Dimension::Experience, experience)?,
      financial: check(Dimension::Financial, financial)?,
      goal: check(Dimension::Goal, goal)?,
      sleep: check(Dimension::Sleep, sleep)?,
    })
  }

  /// Validate answers keyed by field name; missing fields are rejected.
  pub fn from_map(answers: &BTreeMap<String, i64>) -> Result<Self> {
    let get = |dim: Dimension| {
      answers
        .get(dim.key())
        .copied()
        .ok_or_else(|| PortfolioError::validation(dim.key(), "missing answer"))
    };
    Self::new(
      get(Dimension::Horizon)?,
      get(Dimension::LossTolerance)?,
      get(Dimension::Experience)?,
      get(Dimension::Financial)?,
      get(Dimension::Goal)?,
      get(Dimension::Sleep)?,
    )
  }

  pub fn get(&self, dim: Dimension) -> u8 {
    match dim {
      Dimension::Horizon => self.horizon,
      Dimension::LossTolerance => self.loss_tolerance,
      Dimension::Experience => self.experience,
      Dimension::Financial => self.financial,
      Dimension::Goal => self.goal,
      Dimension::Sleep => self.sleep,
    }
  }

  pub fn horizon(&self) -> u8 {
    self.horizon
  }

  pub fn loss_tolerance(&self) -> u8 {
    self.loss_tolerance
  }

  pub fn experience(&self) -> u8 {
    self.experience
  }

  pub fn financial(&self) -> u8 {
    self.financial
  }

  pub fn goal(&self) -> u8 {
    self.goal
  }

  pub fn sleep(&self) -> u8 {
    self.sleep
  }

  /// Weighted composite score in `[0, 100]`.
  pub fn composite(&self) -> f64 {
    Dimension::ALL
      .iter()
      .map(|d| d.weight() * self.get(*d) as f64)
      .sum()
  }
}
