//! # Performance Analytics
//!
//! $$
//! \text{Sharpe} = \frac{\bar r\,P - r_f}{s_r\sqrt P},\qquad
//! RC_i = w_i\frac{(\Sigma\mathbf w)_i}{\sigma_p},\qquad
//! \text{HHI} = \sum_i w_i^2
//! $$
//!
//! Historical performance and risk diagnostics of a fixed weight vector.

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray::ArrayView1;
use serde::Deserialize;
use serde::Serialize;

use super::data::downside_deviation;
use super::types::RiskContribution;
use crate::market::ReturnMatrix;
use crate::market::RiskFreeSeries;
use crate::stats::descriptive;

/// Confidence level of the reported VaR and CVaR.
pub const REPORT_CONFIDENCE: f64 = 0.95;

/// Historical metrics of a portfolio.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
  /// Compounded return over the whole sample.
  pub total_return: f64,
  pub annual_return: f64,
  pub volatility: f64,
  pub sharpe: f64,
  pub sortino: f64,
  pub downside_deviation: f64,
  /// Positive magnitude.
  pub max_drawdown: f64,
  /// `annual_return / max_drawdown`, zero without a drawdown.
  pub calmar: f64,
  /// Positive loss, scaled by `sqrt(P)`.
  pub var_95: f64,
  /// Positive loss, scaled by `sqrt(P)`.
  pub cvar_95: f64,
  pub skewness: f64,
  pub excess_kurtosis: f64,
  /// Fraction of periods with a positive return.
  pub win_rate: f64,
  pub avg_win: f64,
  pub avg_loss: f64,
  pub periods_per_year: f64,
  pub risk_free_rate: f64,
}

/// Evaluate `weights` against the realized history in `matrix`.
#[tracing::instrument(skip_all, fields(periods = matrix.n_periods()))]
pub fn analyze(weights: &[f64], matrix: &ReturnMatrix, risk_free: &RiskFreeSeries) -> PerformanceMetrics {
  let rets = matrix.portfolio_returns(weights).to_vec();
  let ppy = matrix.periods_per_year();
  let rf = risk_free.average(matrix.dates());
  metrics_of(&rets, ppy, rf)
}

/// Metrics of a periodic return series.
pub fn metrics_of(rets: &[f64], periods_per_year: f64, risk_free_rate: f64) -> PerformanceMetrics {
  if rets.is_empty() {
    return PerformanceMetrics {
      periods_per_year,
      risk_free_rate,
      ..Default::default()
    };
  }

  let annual_return = descriptive::mean(rets) * periods_per_year;
  let volatility = if rets.len() > 1 {
    descriptive::std_dev(rets) * periods_per_year.sqrt()
  } else {
    0.0
  };
  let downside = downside_deviation(rets, periods_per_year);
  let max_drawdown = descriptive::max_drawdown(rets);
  let (var, cvar) = descriptive::var_cvar(rets, REPORT_CONFIDENCE);

  let wins: Vec<f64> = rets.iter().copied().filter(|r| *r > 0.0).collect();
  let losses: Vec<f64> = rets.iter().copied().filter(|r| *r < 0.0).collect();

  PerformanceMetrics {
    total_return: rets.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0,
    annual_return,
    volatility,
    sharpe: if volatility > 0.0 {
      (annual_return - risk_free_rate) / volatility
    } else {
      0.0
    },
    sortino: (annual_return - risk_free_rate) / downside,
    downside_deviation: downside,
    max_drawdown,
    calmar: if max_drawdown > 0.0 {
      annual_return / max_drawdown
    } else {
      0.0
    },
    var_95: var * periods_per_year.sqrt(),
    cvar_95: cvar * periods_per_year.sqrt(),
    skewness: descriptive::skewness(rets),
    excess_kurtosis: descriptive::excess_kurtosis(rets),
    win_rate: wins.len() as f64 / rets.len() as f64,
    avg_win: if wins.is_empty() { 0.0 } else { descriptive::mean(&wins) },
    avg_loss: if losses.is_empty() { 0.0 } else { descriptive::mean(&losses) },
    periods_per_year,
    risk_free_rate,
  }
}

/// Volatility decomposition of `weights` under `cov`.
///
/// Zero-volatility portfolios report zero marginal and component terms with the
/// percentages split by weight so that they still sum to one.
pub fn risk_contributions(weights: &[f64], cov: &Array2<f64>) -> Vec<RiskContribution> {
  let w = ArrayView1::from(weights);
  let sigma_w = cov.dot(&w);
  let vol = w.dot(&sigma_w).max(0.0).sqrt();

  if vol <= f64::EPSILON {
    let total: f64 = weights.iter().sum();
    return weights
      .iter()
      .map(|wi| RiskContribution::new(0.0, 0.0, if total > 0.0 { wi / total } else { 0.0 }))
      .collect();
  }

  weights
    .iter()
    .zip(sigma_w.iter())
    .map(|(wi, sw)| {
      let marginal = sw / vol;
      let component = wi * marginal;
      RiskContribution::new(marginal, component, component / vol)
    })
    .collect()
}

/// Herfindahl-Hirschman concentration `Σw²`.
pub fn hhi(weights: &[f64]) -> f64 {
  weights.iter().map(|w| w * w).sum()
}

/// Value path of a hypothetical investment under fixed weights.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceHistory {
  /// Start date followed by every period end.
  pub dates: Vec<NaiveDate>,
  /// Portfolio value, starting at the invested amount.
  pub values: Vec<f64>,
  pub returns: Vec<f64>,
  pub final_value: f64,
  pub total_return_pct: f64,
  pub years: f64,
}

impl PerformanceHistory {
  /// Compound `amount` through the periodic portfolio returns of `matrix`.
  pub fn simulate(weights: &[f64], matrix: &ReturnMatrix, amount: f64) -> Self {
    let returns = matrix.portfolio_returns(weights).to_vec();
    let dates = matrix.dates();

    let mut values = Vec::with_capacity(returns.len() + 1);
    values.push(amount);
    let mut value = amount;
    for r in &returns {
      value *= 1.0 + r;
      values.push(value);
    }

    let mut path_dates = Vec::with_capacity(dates.len() + 1);
    if let Some(first) = dates.first() {
      // one period before the first return
      let step = matrix.periods_per_year().recip() * 365.25;
      path_dates.push(*first - chrono::Duration::days(step.round() as i64));
    }
    path_dates.extend_from_slice(dates);

    let years = crate::market::series::span_years(&path_dates);
    Self {
      dates: path_dates,
      values,
      returns,
      final_value: value,
      total_return_pct: if amount > 0.0 {
        (value / amount - 1.0) * 100.0
      } else {
        0.0
      },
      years,
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;
  use ndarray::array;
  use ndarray::Array2;

  use super::*;
  use crate::market::AssetCategory;
  use crate::market::AssetMeta;

  fn matrix() -> ReturnMatrix {
    let dates = [
      (2020, 1, 31),
      (2020, 2, 29),
      (2020, 3, 31),
      (2020, 4, 30),
      (2020, 5, 31),
      (2020, 6, 30),
    ]
    .iter()
    .map(|(y, m, d)| NaiveDate::from_ymd_opt(*y, *m, *d).unwrap())
    .collect();
    let values: Array2<f64> = array![
      [0.02, 0.01],
      [-0.05, 0.005],
      [0.03, -0.002],
      [0.01, 0.004],
      [-0.02, 0.006],
      [0.04, 0.001]
    ];
    ReturnMatrix::new(
      dates,
      vec![
        AssetMeta::new("EQ", AssetCategory::Equity, "US", "ILS"),
        AssetMeta::new("BD", AssetCategory::Bond, "IL", "ILS"),
      ],
      values,
    )
    .unwrap()
  }

  #[test]
  fn risk_contributions_sum_to_one() {
    let cov = array![[0.04, 0.006], [0.006, 0.01]];
    let w = [0.3, 0.7];
    let rc = risk_contributions(&w, &cov);
    let total: f64 = rc.iter().map(|c| c.percentage).sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);

    let vol = (0.09 * 0.04 + 2.0 * 0.21 * 0.006 + 0.49 * 0.01_f64).sqrt();
    let components: f64 = rc.iter().map(|c| c.component).sum();
    assert_abs_diff_eq!(components, vol, epsilon = 1e-12);
  }

  #[test]
  fn zero_volatility_contributions_follow_weights() {
    let cov = Array2::zeros((2, 2));
    let rc = risk_contributions(&[0.25, 0.75], &cov);
    assert_abs_diff_eq!(rc[1].percentage, 0.75);
  }

  #[test]
  fn hhi_of_equal_weights() {
    assert_abs_diff_eq!(hhi(&[0.25; 4]), 0.25, epsilon = 1e-12);
    assert_abs_diff_eq!(hhi(&[1.0]), 1.0);
  }

  #[test]
  fn metrics_of_single_asset() {
    let m = matrix();
    let metrics = analyze(&[1.0, 0.0], &m, &RiskFreeSeries::constant(0.0));
    let rets = [0.02, -0.05, 0.03, 0.01, -0.02, 0.04];
    let ppy = m.periods_per_year();

    assert_abs_diff_eq!(metrics.annual_return, descriptive::mean(&rets) * ppy, epsilon = 1e-12);
    assert_abs_diff_eq!(metrics.win_rate, 4.0 / 6.0, epsilon = 1e-12);
    assert_abs_diff_eq!(metrics.avg_loss, -0.035, epsilon = 1e-12);
    assert!(metrics.max_drawdown > 0.04 && metrics.max_drawdown < 0.06);
    assert!(metrics.cvar_95 >= metrics.var_95);
    assert!(metrics.sharpe.is_finite() && metrics.sortino.is_finite());
  }

  #[test]
  fn sortino_is_floored_without_losses() {
    let metrics = metrics_of(&[0.01, 0.02, 0.015], 12.0, 0.0);
    assert_abs_diff_eq!(metrics.downside_deviation, 0.001);
    assert!(metrics.sortino.is_finite());
    assert_eq!(metrics.max_drawdown, 0.0);
    assert_eq!(metrics.calmar, 0.0);
  }

  #[test]
  fn history_compounds_the_amount() {
    let m = matrix();
    let history = PerformanceHistory::simulate(&[0.0, 1.0], &m, 1000.0);
    let expected = [0.01, 0.005, -0.002, 0.004, 0.006, 0.001]
      .iter()
      .fold(1000.0, |v, r| v * (1.0 + r));

    assert_eq!(history.values.len(), 7);
    assert_eq!(history.dates.len(), 7);
    assert_abs_diff_eq!(history.final_value, expected, epsilon = 1e-9);
    assert_abs_diff_eq!(history.total_return_pct, (expected / 1000.0 - 1.0) * 100.0, epsilon = 1e-9);
    assert!(history.years > 0.4 && history.years < 0.6);
  }
}
