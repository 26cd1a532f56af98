//! # Portfolio Data
//!
//! $$
//! r^p_t = \sum_i w_i\,r_{t,i},\qquad \sigma_p = \sqrt{\mathbf w^\top \Sigma \mathbf w}
//! $$
//!
//! In-memory inputs shared by objectives, constraints and analytics for one
//! optimization problem.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;

use crate::market::AssetCategory;
use crate::market::AssetMeta;
use crate::market::MarketModel;
use crate::stats::descriptive;

/// Portfolio-level evaluation of a fixed market.
#[derive(Clone, Debug)]
pub struct ProblemData {
  pub assets: Vec<AssetMeta>,
  /// Annualized expected returns (excess of the risk-free rate when the model is).
  pub mu: Array1<f64>,
  /// Annualized covariance.
  pub cov: Array2<f64>,
  /// Periodic base-currency returns, periods by assets.
  pub returns: Array2<f64>,
  pub periods_per_year: f64,
  /// Average annual risk-free rate.
  pub risk_free_rate: f64,
  /// Whether `mu` excludes the risk-free rate.
  pub excess: bool,
  /// Confidence level of the historical CVaR.
  pub cvar_confidence: f64,
}

impl ProblemData {
  pub fn from_market(market: &MarketModel, cvar_confidence: f64) -> Self {
    Self {
      assets: market.matrix.assets().to_vec(),
      mu: market.moments.mean.clone(),
      cov: market.moments.covariance.clone(),
      returns: market.matrix.values().clone(),
      periods_per_year: market.moments.periods_per_year,
      risk_free_rate: market.moments.risk_free_rate,
      excess: market.moments.excess,
      cvar_confidence,
    }
  }

  pub fn n_assets(&self) -> usize {
    self.mu.len()
  }

  /// Column indices of assets in `category`.
  pub fn category_members(&self, category: AssetCategory) -> Vec<usize> {
    self
      .assets
      .iter()
      .enumerate()
      .filter(|(_, a)| a.category == category)
      .map(|(i, _)| i)
      .collect()
  }

  /// Model expected excess return `μ'w`.
  pub fn excess_return(&self, w: &[f64]) -> f64 {
    let excess = self.mu.dot(&ArrayView1::from(w));
    if self.excess {
      excess
    } else {
      excess - self.risk_free_rate
    }
  }

  /// Model expected total return, risk-free rate included.
  pub fn expected_return(&self, w: &[f64]) -> f64 {
    self.excess_return(w) + self.risk_free_rate
  }

  /// `Σ w`.
  pub fn cov_times(&self, w: &[f64]) -> Array1<f64> {
    self.cov.dot(&ArrayView1::from(w))
  }

  pub fn variance(&self, w: &[f64]) -> f64 {
    ArrayView1::from(w).dot(&self.cov_times(w)).max(0.0)
  }

  pub fn volatility(&self, w: &[f64]) -> f64 {
    self.variance(w).sqrt()
  }

  /// Realized periodic portfolio returns.
  pub fn portfolio_returns(&self, w: &[f64]) -> Vec<f64> {
    self.returns.dot(&ArrayView1::from(w)).to_vec()
  }

  /// Historical annualized return `mean(r^p) · P`.
  pub fn annual_return(&self, w: &[f64]) -> f64 {
    descriptive::mean(&self.portfolio_returns(w)) * self.periods_per_year
  }

  /// Historical CVaR as a positive loss, scaled by `sqrt(P)`.
  pub fn cvar(&self, w: &[f64]) -> f64 {
    let (_, cvar) = descriptive::var_cvar(&self.portfolio_returns(w), self.cvar_confidence);
    cvar * self.periods_per_year.sqrt()
  }

  pub fn max_drawdown(&self, w: &[f64]) -> f64 {
    descriptive::max_drawdown(&self.portfolio_returns(w))
  }

  pub fn skewness(&self, w: &[f64]) -> f64 {
    descriptive::skewness(&self.portfolio_returns(w))
  }

  /// Annualized downside deviation with a `0.001` floor.
  pub fn downside_deviation(&self, w: &[f64]) -> f64 {
    downside_deviation(&self.portfolio_returns(w), self.periods_per_year)
  }

  /// `(annual_return - r_f) / downside_deviation`.
  pub fn sortino(&self, w: &[f64]) -> f64 {
    let rets = self.portfolio_returns(w);
    let annual = descriptive::mean(&rets) * self.periods_per_year;
    (annual - self.risk_free_rate) / downside_deviation(&rets, self.periods_per_year)
  }
}

/// Floor applied to the downside deviation when fewer than two periods are negative.
pub const DOWNSIDE_FLOOR: f64 = 0.001;

pub fn downside_deviation(returns: &[f64], periods_per_year: f64) -> f64 {
  match descriptive::downside_std(returns) {
    Some(sd) if sd > 0.0 => sd * periods_per_year.sqrt(),
    _ => DOWNSIDE_FLOOR,
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  /// Two uncorrelated assets with a short synthetic history.
  pub(crate) fn two_asset(mu: [f64; 2], var: [f64; 2]) -> ProblemData {
    let returns = array![
      [0.02, 0.01],
      [-0.01, 0.005],
      [0.03, -0.002],
      [0.01, 0.004],
      [-0.02, 0.006],
      [0.015, 0.001]
    ];
    ProblemData {
      assets: vec![
        AssetMeta::new("EQ", AssetCategory::Equity, "US", "ILS"),
        AssetMeta::new("BD", AssetCategory::Bond, "IL", "ILS"),
      ],
      mu: Array1::from(mu.to_vec()),
      cov: Array2::from_diag(&Array1::from(var.to_vec())),
      returns,
      periods_per_year: 12.0,
      risk_free_rate: 0.0,
      excess: true,
      cvar_confidence: 0.95,
    }
  }

  #[test]
  fn sortino_is_finite_without_negative_periods() {
    let mut data = two_asset([0.1, 0.05], [0.04, 0.01]);
    data.returns.mapv_inplace(f64::abs);
    let s = data.sortino(&[0.5, 0.5]);
    assert!(s.is_finite());
    assert_abs_diff_eq!(data.downside_deviation(&[0.5, 0.5]), DOWNSIDE_FLOOR);
  }

  #[test]
  fn volatility_matches_diagonal_covariance() {
    let data = two_asset([0.1, 0.05], [0.04, 0.01]);
    let w = [0.5, 0.5];
    assert_abs_diff_eq!(
      data.volatility(&w),
      (0.25 * 0.04 + 0.25 * 0.01_f64).sqrt(),
      epsilon = 1e-12
    );
    assert_abs_diff_eq!(data.expected_return(&w), 0.075, epsilon = 1e-12);
  }

  #[test]
  fn category_members_follow_metadata() {
    let data = two_asset([0.1, 0.05], [0.04, 0.01]);
    assert_eq!(data.category_members(AssetCategory::Bond), vec![1]);
    assert!(data.category_members(AssetCategory::Reit).is_empty());
  }
}
