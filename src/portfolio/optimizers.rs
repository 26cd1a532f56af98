//! # Portfolio Objectives
//!
//! $$
//! U(\mathbf w) = \mathbb E[R_p] - \lambda\sigma_p^2 - \alpha\,\mathrm{CVaR}
//! - \beta\max(0, \sigma_p - \sigma^\*)^2 - \gamma\,\mathrm{HHI} + \delta\,\mathrm{Skew}
//! $$
//!
//! Cost functions for the supported strategies (cost is the negated score), the
//! quadratic relaxation used for warm starts and the rule-based fallback
//! allocation.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::solver::neldermead::NelderMead;

use super::data::ProblemData;
use super::data::downside_deviation;
use super::params::OptimizationParams;
use crate::market::AssetCategory;
use crate::stats::descriptive;

/// Smooth enough objective usable by [`super::solver::Solver`].
pub trait Objective:
  CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>
{
  fn name(&self) -> &'static str;
}

pub(crate) fn softmax(x: &[f64]) -> Vec<f64> {
  if x.is_empty() {
    return Vec::new();
  }

  let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = x.iter().map(|&v| (v - max_x).exp()).collect();
  let sum: f64 = exps.iter().sum();

  if sum < 1e-15 {
    vec![1.0 / x.len() as f64; x.len()]
  } else {
    exps.iter().map(|&e| e / sum).collect()
  }
}

/// Central finite-difference gradient.
pub fn central_difference<F>(f: F, x: &[f64], eps: f64) -> Result<Vec<f64>, argmin::core::Error>
where
  F: Fn(&[f64]) -> Result<f64, argmin::core::Error>,
{
  let mut grad = vec![0.0; x.len()];
  let mut probe = x.to_vec();

  for i in 0..x.len() {
    let xi = probe[i];
    probe[i] = xi + eps;
    let f_plus = f(&probe)?;
    probe[i] = xi - eps;
    let f_minus = f(&probe)?;
    probe[i] = xi;
    grad[i] = (f_plus - f_minus) / (2.0 * eps);
  }

  Ok(grad)
}

const FD_STEP: f64 = 1e-6;

/// Blend of Sortino ratio and annual return that tilts toward return as
/// aggressiveness grows. No quadratic variance penalty.
pub struct SortinoObjective<'a> {
  pub data: &'a ProblemData,
  pub aggressiveness: f64,
}

impl<'a> SortinoObjective<'a> {
  pub fn new(data: &'a ProblemData, aggressiveness: f64) -> Self {
    Self {
      data,
      aggressiveness,
    }
  }

  /// Score to maximise.
  pub fn score(&self, w: &[f64]) -> f64 {
    let rets = self.data.portfolio_returns(w);
    let ppy = self.data.periods_per_year;
    let annual = descriptive::mean(&rets) * ppy;
    let sortino = (annual - self.data.risk_free_rate) / downside_deviation(&rets, ppy);

    let s = self.aggressiveness;
    if s >= 0.95 {
      annual
    } else if s >= 0.8 {
      0.2 * sortino + 8.0 * annual
    } else if s >= 0.5 {
      0.5 * sortino + 5.0 * annual
    } else {
      sortino
    }
  }
}

impl CostFunction for SortinoObjective<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    Ok(-self.score(x))
  }
}

impl Gradient for SortinoObjective<'_> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    central_difference(|w| Ok(-self.score(w)), x, FD_STEP)
  }
}

impl Objective for SortinoObjective<'_> {
  fn name(&self) -> &'static str {
    "sortino"
  }
}

/// Penalised utility.
///
/// The quadratic variance term punishes high-volatility, high-return assets
/// hard enough to over-diversify aggressive profiles unless `λ` is very low.
pub struct UtilityObjective<'a> {
  pub data: &'a ProblemData,
  pub params: &'a OptimizationParams,
}

impl<'a> UtilityObjective<'a> {
  pub fn new(data: &'a ProblemData, params: &'a OptimizationParams) -> Self {
    Self { data, params }
  }

  pub fn utility(&self, w: &[f64]) -> f64 {
    let p = self.params;
    let var = self.data.variance(w);
    let vol = var.sqrt();
    let hhi: f64 = w.iter().map(|x| x * x).sum();
    let vol_excess = (vol - p.target_volatility).max(0.0);

    self.data.expected_return(w)
      - p.risk_aversion_lambda * var
      - p.cvar_penalty_alpha * self.data.cvar(w)
      - p.vol_penalty_beta * vol_excess * vol_excess
      - p.concentration_penalty_gamma * hhi
      + p.skewness_reward_delta * self.data.skewness(w)
  }
}

impl CostFunction for UtilityObjective<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    Ok(-self.utility(x))
  }
}

impl Gradient for UtilityObjective<'_> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    central_difference(|w| Ok(-self.utility(w)), x, FD_STEP)
  }
}

impl Objective for UtilityObjective<'_> {
  fn name(&self) -> &'static str {
    "utility"
  }
}

/// Sharpe ratio on the moment model, `μ_e'w / sqrt(w'Σw)`.
pub struct MaxSharpeObjective<'a> {
  pub data: &'a ProblemData,
}

impl<'a> MaxSharpeObjective<'a> {
  pub fn new(data: &'a ProblemData) -> Self {
    Self { data }
  }
}

impl CostFunction for MaxSharpeObjective<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let vol = self.data.volatility(x);
    if vol < 1e-12 {
      return Err(argmin::core::Error::msg("zero portfolio volatility"));
    }
    Ok(-self.data.excess_return(x) / vol)
  }
}

impl Gradient for MaxSharpeObjective<'_> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    let sigma_w = self.data.cov_times(x);
    let var = self.data.variance(x);
    let vol = var.sqrt();
    if vol < 1e-12 {
      return Err(argmin::core::Error::msg("zero portfolio volatility"));
    }
    let ret = self.data.excess_return(x);
    Ok(
      self
        .data
        .mu
        .iter()
        .zip(sigma_w.iter())
        .map(|(m, sw)| -(m / vol - ret * sw / (var * vol)))
        .collect(),
    )
  }
}

impl Objective for MaxSharpeObjective<'_> {
  fn name(&self) -> &'static str {
    "max-sharpe"
  }
}

/// Quadratic relaxation `μ'w - λ w'Σw` on the simplex, parametrised by softmax.
pub struct QuadraticRelaxation<'a> {
  pub data: &'a ProblemData,
  pub risk_aversion: f64,
}

impl CostFunction for QuadraticRelaxation<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let w = softmax(x);
    Ok(-(self.data.excess_return(&w) - self.risk_aversion * self.data.variance(&w)))
  }
}

impl QuadraticRelaxation<'_> {
  /// Solve with Nelder–Mead and map the best simplex vertex back to weights.
  pub fn solve(self, max_iters: u64) -> Result<Vec<f64>, argmin::core::Error> {
    let n = self.data.n_assets();
    let x0 = vec![0.0; n];
    let mut simplex = Vec::with_capacity(n + 1);
    simplex.push(x0.clone());
    for i in 0..n {
      let mut point = x0.clone();
      point[i] = 1.0;
      simplex.push(point);
    }

    let solver = NelderMead::new(simplex).with_sd_tolerance(1e-8)?;
    let res = Executor::new(self, solver)
      .configure(|state| state.max_iters(max_iters))
      .run()?;
    let best_x = res.state.best_param.unwrap_or(x0);
    Ok(softmax(&best_x))
  }
}

/// Rule-based allocation used when the solver gives up.
///
/// Equity gets the middle of the equity range, bonds `min(0.4, 1 - equity)`
/// and the remainder goes to everything else, split equally inside each bucket.
pub fn fallback_allocation(params: &OptimizationParams, data: &ProblemData) -> Vec<f64> {
  let n = data.n_assets();
  let equity = data.category_members(AssetCategory::Equity);
  let bonds = data.category_members(AssetCategory::Bond);
  let other: Vec<usize> = (0..n)
    .filter(|i| !equity.contains(i) && !bonds.contains(i))
    .collect();

  let target_equity = 0.5 * (params.equity_range.0 + params.equity_range.1);
  let target_bonds = (1.0 - target_equity).min(0.4);
  let target_other = (1.0 - target_equity - target_bonds).max(0.0);

  let mut w = vec![0.0; n];
  for (members, share) in [
    (&equity, target_equity),
    (&bonds, target_bonds),
    (&other, target_other),
  ] {
    if !members.is_empty() {
      let each = share / members.len() as f64;
      members.iter().for_each(|&i| w[i] = each);
    }
  }

  let total: f64 = w.iter().sum();
  if total > 0.0 {
    w.iter_mut().for_each(|x| *x /= total);
    w
  } else {
    vec![1.0 / n as f64; n]
  }
}
