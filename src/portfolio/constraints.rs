//! # Constraints
//!
//! $$
//! \mathcal W = \{\mathbf w : \ell \le \mathbf w \le u,\ \mathbf 1^\top \mathbf w = 1\},
//! \qquad g_j(\mathbf w) \le 0
//! $$
//!
//! Box-and-budget feasible region with an exact Euclidean projection, plus the
//! nonlinear inequality constraints handled by the augmented Lagrangian.

use serde::Deserialize;
use serde::Serialize;

use super::data::ProblemData;
use super::optimizers::central_difference;
use super::params::OptimizationParams;
use super::types::StrategyKind;
use crate::market::AssetCategory;

/// Per-asset bounds together with the budget `Σw = 1`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
  pub lower: Vec<f64>,
  pub upper: Vec<f64>,
}

impl Region {
  pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
    Self { lower, upper }
  }

  /// Long-only region with a common ceiling.
  pub fn long_only(n: usize, cap: f64) -> Self {
    Self::new(vec![0.0; n], vec![cap; n])
  }

  pub fn dim(&self) -> usize {
    self.lower.len()
  }

  /// Non-empty iff every box is valid and `Σl ≤ 1 ≤ Σu`.
  pub fn is_feasible(&self) -> bool {
    if self.lower.len() != self.upper.len() || self.lower.is_empty() {
      return false;
    }
    let boxes_ok = self
      .lower
      .iter()
      .zip(&self.upper)
      .all(|(l, u)| l.is_finite() && u.is_finite() && l <= u);
    let lo: f64 = self.lower.iter().sum();
    let hi: f64 = self.upper.iter().sum();
    boxes_ok && lo <= 1.0 + 1e-12 && hi >= 1.0 - 1e-12
  }

  /// Whether `w` lies in the region within `tol`.
  pub fn contains(&self, w: &[f64], tol: f64) -> bool {
    let sum: f64 = w.iter().sum();
    (sum - 1.0).abs() <= tol
      && w
        .iter()
        .zip(self.lower.iter().zip(&self.upper))
        .all(|(x, (l, u))| *x >= l - tol && *x <= u + tol)
  }

  /// Euclidean projection: `w_i = clamp(v_i - τ, l_i, u_i)` with `τ` found by bisection.
  pub fn project(&self, v: &[f64]) -> Vec<f64> {
    let clamp_at = |tau: f64| -> Vec<f64> {
      v.iter()
        .zip(self.lower.iter().zip(&self.upper))
        .map(|(x, (l, u))| (x - tau).clamp(*l, *u))
        .collect()
    };

    let mut lo = v
      .iter()
      .zip(&self.upper)
      .map(|(x, u)| x - u)
      .fold(f64::INFINITY, f64::min);
    let mut hi = v
      .iter()
      .zip(&self.lower)
      .map(|(x, l)| x - l)
      .fold(f64::NEG_INFINITY, f64::max);

    for _ in 0..200 {
      let mid = 0.5 * (lo + hi);
      let sum: f64 = clamp_at(mid).iter().sum();
      if sum > 1.0 {
        lo = mid;
      } else {
        hi = mid;
      }
      if hi - lo < 1e-15 {
        break;
      }
    }

    clamp_at(0.5 * (lo + hi))
  }

  /// Equal weights clipped to the ceilings, renormalised and projected.
  pub fn equal_weight_start(&self) -> Vec<f64> {
    let n = self.dim();
    let clipped: Vec<f64> = self.upper.iter().map(|u| (1.0 / n as f64).min(*u)).collect();
    let total: f64 = clipped.iter().sum();
    let start: Vec<f64> = if total > 0.0 {
      clipped.iter().map(|w| w / total).collect()
    } else {
      vec![1.0 / n as f64; n]
    };
    self.project(&start)
  }
}

/// Inequality constraint in the form `g(w) ≤ 0`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
  /// `Σ_{i∈members} w_i ≤ limit`.
  GroupMax {
    label: String,
    members: Vec<usize>,
    limit: f64,
  },
  /// `Σ_{i∈members} w_i ≥ limit`.
  GroupMin {
    label: String,
    members: Vec<usize>,
    limit: f64,
  },
  /// `sqrt(w'Σw) ≤ limit`.
  Volatility { limit: f64 },
  /// Historical CVaR `≤ limit`.
  Cvar { limit: f64 },
  /// Historical maximum drawdown `≤ limit`.
  Drawdown { limit: f64 },
  /// Expected total return `≥ limit`.
  MinReturn { limit: f64 },
}

const FD_STEP: f64 = 1e-6;

impl Constraint {
  pub fn label(&self) -> String {
    match self {
      Constraint::GroupMax { label, .. } => format!("{label} max"),
      Constraint::GroupMin { label, .. } => format!("{label} min"),
      Constraint::Volatility { .. } => "volatility".into(),
      Constraint::Cvar { .. } => "cvar".into(),
      Constraint::Drawdown { .. } => "drawdown".into(),
      Constraint::MinReturn { .. } => "min return".into(),
    }
  }

  /// Constraint value; feasible when `≤ 0`.
  pub fn value(&self, w: &[f64], data: &ProblemData) -> f64 {
    match self {
      Constraint::GroupMax { members, limit, .. } => members.iter().map(|&i| w[i]).sum::<f64>() - limit,
      Constraint::GroupMin { members, limit, .. } => limit - members.iter().map(|&i| w[i]).sum::<f64>(),
      Constraint::Volatility { limit } => data.volatility(w) - limit,
      Constraint::Cvar { limit } => data.cvar(w) - limit,
      Constraint::Drawdown { limit } => data.max_drawdown(w) - limit,
      Constraint::MinReturn { limit } => limit - data.expected_return(w),
    }
  }

  pub fn gradient(&self, w: &[f64], data: &ProblemData) -> Vec<f64> {
    let n = w.len();
    match self {
      Constraint::GroupMax { members, .. } => {
        let mut g = vec![0.0; n];
        members.iter().for_each(|&i| g[i] = 1.0);
        g
      }
      Constraint::GroupMin { members, .. } => {
        let mut g = vec![0.0; n];
        members.iter().for_each(|&i| g[i] = -1.0);
        g
      }
      Constraint::Volatility { .. } => {
        let vol = data.volatility(w);
        if vol <= 1e-12 {
          return vec![0.0; n];
        }
        data.cov_times(w).iter().map(|x| x / vol).collect()
      }
      Constraint::MinReturn { .. } => data.mu.iter().map(|m| -m).collect(),
      Constraint::Cvar { .. } | Constraint::Drawdown { .. } => {
        central_difference(|x| Ok(self.value(x, data)), w, FD_STEP).unwrap_or_else(|_| vec![0.0; n])
      }
    }
  }
}

/// Complete constraint set for one strategy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConstraints {
  pub region: Region,
  pub inequalities: Vec<Constraint>,
}

impl OptimizationConstraints {
  /// Derive the constraint set of `strategy` from `params` over the assets of `data`.
  pub fn build(
    strategy: StrategyKind,
    params: &OptimizationParams,
    data: &ProblemData,
    min_expected_return: Option<f64>,
  ) -> Self {
    let n = data.n_assets();
    let mut inequalities = Vec::new();

    let region = match strategy {
      StrategyKind::Sortino => {
        let upper = data
          .assets
          .iter()
          .map(|a| params.sortino_weight_cap(a.risk_class()).min(1.0))
          .collect();
        if let Some(limit) = params.sortino_drawdown_limit() {
          inequalities.push(Constraint::Drawdown { limit });
        }
        Region::new(vec![0.0; n], upper)
      }
      StrategyKind::Utility => {
        let equities = data.category_members(AssetCategory::Equity);
        if !equities.is_empty() {
          let (lo, hi) = params.equity_range;
          inequalities.push(Constraint::GroupMin {
            label: "equity".into(),
            members: equities.clone(),
            limit: lo,
          });
          inequalities.push(Constraint::GroupMax {
            label: "equity".into(),
            members: equities,
            limit: hi,
          });
        }
        let bonds = data.category_members(AssetCategory::Bond);
        if !bonds.is_empty() && params.bond_min > 0.0 {
          inequalities.push(Constraint::GroupMin {
            label: "bond".into(),
            members: bonds,
            limit: params.bond_min,
          });
        }
        inequalities.push(Constraint::Volatility {
          limit: params.max_volatility,
        });
        inequalities.push(Constraint::Cvar {
          limit: params.max_cvar,
        });
        Region::long_only(n, params.max_single_asset)
      }
      StrategyKind::MaxSharpe => Region::long_only(n, params.max_single_asset.max(1.0 / n as f64)),
    };

    if let Some(limit) = min_expected_return {
      inequalities.push(Constraint::MinReturn { limit });
    }

    Self {
      region,
      inequalities,
    }
  }

  /// Largest constraint value; `≤ 0` when every inequality holds.
  pub fn max_violation(&self, w: &[f64], data: &ProblemData) -> f64 {
    self
      .inequalities
      .iter()
      .map(|c| c.value(w, data))
      .fold(0.0, f64::max)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::portfolio::data::tests::two_asset;

  #[test]
  fn projection_lands_in_region() {
    let region = Region::new(vec![0.0; 4], vec![0.4; 4]);
    let w = region.project(&[2.0, -1.0, 0.3, 0.1]);
    assert!(region.contains(&w, 1e-9));
    assert_abs_diff_eq!(w[0], 0.4, epsilon = 1e-9);
    assert_abs_diff_eq!(w[1], 0.0, epsilon = 1e-9);
  }

  #[test]
  fn projection_is_identity_inside() {
    let region = Region::long_only(3, 1.0);
    let v = [0.2, 0.3, 0.5];
    let w = region.project(&v);
    for (a, b) in v.iter().zip(&w) {
      assert_abs_diff_eq!(a, b, epsilon = 1e-9);
    }
  }

  #[test]
  fn infeasible_when_caps_too_tight() {
    assert!(!Region::long_only(3, 0.2).is_feasible());
    assert!(Region::long_only(5, 0.2).is_feasible());
    assert!(!Region::new(vec![0.6, 0.6], vec![1.0, 1.0]).is_feasible());
  }

  #[test]
  fn equal_weight_start_respects_caps() {
    let region = Region::new(vec![0.0; 3], vec![0.1, 0.6, 0.6]);
    let w = region.equal_weight_start();
    assert!(region.contains(&w, 1e-9));
    assert!(w[0] <= 0.1 + 1e-12);
  }

  #[test]
  fn group_and_volatility_values() {
    let data = two_asset([0.1, 0.05], [0.04, 0.01]);
    let w = [0.7, 0.3];
    let g = Constraint::GroupMax {
      label: "equity".into(),
      members: vec![0],
      limit: 0.5,
    };
    assert_abs_diff_eq!(g.value(&w, &data), 0.2, epsilon = 1e-12);
    assert_eq!(g.gradient(&w, &data), vec![1.0, 0.0]);

    let v = Constraint::Volatility { limit: 0.1 };
    let grad = v.gradient(&w, &data);
    let fd = central_difference(|x| Ok(v.value(x, &data)), &w, 1e-6).unwrap();
    for (a, b) in grad.iter().zip(&fd) {
      assert_abs_diff_eq!(a, b, epsilon = 1e-6);
    }
  }

  #[test]
  fn utility_constraints_include_category_bounds() {
    let data = two_asset([0.1, 0.05], [0.04, 0.01]);
    let params = OptimizationParams::from_scores(30.0, 30.0, 50.0, 10.0);
    let c = OptimizationConstraints::build(StrategyKind::Utility, &params, &data, None);
    let labels: Vec<String> = c.inequalities.iter().map(|c| c.label()).collect();
    assert!(labels.contains(&"equity max".to_string()));
    assert!(labels.contains(&"bond min".to_string()));
    assert!(labels.contains(&"cvar".to_string()));
  }
}
