//! # Solver
//!
//! $$
//! \mathcal L_\rho(\mathbf w, \mathbf y) = f(\mathbf w)
//! + \frac{1}{2\rho}\sum_j \left(\max(0, y_j + \rho\,g_j(\mathbf w))^2 - y_j^2\right)
//! $$
//!
//! Augmented Lagrangian (PHR) outer loop over the nonlinear inequalities, with a
//! spectral projected-gradient inner solve on the box-and-budget region. The
//! run is a small state machine and always yields weights: either a converged
//! solution or the rule-based fallback with the reason it was used.

use std::time::Duration;
use std::time::Instant;

use argmin::core::CostFunction;
use argmin::core::Gradient;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use super::constraints::Constraint;
use super::constraints::OptimizationConstraints;
use super::constraints::Region;
use super::data::ProblemData;
use super::optimizers::Objective;
use super::optimizers::QuadraticRelaxation;
use super::types::FallbackReason;
use crate::error::PortfolioError;
use crate::error::Result;

/// Configuration for [`Solver`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
  pub max_outer_iters: usize,
  pub max_inner_iters: usize,
  /// Relative objective change that counts as stationary.
  pub ftol: f64,
  /// Largest tolerated constraint violation.
  pub ctol: f64,
  /// Wall-clock budget for one solve, in milliseconds.
  pub time_budget_ms: u64,
  /// Run the quadratic-relaxation warm start before refinement.
  pub warm_start: bool,
  pub warm_start_iters: u64,
  pub initial_penalty: f64,
  pub penalty_growth: f64,
  pub max_penalty: f64,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      max_outer_iters: 50,
      max_inner_iters: 500,
      ftol: 1e-9,
      ctol: 1e-6,
      time_budget_ms: 2000,
      warm_start: true,
      warm_start_iters: 2000,
      initial_penalty: 10.0,
      penalty_growth: 10.0,
      max_penalty: 1e8,
    }
  }
}

impl SolverConfig {
  pub fn validate(&self) -> Result<()> {
    if self.max_outer_iters == 0 || self.max_inner_iters == 0 {
      return Err(PortfolioError::Config("iteration limits must be positive".into()));
    }
    if !(self.ftol > 0.0 && self.ctol > 0.0) {
      return Err(PortfolioError::Config("tolerances must be positive".into()));
    }
    if self.time_budget_ms == 0 {
      return Err(PortfolioError::Config("time_budget_ms must be positive".into()));
    }
    if !(self.initial_penalty > 0.0 && self.penalty_growth > 1.0 && self.max_penalty >= self.initial_penalty) {
      return Err(PortfolioError::Config("invalid penalty schedule".into()));
    }
    Ok(())
  }
}

/// Stage of a solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverPhase {
  Init,
  ConvexWarmStart,
  NonconvexRefine,
  Converged,
  Fallback,
}

/// Weights returned by [`Solver::solve`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Solution {
  Converged {
    weights: Vec<f64>,
    /// Total inner iterations.
    iterations: usize,
  },
  Fallback {
    weights: Vec<f64>,
    reason: FallbackReason,
  },
}

impl Solution {
  pub fn weights(&self) -> &[f64] {
    match self {
      Solution::Converged { weights, .. } | Solution::Fallback { weights, .. } => weights,
    }
  }

  pub fn converged(&self) -> bool {
    matches!(self, Solution::Converged { .. })
  }

  pub fn fallback_reason(&self) -> Option<FallbackReason> {
    match self {
      Solution::Converged { .. } => None,
      Solution::Fallback { reason, .. } => Some(*reason),
    }
  }

  pub fn phase(&self) -> SolverPhase {
    match self {
      Solution::Converged { .. } => SolverPhase::Converged,
      Solution::Fallback { .. } => SolverPhase::Fallback,
    }
  }
}

/// Augmented Lagrangian of an objective for fixed multipliers and penalty.
struct AugmentedLagrangian<'a, O> {
  objective: &'a O,
  constraints: &'a [Constraint],
  data: &'a ProblemData,
  multipliers: &'a [f64],
  penalty: f64,
}

impl<O: Objective> CostFunction for AugmentedLagrangian<'_, O> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let mut value = self.objective.cost(x)?;
    for (c, y) in self.constraints.iter().zip(self.multipliers) {
      let shifted = (y + self.penalty * c.value(x, self.data)).max(0.0);
      value += (shifted * shifted - y * y) / (2.0 * self.penalty);
    }
    Ok(value)
  }
}

impl<O: Objective> Gradient for AugmentedLagrangian<'_, O> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> std::result::Result<Self::Gradient, argmin::core::Error> {
    let mut grad = self.objective.gradient(x)?;
    for (c, y) in self.constraints.iter().zip(self.multipliers) {
      let shifted = (y + self.penalty * c.value(x, self.data)).max(0.0);
      if shifted > 0.0 {
        for (g, dc) in grad.iter_mut().zip(c.gradient(x, self.data)) {
          *g += shifted * dc;
        }
      }
    }
    Ok(grad)
  }
}

enum InnerStop {
  Done { x: Vec<f64>, iterations: usize },
  Failed(FallbackReason),
}

/// Bounded constrained optimizer.
#[derive(Clone, Debug, Default)]
pub struct Solver {
  config: SolverConfig,
}

impl Solver {
  pub fn new(config: SolverConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SolverConfig {
    &self.config
  }

  /// Minimise `objective` over `constraints`.
  ///
  /// `fallback` is returned, with the reason, whenever the solve cannot produce
  /// a feasible stationary point within its limits.
  #[tracing::instrument(skip_all, fields(objective = objective.name(), n = data.n_assets()))]
  pub fn solve<O: Objective>(
    &self,
    objective: &O,
    constraints: &OptimizationConstraints,
    data: &ProblemData,
    warm_start: Option<QuadraticRelaxation<'_>>,
    fallback: Vec<f64>,
  ) -> Solution {
    let started = Instant::now();
    let deadline = started + Duration::from_millis(self.config.time_budget_ms);
    let region = &constraints.region;

    let mut phase = SolverPhase::Init;
    let mut warm_start = warm_start;
    let mut x = Vec::new();
    let mut outcome: std::result::Result<(Vec<f64>, usize), FallbackReason> =
      Err(FallbackReason::IterationLimit);

    while !matches!(phase, SolverPhase::Converged | SolverPhase::Fallback) {
      debug!(?phase, elapsed_ms = started.elapsed().as_millis() as u64, "solver phase");
      phase = match phase {
        SolverPhase::Init => {
          if region.dim() != data.n_assets() || !region.is_feasible() {
            outcome = Err(FallbackReason::Infeasible);
            SolverPhase::Fallback
          } else {
            x = region.equal_weight_start();
            if self.config.warm_start && warm_start.is_some() {
              SolverPhase::ConvexWarmStart
            } else {
              SolverPhase::NonconvexRefine
            }
          }
        }
        SolverPhase::ConvexWarmStart => {
          if let Some(relaxation) = warm_start.take() {
            match relaxation.solve(self.config.warm_start_iters) {
              Ok(w) if w.iter().all(|v| v.is_finite()) => x = region.project(&w),
              Ok(_) => warn!("warm start produced non-finite weights; using equal weights"),
              Err(err) => warn!(%err, "warm start failed; using equal weights"),
            }
          }
          SolverPhase::NonconvexRefine
        }
        SolverPhase::NonconvexRefine => {
          outcome = self.refine(objective, constraints, data, std::mem::take(&mut x), deadline);
          if outcome.is_ok() {
            SolverPhase::Converged
          } else {
            SolverPhase::Fallback
          }
        }
        terminal => terminal,
      };
    }

    match outcome {
      Ok((weights, iterations)) => {
        debug!(iterations, elapsed_ms = started.elapsed().as_millis() as u64, "converged");
        Solution::Converged {
          weights,
          iterations,
        }
      }
      Err(reason) => self.fall_back(fallback, reason),
    }
  }

  fn fall_back(&self, weights: Vec<f64>, reason: FallbackReason) -> Solution {
    warn!(%reason, "solver fell back to rule-based allocation");
    Solution::Fallback { weights, reason }
  }

  /// Augmented Lagrangian outer loop.
  fn refine<O: Objective>(
    &self,
    objective: &O,
    constraints: &OptimizationConstraints,
    data: &ProblemData,
    mut x: Vec<f64>,
    deadline: Instant,
  ) -> std::result::Result<(Vec<f64>, usize), FallbackReason> {
    let cfg = &self.config;
    let ineq = &constraints.inequalities;
    let mut multipliers = vec![0.0; ineq.len()];
    let mut penalty = cfg.initial_penalty;
    let mut total_iters = 0;
    let mut prev_f: Option<f64> = None;
    let mut prev_violation = f64::INFINITY;

    for outer in 0..cfg.max_outer_iters {
      if Instant::now() > deadline {
        return Err(FallbackReason::TimeBudget);
      }

      let lagrangian = AugmentedLagrangian {
        objective,
        constraints: ineq,
        data,
        multipliers: &multipliers,
        penalty,
      };
      let inner_converged = match self.projected_gradient(&lagrangian, &constraints.region, x, deadline) {
        InnerStop::Done { x: next, iterations } => {
          total_iters += iterations;
          x = next;
          iterations < cfg.max_inner_iters
        }
        InnerStop::Failed(reason) => return Err(reason),
      };

      let values: Vec<f64> = ineq.iter().map(|c| c.value(&x, data)).collect();
      let violation = values.iter().copied().fold(0.0, f64::max);
      let f = objective.cost(&x).map_err(|_| FallbackReason::ObjectiveError)?;
      if !f.is_finite() || values.iter().any(|v| !v.is_finite()) {
        return Err(FallbackReason::NonFinite);
      }

      for (y, g) in multipliers.iter_mut().zip(&values) {
        *y = (*y + penalty * g).max(0.0);
      }

      let stalled = prev_f.is_some_and(|p| (p - f).abs() <= cfg.ftol * (1.0 + f.abs()));
      debug!(outer, f, violation, penalty, "outer iteration");
      if violation <= cfg.ctol && (stalled || (ineq.is_empty() && inner_converged)) {
        return Ok((x, total_iters));
      }

      if violation > 0.25 * prev_violation {
        penalty = (penalty * cfg.penalty_growth).min(cfg.max_penalty);
      }
      prev_violation = violation;
      prev_f = Some(f);
    }

    Err(FallbackReason::IterationLimit)
  }

  /// Spectral projected gradient with Armijo backtracking.
  fn projected_gradient<P>(&self, problem: &P, region: &Region, x0: Vec<f64>, deadline: Instant) -> InnerStop
  where
    P: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
  {
    let cfg = &self.config;
    let mut x = region.project(&x0);
    let (mut f, mut g) = match (problem.cost(&x), problem.gradient(&x)) {
      (Ok(f), Ok(g)) => (f, g),
      _ => return InnerStop::Failed(FallbackReason::ObjectiveError),
    };
    if !f.is_finite() || g.iter().any(|v| !v.is_finite()) {
      return InnerStop::Failed(FallbackReason::NonFinite);
    }

    let g_norm = g.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let mut step = if g_norm > 0.0 { (1.0 / g_norm).clamp(1e-10, 1e3) } else { 1.0 };

    for it in 0..cfg.max_inner_iters {
      if Instant::now() > deadline {
        return InnerStop::Failed(FallbackReason::TimeBudget);
      }

      let trial: Vec<f64> = x.iter().zip(&g).map(|(xi, gi)| xi - step * gi).collect();
      let projected = region.project(&trial);
      let d: Vec<f64> = projected.iter().zip(&x).map(|(p, xi)| p - xi).collect();
      let d_norm = d.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
      if d_norm <= 1e-12 {
        return InnerStop::Done { x, iterations: it };
      }

      let slope: f64 = g.iter().zip(&d).map(|(gi, di)| gi * di).sum();
      let mut t = 1.0;
      let mut accepted = None;
      for _ in 0..40 {
        let candidate: Vec<f64> = x.iter().zip(&d).map(|(xi, di)| xi + t * di).collect();
        match problem.cost(&candidate) {
          Ok(fc) if fc.is_finite() && fc <= f + 1e-4 * t * slope => {
            accepted = Some((candidate, fc));
            break;
          }
          Ok(_) => t *= 0.5,
          Err(_) => return InnerStop::Failed(FallbackReason::ObjectiveError),
        }
      }
      let Some((x_next, f_next)) = accepted else {
        return InnerStop::Done { x, iterations: it };
      };

      let g_next = match problem.gradient(&x_next) {
        Ok(g) if g.iter().all(|v| v.is_finite()) => g,
        Ok(_) => return InnerStop::Failed(FallbackReason::NonFinite),
        Err(_) => return InnerStop::Failed(FallbackReason::ObjectiveError),
      };

      let s: Vec<f64> = x_next.iter().zip(&x).map(|(a, b)| a - b).collect();
      let y: Vec<f64> = g_next.iter().zip(&g).map(|(a, b)| a - b).collect();
      let sy: f64 = s.iter().zip(&y).map(|(a, b)| a * b).sum();
      let ss: f64 = s.iter().map(|v| v * v).sum();
      step = if sy > 1e-16 { (ss / sy).clamp(1e-10, 1e3) } else { 1e3 };

      let change = (f - f_next).abs();
      x = x_next;
      g = g_next;
      let f_prev = f;
      f = f_next;
      if change <= cfg.ftol * (1.0 + f_prev.abs()) {
        return InnerStop::Done { x, iterations: it + 1 };
      }
    }

    InnerStop::Done {
      x,
      iterations: cfg.max_inner_iters,
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use tracing_test::traced_test;

  use super::*;
  use crate::portfolio::data::tests::two_asset;
  use crate::portfolio::optimizers::MaxSharpeObjective;
  use crate::portfolio::optimizers::SortinoObjective;

  fn budget_only(n: usize) -> OptimizationConstraints {
    OptimizationConstraints {
      region: Region::long_only(n, 1.0),
      inequalities: Vec::new(),
    }
  }

  #[test]
  fn two_asset_max_sharpe_matches_closed_form() {
    let data = two_asset([0.10, 0.06], [0.04, 0.01]);
    let objective = MaxSharpeObjective::new(&data);
    let solution = Solver::default().solve(&objective, &budget_only(2), &data, None, vec![0.5, 0.5]);

    // w ∝ Σ⁻¹μ = (2.5, 6.0)
    let expected = [2.5 / 8.5, 6.0 / 8.5];
    assert!(solution.converged());
    for (w, e) in solution.weights().iter().zip(expected) {
      assert_abs_diff_eq!(*w, e, epsilon = 1e-3);
    }
  }

  #[test]
  fn warm_start_does_not_change_the_optimum() {
    let data = two_asset([0.10, 0.06], [0.04, 0.01]);
    let objective = MaxSharpeObjective::new(&data);
    let relaxation = QuadraticRelaxation {
      data: &data,
      risk_aversion: 2.0,
    };
    let solution = Solver::default().solve(&objective, &budget_only(2), &data, Some(relaxation), vec![0.5, 0.5]);
    assert!(solution.converged());
    assert_abs_diff_eq!(solution.weights()[0], 2.5 / 8.5, epsilon = 1e-3);
  }

  #[test]
  fn respects_box_and_group_constraints() {
    let data = two_asset([0.10, 0.06], [0.04, 0.01]);
    let objective = SortinoObjective::new(&data, 0.97);
    let constraints = OptimizationConstraints {
      region: Region::new(vec![0.0, 0.0], vec![0.8, 1.0]),
      inequalities: vec![Constraint::GroupMax {
        label: "equity".into(),
        members: vec![0],
        limit: 0.6,
      }],
    };
    let solution = Solver::default().solve(&objective, &constraints, &data, None, vec![0.5, 0.5]);
    let w = solution.weights();
    assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    assert!(w.iter().all(|v| *v >= -1e-6));
    assert!(w[0] <= 0.6 + 1e-4);
  }

  #[traced_test]
  #[test]
  fn infeasible_region_falls_back() {
    let data = two_asset([0.10, 0.06], [0.04, 0.01]);
    let objective = MaxSharpeObjective::new(&data);
    let constraints = OptimizationConstraints {
      region: Region::long_only(2, 0.3),
      inequalities: Vec::new(),
    };
    let fallback = vec![0.5, 0.5];
    let solution = Solver::default().solve(&objective, &constraints, &data, None, fallback.clone());
    assert_eq!(
      solution,
      Solution::Fallback {
        weights: fallback,
        reason: FallbackReason::Infeasible
      }
    );
    assert_eq!(solution.phase(), SolverPhase::Fallback);
    assert!(logs_contain("solver fell back"));
  }

  #[test]
  fn exhausted_budget_falls_back() {
    let data = two_asset([0.10, 0.06], [0.04, 0.01]);
    let objective = SortinoObjective::new(&data, 0.3);
    let constraints = OptimizationConstraints {
      region: Region::long_only(2, 1.0),
      inequalities: vec![Constraint::Volatility { limit: 0.01 }],
    };
    let solver = Solver::new(SolverConfig {
      max_outer_iters: 2,
      max_inner_iters: 3,
      ..SolverConfig::default()
    });
    let solution = solver.solve(&objective, &constraints, &data, None, vec![0.5, 0.5]);
    assert!(!solution.converged());
    assert!(matches!(
      solution.fallback_reason(),
      Some(FallbackReason::IterationLimit) | Some(FallbackReason::TimeBudget)
    ));
  }

  /// Quadratic pull towards `target` whose every evaluation takes `delay`.
  struct SlowObjective {
    target: Vec<f64>,
    delay: Duration,
  }

  impl CostFunction for SlowObjective {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
      std::thread::sleep(self.delay);
      Ok(x.iter().zip(&self.target).map(|(a, b)| (a - b).powi(2)).sum())
    }
  }

  impl Gradient for SlowObjective {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, x: &Self::Param) -> std::result::Result<Self::Gradient, argmin::core::Error> {
      Ok(x.iter().zip(&self.target).map(|(a, b)| 2.0 * (a - b)).collect())
    }
  }

  impl Objective for SlowObjective {
    fn name(&self) -> &'static str {
      "slow"
    }
  }

  #[traced_test]
  #[test]
  fn overrunning_the_time_budget_falls_back() {
    let data = two_asset([0.10, 0.06], [0.04, 0.01]);
    let objective = SlowObjective {
      target: vec![0.9, 0.1],
      delay: Duration::from_millis(5),
    };
    let solver = Solver::new(SolverConfig {
      time_budget_ms: 1,
      warm_start: false,
      ..SolverConfig::default()
    });
    let fallback = vec![0.25, 0.75];
    let solution = solver.solve(&objective, &budget_only(2), &data, None, fallback.clone());

    assert_eq!(solution.fallback_reason(), Some(FallbackReason::TimeBudget));
    assert_eq!(
      solution,
      Solution::Fallback {
        weights: fallback,
        reason: FallbackReason::TimeBudget
      }
    );
    assert!(logs_contain("solver fell back"));
  }

  #[test]
  fn config_validation() {
    assert!(SolverConfig::default().validate().is_ok());
    let bad = SolverConfig {
      penalty_growth: 1.0,
      ..SolverConfig::default()
    };
    assert!(bad.validate().is_err());
  }
}
