//! # Engine
//!
//! $$
//! \text{answers} \xrightarrow{\text{assess}} \text{profile}
//! \xrightarrow{\text{params}} (f, \mathcal W)
//! \xrightarrow{\text{solve}} \mathbf w^\*
//! \xrightarrow{\text{analyze}} \text{result}
//! $$
//!
//! End-to-end allocation pipeline over a shared market model.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use super::analytics;
use super::analytics::PerformanceHistory;
use super::constraints::OptimizationConstraints;
use super::data::ProblemData;
use super::optimizers::fallback_allocation;
use super::optimizers::MaxSharpeObjective;
use super::optimizers::QuadraticRelaxation;
use super::optimizers::SortinoObjective;
use super::optimizers::UtilityObjective;
use super::params::OptimizationParams;
use super::solver::Solution;
use super::solver::Solver;
use super::types::AllocationOutcome;
use super::types::BlockedAssessment;
use super::types::OptimizationRequest;
use super::types::OptimizationResult;
use super::types::StrategyKind;
use crate::config::EngineConfig;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::kyc;
use crate::kyc::QuestionnaireResponse;
use crate::kyc::RiskProfile;
use crate::kyc::Severity;
use crate::market::AssetSeries;
use crate::market::CacheKey;
use crate::market::FxSeries;
use crate::market::MarketModel;
use crate::market::ModelCache;
use crate::market::ReturnModelBuilder;
use crate::market::RiskFreeSeries;

/// Allocation pipeline bound to one market model.
///
/// Cheap to clone and safe to share across threads; every request is solved
/// independently against the same immutable model.
#[derive(Clone, Debug)]
pub struct PortfolioEngine {
  config: EngineConfig,
  market: Arc<MarketModel>,
  solver: Solver,
}

impl PortfolioEngine {
  pub fn new(config: EngineConfig, market: Arc<MarketModel>) -> Result<Self> {
    config.validate()?;
    let solver = Solver::new(config.solver.clone());
    Ok(Self {
      config,
      market,
      solver,
    })
  }

  /// Build (or reuse) the market model for `assets` through `cache`.
  ///
  /// The cache key combines `query`, the asset names and the market
  /// configuration, so a changed config never reuses a stale model.
  pub fn from_series(
    config: EngineConfig,
    cache: &ModelCache<MarketModel>,
    query: &str,
    assets: &BTreeMap<String, AssetSeries>,
    fx: &BTreeMap<String, FxSeries>,
    risk_free: RiskFreeSeries,
  ) -> Result<Self> {
    config.validate()?;
    let key = CacheKey::new(query, assets.keys(), config.market.fingerprint());
    let market = cache.get_or_try_insert_with(key, || {
      ReturnModelBuilder::new(config.market.clone()).build(assets, fx, risk_free)
    })?;
    Self::new(config, market)
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn market(&self) -> &Arc<MarketModel> {
    &self.market
  }

  pub fn assess(&self, responses: &QuestionnaireResponse) -> RiskProfile {
    kyc::assess(responses)
  }

  /// Allocate `investment_amount` for `profile` over `duration_years`.
  ///
  /// Blocked profiles produce [`AllocationOutcome::Blocked`]. Solver failures
  /// are not errors: the result then carries the rule-based weights with
  /// `converged = false`.
  #[tracing::instrument(skip_all, fields(score = profile.composite_score, strategy = %self.config.strategy))]
  pub fn optimize(
    &self,
    profile: &RiskProfile,
    investment_amount: f64,
    duration_years: f64,
  ) -> Result<AllocationOutcome> {
    validate_positive("investment_amount", investment_amount)?;
    validate_positive("duration_years", duration_years)?;

    if profile.is_blocked() {
      let reasons: Vec<String> = profile
        .inconsistencies
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .map(|i| i.message.clone())
        .collect();
      info!(reasons = reasons.len(), "assessment blocked; no portfolio built");
      return Ok(AllocationOutcome::Blocked(BlockedAssessment {
        profile: profile.clone(),
        reasons,
      }));
    }

    let started = Instant::now();
    let strategy = self.config.strategy;
    let params = OptimizationParams::from_profile(profile, duration_years);
    let data = ProblemData::from_market(&self.market, self.config.cvar_confidence);
    let constraints =
      OptimizationConstraints::build(strategy, &params, &data, self.config.min_expected_return);

    let rule_based = fallback_allocation(&params, &data);
    let fallback = if constraints.region.is_feasible() {
      constraints.region.project(&rule_based)
    } else {
      rule_based
    };
    let warm_start = Some(QuadraticRelaxation {
      data: &data,
      risk_aversion: params.risk_aversion_lambda,
    });

    let solution = match strategy {
      StrategyKind::Sortino => self.solver.solve(
        &SortinoObjective::new(&data, params.aggressiveness),
        &constraints,
        &data,
        warm_start,
        fallback,
      ),
      StrategyKind::Utility => self.solver.solve(
        &UtilityObjective::new(&data, &params),
        &constraints,
        &data,
        warm_start,
        fallback,
      ),
      StrategyKind::MaxSharpe => self.solver.solve(
        &MaxSharpeObjective::new(&data),
        &constraints,
        &data,
        warm_start,
        fallback,
      ),
    };

    let result = self.assemble(
      &data,
      &params,
      solution,
      investment_amount,
      started.elapsed().as_secs_f64() * 1e3,
    );
    info!(
      converged = result.converged,
      expected_return = result.expected_return,
      volatility = result.volatility,
      assets = result.weights.len(),
      solve_time_ms = result.solve_time_ms,
      "allocation complete"
    );
    Ok(AllocationOutcome::Allocated(Box::new(result)))
  }

  /// Assess and allocate one request.
  pub fn run(&self, request: &OptimizationRequest) -> Result<AllocationOutcome> {
    let profile = self.assess(&request.responses);
    self.optimize(&profile, request.investment_amount, request.duration_years)
  }

  /// Run independent requests in parallel, preserving order.
  pub fn run_batch(&self, requests: &[OptimizationRequest]) -> Vec<Result<AllocationOutcome>> {
    requests.par_iter().map(|r| self.run(r)).collect()
  }

  fn assemble(
    &self,
    data: &ProblemData,
    params: &OptimizationParams,
    solution: Solution,
    investment_amount: f64,
    solve_time_ms: f64,
  ) -> OptimizationResult {
    let converged = solution.converged();
    let fallback_reason = solution.fallback_reason();
    let dense = solution.weights().to_vec();
    let names = self.market.asset_names();

    let mut weights = BTreeMap::new();
    let mut amounts = BTreeMap::new();
    for (name, w) in names.iter().zip(&dense) {
      if *w >= self.config.materiality {
        weights.insert(name.clone(), *w);
        amounts.insert(name.clone(), w * investment_amount);
      }
    }

    let volatility = data.volatility(&dense);
    let sharpe = if volatility > 0.0 {
      data.excess_return(&dense) / volatility
    } else {
      0.0
    };
    let metrics = analytics::analyze(&dense, &self.market.matrix, &self.market.risk_free);
    let risk_contributions = names
      .iter()
      .cloned()
      .zip(analytics::risk_contributions(&dense, &data.cov))
      .collect();
    let history = PerformanceHistory::simulate(&dense, &self.market.matrix, investment_amount);

    OptimizationResult {
      weights,
      amounts,
      investment_amount,
      expected_return: data.expected_return(&dense),
      volatility,
      sharpe,
      sortino: metrics.sortino,
      cvar_95: metrics.cvar_95,
      max_drawdown: metrics.max_drawdown,
      risk_contributions,
      concentration_hhi: analytics::hhi(&dense),
      converged,
      fallback_reason,
      solve_time_ms,
      strategy: self.config.strategy,
      category: params.category,
      composite_score: params.composite_score,
      risk_free_rate: data.risk_free_rate,
      base_currency: self.config.market.base_currency.clone(),
      metrics,
      history,
      dense_weights: dense,
      assets: names,
    }
  }
}

fn validate_positive(field: &str, value: f64) -> Result<()> {
  if value.is_finite() && value > 0.0 {
    Ok(())
  } else {
    Err(PortfolioError::validation(
      field,
      format!("must be a positive finite number, got {value}"),
    ))
  }
}
