//! # Portfolio
//!
//! $$
//! \max_{\mathbf w}\ f(\mathbf w)\quad\text{s.t.}\quad
//! \mathbf 1^\top\mathbf w = 1,\ \ell \le \mathbf w \le u,\ g(\mathbf w) \le 0
//! $$
//!
//! Profile-driven objectives and constraints, the bounded solver, analytics
//! and the end-to-end engine.
pub mod analytics;
pub mod constraints;
pub mod data;
pub mod engine;
pub mod optimizers;
pub mod params;
pub mod solver;
pub mod types;

pub use analytics::PerformanceHistory;
pub use analytics::PerformanceMetrics;
pub use constraints::Constraint;
pub use constraints::OptimizationConstraints;
pub use constraints::Region;
pub use data::ProblemData;
pub use engine::PortfolioEngine;
pub use optimizers::Objective;
pub use params::OptimizationParams;
pub use solver::Solution;
pub use solver::Solver;
pub use solver::SolverConfig;
pub use solver::SolverPhase;
pub use types::AllocationOutcome;
pub use types::BlockedAssessment;
pub use types::FallbackReason;
pub use types::OptimizationRequest;
pub use types::OptimizationResult;
pub use types::RiskContribution;
pub use types::StrategyKind;
