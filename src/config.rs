//! # Configuration
//!
//! Engine configuration composed from the per-component configs, loadable from
//! TOML. Every field has a default, so partial files are accepted.

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::kyc::categories;
use crate::market::MarketConfig;
use crate::portfolio::SolverConfig;
use crate::portfolio::StrategyKind;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub strategy: StrategyKind,
  /// Weights below this are dropped from the reported allocation.
  pub materiality: f64,
  /// Confidence level of the historical CVaR used by objectives and constraints.
  pub cvar_confidence: f64,
  /// Lifetime of cached market models, in seconds.
  pub cache_ttl_secs: u64,
  /// Optional floor on the expected annual return.
  pub min_expected_return: Option<f64>,
  pub market: MarketConfig,
  pub solver: SolverConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      strategy: StrategyKind::default(),
      materiality: 0.005,
      cvar_confidence: 0.95,
      cache_ttl_secs: 3600,
      min_expected_return: None,
      market: MarketConfig::default(),
      solver: SolverConfig::default(),
    }
  }
}

impl EngineConfig {
  pub fn from_toml_str(s: &str) -> Result<Self> {
    let config: Self = toml::from_str(s).map_err(|e| PortfolioError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
      .map_err(|e| PortfolioError::Config(format!("{}: {e}", path.display())))?;
    Self::from_toml_str(&text)
  }

  pub fn to_toml_string(&self) -> Result<String> {
    toml::to_string_pretty(self).map_err(|e| PortfolioError::Config(e.to_string()))
  }

  pub fn validate(&self) -> Result<()> {
    self.market.validate()?;
    self.solver.validate()?;
    categories::validate_bands()?;
    if !(0.0..0.5).contains(&self.materiality) {
      return Err(PortfolioError::Config(format!(
        "materiality must be within [0, 0.5), got {}",
        self.materiality
      )));
    }
    if !(self.cvar_confidence > 0.5 && self.cvar_confidence < 1.0) {
      return Err(PortfolioError::Config(format!(
        "cvar_confidence must be within (0.5, 1), got {}",
        self.cvar_confidence
      )));
    }
    if let Some(floor) = self.min_expected_return {
      if !floor.is_finite() {
        return Err(PortfolioError::Config("min_expected_return must be finite".into()));
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  #[test]
  fn empty_document_gives_defaults() {
    let config = EngineConfig::from_toml_str("").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.strategy, StrategyKind::Sortino);
  }

  #[test]
  fn partial_sections_override_defaults() {
    let config = EngineConfig::from_toml_str(
      r#"
      strategy = "utility"
      min_expected_return = 0.04

      [market]
      base_currency = "USD"

      [solver]
      time_budget_ms = 500
      "#,
    )
    .unwrap();
    assert_eq!(config.strategy, StrategyKind::Utility);
    assert_eq!(config.market.base_currency, "USD");
    assert_eq!(config.market.min_observations, 100);
    assert_eq!(config.solver.time_budget_ms, 500);
    assert_eq!(config.min_expected_return, Some(0.04));
  }

  #[test]
  fn invalid_values_are_rejected() {
    let err = EngineConfig::from_toml_str("cvar_confidence = 1.5").unwrap_err();
    assert!(matches!(err, PortfolioError::Config(_)));
    assert!(EngineConfig::from_toml_str("[solver]\nmax_outer_iters = 0").is_err());
    assert!(EngineConfig::from_toml_str("materiality = \"high\"").is_err());
  }

  #[test]
  fn load_round_trips_through_a_file() {
    let mut config = EngineConfig::default();
    config.strategy = StrategyKind::MaxSharpe;
    config.cache_ttl_secs = 60;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(config.to_toml_string().unwrap().as_bytes()).unwrap();
    let loaded = EngineConfig::load(file.path()).unwrap();
    assert_eq!(loaded, config);
  }

  #[test]
  fn missing_file_is_a_config_error() {
    let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
    assert!(err.to_string().contains("not/here.toml"));
  }
}
