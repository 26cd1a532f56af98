//! # Return model builder
//!
//! $$
//! \mathcal T = \bigcap_{i \in \mathcal A} \mathcal T_i,\qquad |\mathcal T| \ge n_{\min}
//! $$
//!
//! Turns native-currency price histories into an aligned base-currency return
//! matrix and its annualized moment model.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use ndarray::Array2;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::moments::MomentModel;
use super::returns::ReturnMatrix;
use super::returns::convert_returns;
use super::returns::resample_month_end;
use super::returns::simple_returns;
use super::series::AssetMeta;
use super::series::AssetSeries;
use super::series::FxSeries;
use super::series::RiskFreeSeries;
use crate::error::PortfolioError;
use crate::error::Result;

/// Configuration for [`ReturnModelBuilder`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
  /// Currency every return is expressed in.
  pub base_currency: String,
  /// Series observed more often than this many times a year are resampled to month-end.
  pub resample_threshold: f64,
  /// Minimum number of aligned periods in the final matrix.
  pub min_observations: usize,
  /// Minimum number of matched periods for a currency conversion.
  pub min_conversion_periods: usize,
  /// Estimate moments on returns in excess of the risk-free rate.
  pub excess_returns: bool,
}

impl Default for MarketConfig {
  fn default() -> Self {
    Self {
      base_currency: "ILS".to_string(),
      resample_threshold: 100.0,
      min_observations: 100,
      min_conversion_periods: 10,
      excess_returns: true,
    }
  }
}

impl MarketConfig {
  /// Stable textual digest of every field that changes the built model.
  pub fn fingerprint(&self) -> String {
    format!(
      "{}|{}|{}|{}|{}",
      self.base_currency,
      self.resample_threshold,
      self.min_observations,
      self.min_conversion_periods,
      self.excess_returns
    )
  }

  pub fn validate(&self) -> Result<()> {
    if self.base_currency.trim().is_empty() {
      return Err(PortfolioError::Config("base_currency must not be empty".into()));
    }
    if !(self.resample_threshold > 0.0) {
      return Err(PortfolioError::Config(format!(
        "resample_threshold must be positive, got {}",
        self.resample_threshold
      )));
    }
    if self.min_observations < 2 {
      return Err(PortfolioError::Config(format!(
        "min_observations must be at least 2, got {}",
        self.min_observations
      )));
    }
    if self.min_conversion_periods == 0 {
      return Err(PortfolioError::Config(
        "min_conversion_periods must be at least 1".into(),
      ));
    }
    Ok(())
  }
}

/// Return matrix, moments and the risk-free curve they were built against.
#[derive(Clone, Debug)]
pub struct MarketModel {
  pub matrix: ReturnMatrix,
  pub moments: MomentModel,
  pub risk_free: RiskFreeSeries,
}

impl MarketModel {
  pub fn asset_names(&self) -> Vec<String> {
    self.matrix.asset_names()
  }
}

struct Candidate {
  meta: AssetMeta,
  returns: Vec<(NaiveDate, f64)>,
}

/// Builds a [`MarketModel`] from raw series.
#[derive(Clone, Debug, Default)]
pub struct ReturnModelBuilder {
  config: MarketConfig,
}

impl ReturnModelBuilder {
  pub fn new(config: MarketConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &MarketConfig {
    &self.config
  }

  /// Build the market model.
  ///
  /// `fx` is keyed by foreign currency code. Assets without a usable FX series
  /// or with too short a history are logged and excluded.
  #[tracing::instrument(skip_all, fields(assets = assets.len(), base = %self.config.base_currency))]
  pub fn build(
    &self,
    assets: &BTreeMap<String, AssetSeries>,
    fx: &BTreeMap<String, FxSeries>,
    risk_free: RiskFreeSeries,
  ) -> Result<MarketModel> {
    let candidates = self.candidate_returns(assets, fx);
    let (dates, accepted) = self.align(candidates)?;
    let (dates, values) = self.finalize(dates, &accepted)?;

    let metas = accepted.into_iter().map(|c| c.meta).collect();
    let matrix = ReturnMatrix::new(dates, metas, values)?;
    let moments = MomentModel::estimate(&matrix, &risk_free, self.config.excess_returns)?;

    info!(
      assets = matrix.n_assets(),
      periods = matrix.n_periods(),
      periods_per_year = moments.periods_per_year,
      "market model built"
    );

    Ok(MarketModel {
      matrix,
      moments,
      risk_free,
    })
  }

  fn candidate_returns(
    &self,
    assets: &BTreeMap<String, AssetSeries>,
    fx: &BTreeMap<String, FxSeries>,
  ) -> Vec<Candidate> {
    let base = self.config.base_currency.as_str();
    let mut out = Vec::with_capacity(assets.len());

    for series in assets.values() {
      let name = series.name();
      let prices = if series.observations_per_year() > self.config.resample_threshold {
        debug!(asset = name, "resampling to month-end");
        resample_month_end(series.points())
      } else {
        series.points().to_vec()
      };

      let currency = series.meta().currency.as_str();
      let returns = if currency == base {
        simple_returns(&prices)
      } else {
        let Some(pair) = fx.get(currency).filter(|f| f.base() == base) else {
          let err = PortfolioError::MissingFxRate {
            asset: name.to_string(),
            currency: currency.to_string(),
          };
          warn!(asset = name, "{err}; excluding asset");
          continue;
        };
        match convert_returns(name, &prices, pair, self.config.min_conversion_periods) {
          Ok(r) => r,
          Err(err) => {
            warn!(asset = name, "{err}; excluding asset");
            continue;
          }
        }
      };

      out.push(Candidate {
        meta: series.meta().clone(),
        returns,
      });
    }

    out
  }

  /// Greedy date intersection over candidates ordered by history length.
  fn align(&self, mut candidates: Vec<Candidate>) -> Result<(Vec<NaiveDate>, Vec<Candidate>)> {
    let min_obs = self.config.min_observations;
    candidates.sort_by(|a, b| {
      b.returns
        .len()
        .cmp(&a.returns.len())
        .then_with(|| a.meta.name.cmp(&b.meta.name))
    });

    let mut working: Option<BTreeSet<NaiveDate>> = None;
    let mut accepted = Vec::new();

    for c in candidates {
      let dates: BTreeSet<NaiveDate> = c.returns.iter().map(|r| r.0).collect();
      let overlap = match &working {
        Some(w) => w.intersection(&dates).copied().collect(),
        None => dates,
      };

      if overlap.len() < min_obs {
        warn!(
          asset = %c.meta.name,
          overlap = overlap.len(),
          required = min_obs,
          "insufficient overlapping history; excluding asset"
        );
        continue;
      }

      working = Some(overlap);
      accepted.push(c);
    }

    let dates: Vec<NaiveDate> = working.unwrap_or_default().into_iter().collect();
    if accepted.is_empty() {
      return Err(PortfolioError::insufficient("return matrix", min_obs, 0));
    }

    accepted.sort_by(|a, b| a.meta.name.cmp(&b.meta.name));
    Ok((dates, accepted))
  }

  /// Fill the matrix, forward-fill non-finite cells and drop rows that stay invalid.
  fn finalize(
    &self,
    dates: Vec<NaiveDate>,
    accepted: &[Candidate],
  ) -> Result<(Vec<NaiveDate>, Array2<f64>)> {
    let n = dates.len();
    let k = accepted.len();
    let mut values = Array2::<f64>::from_elem((n, k), f64::NAN);

    for (j, c) in accepted.iter().enumerate() {
      for (i, date) in dates.iter().enumerate() {
        if let Ok(pos) = c.returns.binary_search_by(|r| r.0.cmp(date)) {
          values[[i, j]] = c.returns[pos].1;
        }
      }
    }

    for mut col in values.columns_mut() {
      let mut last: Option<f64> = None;
      for v in col.iter_mut() {
        if v.is_finite() {
          last = Some(*v);
        } else if let Some(prev) = last {
          *v = prev;
        }
      }
    }

    let keep: Vec<usize> = (0..n)
      .filter(|&i| values.row(i).iter().all(|v| v.is_finite()))
      .collect();

    if keep.len() < self.config.min_observations {
      return Err(PortfolioError::insufficient(
        "return matrix",
        self.config.min_observations,
        keep.len(),
      ));
    }

    let values = values.select(ndarray::Axis(0), &keep);
    let dates = keep.iter().map(|&i| dates[i]).collect();
    Ok((dates, values))
  }
}
