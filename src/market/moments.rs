//! # Moment model
//!
//! $$
//! \mu = P\,\bar r^{\,e},\qquad \Sigma = P\,\widehat{\operatorname{Cov}}(r^e)
//! $$
//!
//! where $P$ is the detected number of periods per year and $r^e$ the returns in
//! excess of the per-period risk-free rate.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use super::returns::ReturnMatrix;
use super::series::RiskFreeSeries;
use crate::error::PortfolioError;
use crate::error::Result;

/// Annualized first and second moments of a return matrix.
#[derive(Clone, Debug)]
pub struct MomentModel {
  /// Annualized mean per asset.
  pub mean: Array1<f64>,
  /// Annualized sample covariance (`ddof = 1`).
  pub covariance: Array2<f64>,
  /// Detected periods per year of the underlying matrix.
  pub periods_per_year: f64,
  /// Average annual risk-free rate over the matrix dates.
  pub risk_free_rate: f64,
  /// Whether `mean` and `covariance` are computed on excess returns.
  pub excess: bool,
}

impl MomentModel {
  /// Estimate moments from `matrix`, optionally in excess of `risk_free`.
  pub fn estimate(matrix: &ReturnMatrix, risk_free: &RiskFreeSeries, excess: bool) -> Result<Self> {
    let n = matrix.n_periods();
    if n < 2 {
      return Err(PortfolioError::insufficient("moment estimation", 2, n));
    }

    let ppy = matrix.periods_per_year();
    let data = if excess {
      let rf = risk_free.periodic(matrix.dates(), ppy);
      matrix.excess_of(&rf)
    } else {
      matrix.values().clone()
    };

    let mean = data
      .mean_axis(Axis(0))
      .ok_or_else(|| PortfolioError::insufficient("moment estimation", 2, 0))?
      * ppy;
    let covariance = data
      .t()
      .cov(1.0)
      .map_err(|_| PortfolioError::insufficient("moment estimation", 2, 0))?
      * ppy;

    Ok(Self {
      mean,
      covariance,
      periods_per_year: ppy,
      risk_free_rate: risk_free.average(matrix.dates()),
      excess,
    })
  }
}
