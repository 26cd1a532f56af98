//! # Returns
//!
//! $$
//! r_t = \frac{p_t}{p_{t-1}} - 1,\qquad
//! r^{\text{base}}_t = (1 + r_t)(1 + r^{fx}_t) - 1
//! $$
//!
//! Simple returns, month-end resampling, currency conversion and the aligned
//! return matrix.

use chrono::Datelike;
use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;

use super::series::AssetMeta;
use super::series::FxSeries;
use super::series::span_years;
use crate::error::PortfolioError;
use crate::error::Result;

/// Last calendar day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
  let (y, m) = if date.month() == 12 {
    (date.year() + 1, 1)
  } else {
    (date.year(), date.month() + 1)
  };
  NaiveDate::from_ymd_opt(y, m, 1)
    .and_then(|first| first.pred_opt())
    .unwrap_or(date)
}

/// Keep the last price of every calendar month, stamped with the month-end date.
pub fn resample_month_end(points: &[(NaiveDate, f64)]) -> Vec<(NaiveDate, f64)> {
  let mut out: Vec<(NaiveDate, f64)> = Vec::new();
  for &(date, price) in points {
    let stamp = month_end(date);
    match out.last_mut() {
      Some(last) if last.0 == stamp => last.1 = price,
      _ => out.push((stamp, price)),
    }
  }
  out
}

/// Simple periodic returns stamped with the end date of each period.
pub fn simple_returns(points: &[(NaiveDate, f64)]) -> Vec<(NaiveDate, f64)> {
  points
    .windows(2)
    .map(|w| (w[1].0, w[1].1 / w[0].1 - 1.0))
    .collect()
}

/// Convert native-currency returns into base-currency returns.
///
/// `prices` are the (possibly resampled) native prices whose consecutive pairs
/// define the periods. The FX rate is sampled as-of each price date, but a
/// period only counts when its closing quote is dated inside the period and
/// its opening quote is at most one period old. Stale quotes never stand in for
/// a zero currency move.
pub fn convert_returns(
  asset: &str,
  prices: &[(NaiveDate, f64)],
  fx: &FxSeries,
  min_periods: usize,
) -> Result<Vec<(NaiveDate, f64)>> {
  let mut out = Vec::with_capacity(prices.len().saturating_sub(1));

  for w in prices.windows(2) {
    let ((start, p0), (end, p1)) = (w[0], w[1]);
    let (Some((q0, fx0)), Some((q1, fx1))) = (fx.quote_as_of(start), fx.quote_as_of(end)) else {
      continue;
    };
    if q1 <= start || start - q0 > end - start {
      continue;
    }
    let r_asset = p1 / p0 - 1.0;
    let r_fx = fx1 / fx0 - 1.0;
    out.push((end, (1.0 + r_asset) * (1.0 + r_fx) - 1.0));
  }

  if out.len() < min_periods {
    return Err(PortfolioError::insufficient(
      format!("{asset} conversion via {}", fx.pair()),
      min_periods,
      out.len(),
    ));
  }

  Ok(out)
}

/// Aligned base-currency return matrix.
///
/// Rows are periods in date order, columns are assets in `assets` order. A
/// finalized matrix contains no non-finite value.
#[derive(Clone, Debug)]
pub struct ReturnMatrix {
  dates: Vec<NaiveDate>,
  assets: Vec<AssetMeta>,
  values: Array2<f64>,
}

impl ReturnMatrix {
  pub fn new(dates: Vec<NaiveDate>, assets: Vec<AssetMeta>, values: Array2<f64>) -> Result<Self> {
    if values.nrows() != dates.len() || values.ncols() != assets.len() {
      return Err(PortfolioError::validation(
        "return matrix",
        format!(
          "shape {:?} does not match {} dates x {} assets",
          values.dim(),
          dates.len(),
          assets.len()
        ),
      ));
    }
    if values.iter().any(|v| !v.is_finite()) {
      return Err(PortfolioError::validation(
        "return matrix",
        "contains non-finite values",
      ));
    }
    Ok(Self {
      dates,
      assets,
      values,
    })
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn assets(&self) -> &[AssetMeta] {
    &self.assets
  }

  pub fn asset_names(&self) -> Vec<String> {
    self.assets.iter().map(|a| a.name.clone()).collect()
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  pub fn n_periods(&self) -> usize {
    self.values.nrows()
  }

  pub fn n_assets(&self) -> usize {
    self.values.ncols()
  }

  /// Periods per year detected from the date span.
  ///
  /// Falls back to 12 when the index spans less than a day.
  pub fn periods_per_year(&self) -> f64 {
    let years = span_years(&self.dates);
    if years > 0.0 {
      self.dates.len() as f64 / years
    } else {
      12.0
    }
  }

  /// Row-wise weighted sum `R w`.
  pub fn portfolio_returns(&self, weights: &[f64]) -> Array1<f64> {
    let w = ArrayView1::from(weights);
    self.values.dot(&w)
  }

  /// Subtract a per-period series (typically the risk-free rate) from every column.
  pub fn excess_of(&self, per_period: &[f64]) -> Array2<f64> {
    let rf = ArrayView1::from(per_period).insert_axis(Axis(1));
    &self.values - &rf
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn month_end_handles_december_and_leap_years() {
    assert_eq!(month_end(d(2020, 2, 10)), d(2020, 2, 29));
    assert_eq!(month_end(d(2021, 12, 3)), d(2021, 12, 31));
  }

  #[test]
  fn resample_keeps_last_price_in_month() {
    let pts = vec![
      (d(2020, 1, 2), 1.0),
      (d(2020, 1, 30), 1.5),
      (d(2020, 2, 3), 2.0),
      (d(2020, 2, 27), 2.5),
    ];
    let out = resample_month_end(&pts);
    assert_eq!(out, vec![(d(2020, 1, 31), 1.5), (d(2020, 2, 29), 2.5)]);
  }

  fn weekly(weeks: u64) -> Vec<(NaiveDate, f64)> {
    (0..weeks)
      .map(|i| (d(2020, 1, 1) + chrono::Days::new(i * 7), 100.0 + i as f64))
      .collect()
  }

  #[test]
  fn zero_fx_move_leaves_returns_unchanged() {
    let prices = weekly(15);
    let flat = (0..15)
      .map(|i| (d(2020, 1, 1) + chrono::Days::new(i * 7), 3.5))
      .collect();
    let fx = FxSeries::new("USD", "ILS", flat).unwrap();

    let native = simple_returns(&prices);
    let converted = convert_returns("SPX", &prices, &fx, 10).unwrap();

    assert_eq!(native.len(), converted.len());
    for (a, b) in native.iter().zip(&converted) {
      assert_eq!(a.0, b.0);
      assert_abs_diff_eq!(a.1, b.1, epsilon = 1e-15);
    }
  }

  #[test]
  fn fx_move_compounds_with_asset_return() {
    let prices = vec![(d(2020, 1, 1), 100.0), (d(2020, 2, 1), 110.0)];
    let fx = FxSeries::new("USD", "ILS", vec![(d(2020, 1, 1), 3.0), (d(2020, 2, 1), 3.3)]).unwrap();
    let converted = convert_returns("SPX", &prices, &fx, 1).unwrap();
    assert_abs_diff_eq!(converted[0].1, 1.1 * 1.1 - 1.0, epsilon = 1e-12);
  }

  #[test]
  fn single_fx_quote_matches_no_period() {
    let fx = FxSeries::new("USD", "ILS", vec![(d(2019, 1, 1), 3.5)]).unwrap();
    let err = convert_returns("SPX", &weekly(15), &fx, 10).unwrap_err();
    assert!(matches!(
      err,
      PortfolioError::DataInsufficiency {
        required: 10,
        actual: 0,
        ..
      }
    ));
  }

  #[test]
  fn stale_fx_tail_is_not_counted() {
    // quotes stop after the fourth week
    let fx_points = (0..4)
      .map(|i| (d(2020, 1, 1) + chrono::Days::new(i * 7), 3.5 + 0.01 * i as f64))
      .collect();
    let fx = FxSeries::new("USD", "ILS", fx_points).unwrap();
    let err = convert_returns("SPX", &weekly(15), &fx, 10).unwrap_err();
    assert!(matches!(
      err,
      PortfolioError::DataInsufficiency {
        required: 10,
        actual: 3,
        ..
      }
    ));
  }

  #[test]
  fn fx_quotes_off_by_a_few_days_still_match() {
    let prices = vec![
      (d(2020, 1, 31), 100.0),
      (d(2020, 2, 29), 105.0),
      (d(2020, 3, 31), 110.0),
    ];
    let fx = FxSeries::new(
      "USD",
      "ILS",
      vec![(d(2020, 1, 30), 3.0), (d(2020, 2, 27), 3.0), (d(2020, 3, 30), 3.3)],
    )
    .unwrap();
    let converted = convert_returns("SPX", &prices, &fx, 2).unwrap();
    assert_abs_diff_eq!(converted[0].1, 0.05, epsilon = 1e-12);
    assert_abs_diff_eq!(converted[1].1, 110.0 / 105.0 * 1.1 - 1.0, epsilon = 1e-12);
  }

  #[test]
  fn matrix_rejects_non_finite() {
    let values = Array2::from_shape_vec((1, 1), vec![f64::NAN]).unwrap();
    let meta = AssetMeta::new("A", super::super::series::AssetCategory::Bond, "US", "ILS");
    assert!(ReturnMatrix::new(vec![d(2020, 1, 31)], vec![meta], values).is_err());
  }
}
