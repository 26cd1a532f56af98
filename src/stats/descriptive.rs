//! # Descriptive statistics
//!
//! $$
//! \mathrm{CVaR}_\alpha = -\mathbb E\left[R \mid R \le q_\alpha(R)\right]
//! $$
//!
//! Sample moments, empirical quantiles and path statistics on return series.

use statrs::statistics::Statistics;

/// Sample mean, `0.0` for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
  if xs.is_empty() {
    0.0
  } else {
    xs.iter().mean()
  }
}

/// Unbiased sample standard deviation, `0.0` for fewer than two observations.
pub fn std_dev(xs: &[f64]) -> f64 {
  if xs.len() < 2 {
    0.0
  } else {
    xs.iter().std_dev()
  }
}

/// Central moments `(m2, m3, m4)` with population normalisation.
fn central_moments(xs: &[f64]) -> (f64, f64, f64) {
  let n = xs.len() as f64;
  let mu = mean(xs);

  let mut m2 = 0.0;
  let mut m3 = 0.0;
  let mut m4 = 0.0;
  for &x in xs {
    let d = x - mu;
    let d2 = d * d;
    m2 += d2;
    m3 += d2 * d;
    m4 += d2 * d2;
  }

  (m2 / n, m3 / n, m4 / n)
}

/// Sample skewness `m3 / m2^{3/2}`; zero for degenerate samples.
pub fn skewness(xs: &[f64]) -> f64 {
  if xs.len() < 3 {
    return 0.0;
  }
  let (m2, m3, _) = central_moments(xs);
  if m2 <= 1e-30 || !m2.is_finite() {
    return 0.0;
  }
  m3 / m2.powf(1.5)
}

/// Sample excess kurtosis `m4 / m2^2 - 3`; zero for degenerate samples.
pub fn excess_kurtosis(xs: &[f64]) -> f64 {
  if xs.len() < 4 {
    return 0.0;
  }
  let (m2, _, m4) = central_moments(xs);
  if m2 <= 1e-30 || !m2.is_finite() {
    return 0.0;
  }
  m4 / (m2 * m2) - 3.0
}

/// Empirical quantile with linear interpolation between order statistics.
pub fn quantile(xs: &[f64], q: f64) -> f64 {
  if xs.is_empty() {
    return 0.0;
  }

  let mut sorted = xs.to_vec();
  sorted.sort_by(|a, b| a.total_cmp(b));

  let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
  let lo = pos.floor() as usize;
  let hi = pos.ceil() as usize;
  let frac = pos - lo as f64;

  sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Historical value-at-risk and conditional value-at-risk at `confidence`.
///
/// Both are returned as positive losses per period: VaR is the negated
/// `(1 - confidence)` quantile and CVaR the negated mean of all observations at
/// or below it.
pub fn var_cvar(xs: &[f64], confidence: f64) -> (f64, f64) {
  if xs.is_empty() {
    return (0.0, 0.0);
  }

  let threshold = quantile(xs, 1.0 - confidence);
  let mut tail_sum = 0.0;
  let mut tail_n = 0usize;
  for &x in xs {
    if x <= threshold {
      tail_sum += x;
      tail_n += 1;
    }
  }

  let tail_mean = if tail_n > 0 {
    tail_sum / tail_n as f64
  } else {
    threshold
  };

  (-threshold, -tail_mean)
}

/// Maximum peak-to-trough decline of the compounded path, as a positive fraction.
pub fn max_drawdown(returns: &[f64]) -> f64 {
  let mut wealth = 1.0;
  let mut peak = 1.0_f64;
  let mut worst = 0.0_f64;

  for &r in returns {
    wealth *= 1.0 + r;
    peak = peak.max(wealth);
    if peak > 0.0 {
      worst = worst.min(wealth / peak - 1.0);
    }
  }

  -worst
}

/// Per-period standard deviation of the strictly negative observations.
///
/// Returns `None` when fewer than two negative observations exist, leaving the
/// floor policy to the caller.
pub fn downside_std(xs: &[f64]) -> Option<f64> {
  let negatives: Vec<f64> = xs.iter().copied().filter(|&x| x < 0.0).collect();
  if negatives.len() < 2 {
    None
  } else {
    Some(std_dev(&negatives))
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn quantile_interpolates_like_numpy() {
    let xs = [4.0, 1.0, 3.0, 2.0, 5.0];
    assert_abs_diff_eq!(quantile(&xs, 0.5), 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(quantile(&xs, 0.05), 1.2, epsilon = 1e-12);
  }

  #[test]
  fn var_cvar_on_uniform_grid() {
    let xs: Vec<f64> = (1..=100).map(|i| (i as f64 - 50.0) / 1000.0).collect();
    let (var, cvar) = var_cvar(&xs, 0.95);
    assert!(var > 0.0);
    assert!(cvar >= var);
  }

  #[test]
  fn max_drawdown_tracks_worst_decline() {
    let rets = [0.10, -0.20, 0.05, -0.10, 0.30];
    // peak 1.10, trough 1.10 * 0.8 * 1.05 * 0.9 = 0.8316
    let expected = 1.0 - 0.8316 / 1.10;
    assert_abs_diff_eq!(max_drawdown(&rets), expected, epsilon = 1e-12);
  }

  #[test]
  fn max_drawdown_zero_for_monotone_path() {
    assert_eq!(max_drawdown(&[0.01, 0.02, 0.0, 0.03]), 0.0);
  }

  #[test]
  fn symmetric_sample_has_zero_skew() {
    let xs = [-2.0, -1.0, 0.0, 1.0, 2.0];
    assert_abs_diff_eq!(skewness(&xs), 0.0, epsilon = 1e-12);
  }

  #[test]
  fn downside_needs_two_negatives() {
    assert!(downside_std(&[0.01, 0.02, -0.01]).is_none());
    assert!(downside_std(&[0.01, -0.02, -0.01]).is_some());
  }
}
