//! # Stats
//!
//! $$
//! \hat\mu=\frac1n\sum_{t}r_t,\qquad \hat\sigma^2=\frac1{n-1}\sum_t(r_t-\hat\mu)^2
//! $$
//!
//! Sample statistics of periodic return series.
pub mod descriptive;
