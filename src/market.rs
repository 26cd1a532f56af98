//! # Market
//!
//! $$
//! R \in \mathbb R^{T \times N},\qquad (\mu, \Sigma) = \operatorname{annualize}(R - r_f)
//! $$
//!
//! Price series model, base-currency return construction and the moment model
//! consumed by the optimizer.
pub mod builder;
pub mod cache;
pub mod moments;
pub mod returns;
pub mod series;

pub use builder::MarketConfig;
pub use builder::MarketModel;
pub use builder::ReturnModelBuilder;
pub use cache::CacheKey;
pub use cache::ModelCache;
pub use moments::MomentModel;
pub use returns::ReturnMatrix;
pub use series::AssetCategory;
pub use series::AssetMeta;
pub use series::AssetSeries;
pub use series::FxSeries;
pub use series::RiskClass;
pub use series::RiskFreeSeries;
