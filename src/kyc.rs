//! # KYC
//!
//! $$
//! \text{answers} \mapsto (S, \text{category}, L, \text{limits})
//! $$
//!
//! Know-your-customer questionnaire scoring and risk profiling.
pub mod assessor;
pub mod categories;
pub mod consistency;
pub mod questionnaire;

pub use assessor::RiskProfile;
pub use assessor::assess;
pub use categories::RiskCategory;
pub use consistency::Inconsistency;
pub use consistency::InconsistencyKind;
pub use consistency::Severity;
pub use questionnaire::Dimension;
pub use questionnaire::QuestionnaireResponse;
