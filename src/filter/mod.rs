//! Criterion evaluation, filter pipeline, and tier classification.

pub mod criteria;
pub mod pipeline;
pub mod tier;

pub use criteria::{Category, CriterionVerdict, EffectiveThresholds, Outcome};
pub use pipeline::FilterPipeline;
pub use tier::{Tier, TierClassifier};
