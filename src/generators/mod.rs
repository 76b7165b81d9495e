//! Built-in statistics generators.
//!
//! - [`BasicStatsGenerator`]: common, numeric and string stats per feature.
//! - [`NumExamplesStatsGenerator`]: authoritative (weighted) example count.
//! - [`TopKUniquesCombinerStatsGenerator`]: in-memory top-k values and unique count.
//! - [`TopKUniquesStatsGenerator`]: whole-stream top-k values and unique count.
//! - [`NaturalLanguageStatsGenerator`]: single-feature natural-language domain detector.
//! - [`FeatureWrapperGenerator`]: runs single-feature generators as one combiner.

mod basic;
mod feature_wrapper;
mod natural_language;
mod num_examples;
mod top_k_uniques;
mod top_k_uniques_transform;

pub use basic::{BasicFeatureAccumulator, BasicStatsGenerator};
pub use feature_wrapper::{FeatureWrapperAccumulator, FeatureWrapperGenerator};
pub use natural_language::{
    AverageWordHeuristic, DOMAIN_INFO_STAT, MATCH_RATE_STAT, NLClassifier,
    NaturalLanguageStatsGenerator, PartialNLStats,
};
pub use num_examples::{
    INTERNAL_FEATURE_NAME, NUM_EXAMPLES_KEY, NumExamplesAccumulator, NumExamplesStatsGenerator,
    WEIGHTED_NUM_EXAMPLES_KEY, internal_feature_path,
};
pub use top_k_uniques::{TopKUniquesCombinerStatsGenerator, TopKUniquesConfig, make_feature_stats_with_topk};
pub use top_k_uniques_transform::TopKUniquesStatsGenerator;
