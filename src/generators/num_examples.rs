//! Authoritative example count, reported through an internal feature.

use crate::arrow_util::row_weights;
use crate::error::Result;
use crate::generator::CombinerStatsGenerator;
use crate::statistics::{CustomStatistic, DatasetFeatureStatistics, FeatureNameStatistics};
use crate::types::FeaturePath;
use arrow::record_batch::RecordBatch;

/// Name of the synthetic feature carrying the example counts.
pub const INTERNAL_FEATURE_NAME: &str = "__STATS_INTERNAL_FEATURE__";
pub const NUM_EXAMPLES_KEY: &str = "__NUM_EXAMPLES__";
pub const WEIGHTED_NUM_EXAMPLES_KEY: &str = "__WEIGHTED_NUM_EXAMPLES__";

#[must_use]
pub fn internal_feature_path() -> FeaturePath {
    FeaturePath::from_name(INTERNAL_FEATURE_NAME)
}

/// Counts rows and, when a weight feature is set, the total weight.
///
/// The count is emitted as custom stats on [`INTERNAL_FEATURE_NAME`]; the orchestrator
/// removes that entry again during reconciliation.
#[derive(Clone, Debug, Default)]
pub struct NumExamplesStatsGenerator {
    weight_feature: Option<String>,
}

/// `(num_examples, weighted_num_examples)`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NumExamplesAccumulator {
    pub num_examples: u64,
    pub weighted_num_examples: f64,
}

impl NumExamplesStatsGenerator {
    #[must_use]
    pub const fn new(weight_feature: Option<String>) -> Self {
        Self { weight_feature }
    }
}

impl CombinerStatsGenerator for NumExamplesStatsGenerator {
    type Accumulator = NumExamplesAccumulator;

    fn name(&self) -> &str {
        "NumExamplesStatsGenerator"
    }

    fn create_accumulator(&self) -> NumExamplesAccumulator {
        NumExamplesAccumulator::default()
    }

    fn add_input(&self, acc: &mut NumExamplesAccumulator, batch: &RecordBatch) -> Result<()> {
        acc.num_examples += batch.num_rows() as u64;
        if let Some(weight_feature) = &self.weight_feature
            && batch.num_rows() > 0
        {
            acc.weighted_num_examples += row_weights(batch, weight_feature)?.iter().sum::<f64>();
        }
        Ok(())
    }

    fn merge_accumulators(&self, accs: Vec<NumExamplesAccumulator>) -> Result<NumExamplesAccumulator> {
        Ok(accs.into_iter().fold(self.create_accumulator(), |mut out, acc| {
            out.num_examples += acc.num_examples;
            out.weighted_num_examples += acc.weighted_num_examples;
            out
        }))
    }

    fn extract_output(&self, acc: &NumExamplesAccumulator) -> Result<DatasetFeatureStatistics> {
        let mut internal = FeatureNameStatistics::new(internal_feature_path());
        internal
            .custom_stats
            .push(CustomStatistic::num(NUM_EXAMPLES_KEY, acc.num_examples as f64));
        if self.weight_feature.is_some() {
            internal.custom_stats.push(CustomStatistic::num(
                WEIGHTED_NUM_EXAMPLES_KEY,
                acc.weighted_num_examples,
            ));
        }
        Ok(DatasetFeatureStatistics {
            features: vec![internal],
            ..DatasetFeatureStatistics::default()
        })
    }
}
