//! Whole-stream top-K and uniques, computed with runner primitives.

use super::top_k_uniques::{TopKUniquesConfig, make_topk_uniques_stats};
use crate::combiners::{Count, Sum, TopK};
use crate::error::Result;
use crate::generator::TransformStatsGenerator;
use crate::runner::Runner;
use crate::statistics::{DatasetFeatureStatistics, FeatureNameStatistics};
use crate::types::{FeaturePath, FeatureValue, SliceKey};
use crate::value_counts::CountAndWeight;
use arrow::record_batch::RecordBatch;
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

type FeatureKey = (SliceKey, FeaturePath);
type ValueKey = (SliceKey, FeaturePath, FeatureValue);

/// Top-k and uniques over the sliced stream, without holding every value count of a
/// feature in one accumulator.
///
/// Occurrences are summed per `(slice, feature, value)`, then the top
/// `max(num_top_values, num_rank_histogram_buckets)` values are kept per
/// `(slice, feature)` and the distinct values counted.
#[derive(Clone, Debug, Default)]
pub struct TopKUniquesStatsGenerator {
    config: TopKUniquesConfig,
}

impl TopKUniquesStatsGenerator {
    #[must_use]
    pub const fn new(config: TopKUniquesConfig) -> Self {
        Self { config }
    }

    fn to_top_k_tuples(&self, slice: &SliceKey, batch: &RecordBatch) -> Result<Vec<(ValueKey, CountAndWeight)>> {
        let mut out = Vec::new();
        for (path, pairs) in self.config.value_weights(batch)? {
            for (value, weight) in pairs {
                let key = (slice.clone(), path.clone(), value);
                out.push((
                    key,
                    CountAndWeight {
                        count: 1,
                        weight: weight.unwrap_or(0.0),
                    },
                ));
            }
        }
        Ok(out)
    }
}

impl TransformStatsGenerator for TopKUniquesStatsGenerator {
    fn name(&self) -> &str {
        "TopKUniquesStatsGenerator"
    }

    fn transform(
        &self,
        runner: &Runner,
        sliced: &[(SliceKey, RecordBatch)],
    ) -> Result<Vec<(SliceKey, DatasetFeatureStatistics)>> {
        let tuples = runner.flat_map(sliced.iter().collect(), |(slice, batch): &(SliceKey, RecordBatch)| {
            self.to_top_k_tuples(slice, batch)
        })?;
        let summed = runner.combine_per_key(tuples, &Sum::<CountAndWeight>::new(), None)?;

        let k = self.config.num_top_values.max(self.config.num_rank_histogram_buckets);
        let unweighted_input: Vec<(FeatureKey, (u64, FeatureValue))> = summed
            .iter()
            .map(|((s, p, v), cw)| ((s.clone(), p.clone()), (cw.count, v.clone())))
            .collect();
        let top_unweighted = runner.combine_per_key(unweighted_input, &TopK::new(k), None)?;

        let uniques_input: Vec<(FeatureKey, ())> = summed
            .iter()
            .map(|((s, p, _), _)| ((s.clone(), p.clone()), ()))
            .collect();
        let uniques: BTreeMap<FeatureKey, u64> = runner
            .combine_per_key(uniques_input, &Count, None)?
            .into_iter()
            .collect();

        let mut top_weighted: BTreeMap<FeatureKey, Vec<(FeatureValue, f64)>> = BTreeMap::new();
        if self.config.weight_feature.is_some() {
            let weighted_input: Vec<(FeatureKey, (OrderedFloat<f64>, FeatureValue))> = summed
                .iter()
                .map(|((s, p, v), cw)| ((s.clone(), p.clone()), (OrderedFloat(cw.weight), v.clone())))
                .collect();
            for (key, top) in runner.combine_per_key(weighted_input, &TopK::new(k), None)? {
                top_weighted.insert(key, top.into_iter().map(|(w, v)| (v, w.0)).collect());
            }
        }

        let mut per_slice: BTreeMap<SliceKey, Vec<FeatureNameStatistics>> = BTreeMap::new();
        for (key, top) in top_unweighted {
            let unweighted = top.into_iter().map(|(c, v)| (v, c as f64)).collect();
            let weighted = top_weighted.remove(&key);
            let unique = uniques.get(&key).copied().unwrap_or(0);
            let (slice, path) = key;
            let stats = make_topk_uniques_stats(&self.config, &path, unweighted, weighted, unique);
            per_slice.entry(slice).or_default().push(stats);
        }

        Ok(per_slice
            .into_iter()
            .map(|(slice, features)| {
                (
                    slice,
                    DatasetFeatureStatistics {
                        features,
                        ..DatasetFeatureStatistics::default()
                    },
                )
            })
            .collect())
    }
}
