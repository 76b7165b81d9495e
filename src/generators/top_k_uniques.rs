//! Top-K and uniques statistics for string and categorical integer features.
//!
//! [`TopKUniquesCombinerStatsGenerator`] keeps full value counts per feature and is only
//! suitable when the number of distinct values fits in memory. The whole-stream
//! [`TopKUniquesStatsGenerator`](super::TopKUniquesStatsGenerator) computes the same
//! summary through the runner.

use crate::arrow_util::{categorical_values, enumerate_arrays, feature_type_of, flatten, row_weights};
use crate::error::Result;
use crate::generator::CombinerStatsGenerator;
use crate::options::StatsOptions;
use crate::statistics::{
    DatasetFeatureStatistics, FeatureNameStatistics, FreqAndValue, RankBucket, RankHistogram,
    StringStatistics, WeightedStringStatistics,
};
use crate::types::{FeaturePath, FeatureType, FeatureValue, INVALID_STRING};
use crate::value_counts::FeatureValueCounts;
use arrow::record_batch::RecordBatch;
use log::warn;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Ranking parameters shared by both top-k generators.
#[derive(Clone, Debug, PartialEq)]
pub struct TopKUniquesConfig {
    pub weight_feature: Option<String>,
    /// INT features to profile as categorical.
    pub categorical_features: HashSet<FeaturePath>,
    pub num_top_values: usize,
    pub frequency_threshold: u64,
    pub weighted_frequency_threshold: f64,
    pub num_rank_histogram_buckets: usize,
}

impl Default for TopKUniquesConfig {
    fn default() -> Self {
        Self::from_options(&StatsOptions::default())
    }
}

impl TopKUniquesConfig {
    #[must_use]
    pub fn from_options(options: &StatsOptions) -> Self {
        Self {
            weight_feature: options.weight_feature.clone(),
            categorical_features: options
                .schema
                .as_ref()
                .map(|s| s.categorical_numeric_features())
                .unwrap_or_default(),
            num_top_values: options.num_top_values,
            frequency_threshold: options.frequency_threshold,
            weighted_frequency_threshold: options.weighted_frequency_threshold,
            num_rank_histogram_buckets: options.num_rank_histogram_buckets,
        }
    }

    pub(crate) fn is_categorical(&self, path: &FeaturePath) -> bool {
        self.categorical_features.contains(path)
    }

    /// Every non-null categorical value of `batch`, per feature, with its row's weight.
    pub(crate) fn value_weights(&self, batch: &RecordBatch) -> Result<Vec<(FeaturePath, Vec<(FeatureValue, Option<f64>)>)>> {
        let weights = match &self.weight_feature {
            Some(w) if batch.num_rows() > 0 => Some(row_weights(batch, w)?),
            _ => None,
        };
        let weight_path = self.weight_feature.as_deref().map(FeaturePath::from_name);
        let mut out = Vec::new();
        for (path, column) in enumerate_arrays(batch)? {
            if weight_path.as_ref() == Some(&path) {
                continue;
            }
            let is_categorical = self.is_categorical(&path);
            if !is_categorical && feature_type_of(column.data_type()) != Some(FeatureType::String) {
                continue;
            }
            let flat = flatten(&column)?;
            let Some(values) = categorical_values(flat.values.as_ref(), is_categorical)? else {
                continue;
            };
            let pairs = values
                .into_iter()
                .zip(&flat.parents)
                .filter_map(|(v, &row)| v.map(|v| (v, weights.as_ref().map(|w| w[row]))))
                .collect();
            out.push((path, pairs));
        }
        Ok(out)
    }
}

/// Build top-values and rank-histogram stats from `(value, count)` pairs.
///
/// Pairs are ranked by descending count, ties broken by the larger value. Ranking stops
/// at the first count below `frequency_threshold`. Weighted stats land in
/// `string_stats.weighted_string_stats`.
#[must_use]
pub fn make_feature_stats_with_topk(
    path: &FeaturePath,
    mut value_counts: Vec<(FeatureValue, f64)>,
    is_categorical: bool,
    is_weighted: bool,
    num_top_values: usize,
    frequency_threshold: f64,
    num_rank_histogram_buckets: usize,
) -> FeatureNameStatistics {
    value_counts.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => b.0.cmp(&a.0),
        other => other,
    });

    let mut top_values = Vec::new();
    let mut buckets = Vec::new();
    for (i, (value, count)) in value_counts.into_iter().enumerate() {
        if count < frequency_threshold || (i >= num_top_values && i >= num_rank_histogram_buckets) {
            break;
        }
        let label = value.try_label().unwrap_or_else(|| {
            warn!("Feature \"{path}\" has bytes value \"{value:?}\" which cannot be decoded as a UTF-8 string.");
            INVALID_STRING.to_string()
        });
        if i < num_top_values {
            top_values.push(FreqAndValue {
                value: label.clone(),
                frequency: count,
            });
        }
        if i < num_rank_histogram_buckets {
            buckets.push(RankBucket {
                low_rank: i as u64,
                high_rank: i as u64,
                label,
                sample_count: count,
            });
        }
    }

    let rank_histogram = Some(RankHistogram { buckets });
    let string_stats = if is_weighted {
        StringStatistics {
            weighted_string_stats: Some(WeightedStringStatistics {
                top_values,
                rank_histogram,
            }),
            ..StringStatistics::default()
        }
    } else {
        StringStatistics {
            top_values,
            rank_histogram,
            ..StringStatistics::default()
        }
    };

    FeatureNameStatistics {
        path: path.clone(),
        feature_type: Some(if is_categorical {
            FeatureType::Int
        } else {
            FeatureType::String
        }),
        string_stats: Some(string_stats),
        ..FeatureNameStatistics::default()
    }
}

/// Unweighted top-k stats, plus weighted ones when given, plus the unique count.
pub(crate) fn make_topk_uniques_stats(
    config: &TopKUniquesConfig,
    path: &FeaturePath,
    unweighted: Vec<(FeatureValue, f64)>,
    weighted: Option<Vec<(FeatureValue, f64)>>,
    unique: u64,
) -> FeatureNameStatistics {
    let is_categorical = config.is_categorical(path);
    let mut result = make_feature_stats_with_topk(
        path,
        unweighted,
        is_categorical,
        false,
        config.num_top_values,
        config.frequency_threshold as f64,
        config.num_rank_histogram_buckets,
    );
    let string_stats = result.string_stats.get_or_insert_with(StringStatistics::default);
    if let Some(weighted) = weighted.filter(|w| !w.is_empty()) {
        let weighted_result = make_feature_stats_with_topk(
            path,
            weighted,
            is_categorical,
            true,
            config.num_top_values,
            config.weighted_frequency_threshold,
            config.num_rank_histogram_buckets,
        );
        string_stats.weighted_string_stats = weighted_result
            .string_stats
            .and_then(|s| s.weighted_string_stats);
    }
    string_stats.unique = unique;
    result
}

/* ===================== Combiner variant ===================== */

/// In-memory top-k and uniques generator.
#[derive(Clone, Debug, Default)]
pub struct TopKUniquesCombinerStatsGenerator {
    config: TopKUniquesConfig,
}

impl TopKUniquesCombinerStatsGenerator {
    #[must_use]
    pub const fn new(config: TopKUniquesConfig) -> Self {
        Self { config }
    }
}

impl CombinerStatsGenerator for TopKUniquesCombinerStatsGenerator {
    type Accumulator = HashMap<FeaturePath, FeatureValueCounts>;

    fn name(&self) -> &str {
        "TopKUniquesCombinerStatsGenerator"
    }

    fn create_accumulator(&self) -> Self::Accumulator {
        HashMap::new()
    }

    fn add_input(&self, acc: &mut Self::Accumulator, batch: &RecordBatch) -> Result<()> {
        let weighted = self.config.weight_feature.is_some();
        for (path, pairs) in self.config.value_weights(batch)? {
            let counts = acc
                .entry(path)
                .or_insert_with(|| FeatureValueCounts::new(weighted));
            for (value, weight) in pairs {
                counts.increment(value, weight);
            }
        }
        Ok(())
    }

    fn merge_accumulators(&self, accs: Vec<Self::Accumulator>) -> Result<Self::Accumulator> {
        let mut result = self.create_accumulator();
        for acc in accs {
            for (path, counts) in acc {
                match result.get_mut(&path) {
                    Some(existing) => existing.merge(counts),
                    None => {
                        result.insert(path, counts);
                    }
                }
            }
        }
        Ok(result)
    }

    fn extract_output(&self, acc: &Self::Accumulator) -> Result<DatasetFeatureStatistics> {
        let mut paths: Vec<&FeaturePath> = acc.keys().collect();
        paths.sort();
        let mut features = Vec::with_capacity(paths.len());
        for path in paths {
            let counts = &acc[path];
            if counts.unweighted.is_empty() {
                continue;
            }
            let unweighted = counts
                .unweighted
                .iter()
                .map(|(v, c)| (v.clone(), c as f64))
                .collect();
            let weighted = counts
                .weighted
                .as_ref()
                .map(|w| w.iter().map(|(v, c)| (v.clone(), c)).collect());
            features.push(make_topk_uniques_stats(
                &self.config,
                path,
                unweighted,
                weighted,
                counts.unweighted.len() as u64,
            ));
        }
        Ok(DatasetFeatureStatistics {
            features,
            ..DatasetFeatureStatistics::default()
        })
    }
}
