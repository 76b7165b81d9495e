//! Common, numeric and string statistics for every leaf feature.

use crate::arrow_util::{
    bytes_values, enumerate_arrays, feature_type_of, flatten, float_values, int_values,
    num_values_per_row, row_weights,
};
use crate::error::Result;
use crate::generator::CombinerStatsGenerator;
use crate::options::StatsOptions;
use crate::statistics::{
    CommonStatistics, DatasetFeatureStatistics, FeatureNameStatistics, NumericStatistics,
    StringStatistics, WeightedCommonStatistics, WeightedNumericStatistics,
};
use crate::types::{FeaturePath, FeatureType};
use arrow::array::{Array, ArrayRef};
use arrow::record_batch::RecordBatch;
use log::warn;
use std::collections::{HashMap, HashSet};

/// Running sums from which a mean and population standard deviation are derived.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Moments {
    weight: f64,
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    fn add(&mut self, x: f64, w: f64) {
        self.weight += w;
        self.sum += w * x;
        self.sum_sq += w * x * x;
    }

    fn merge(&mut self, other: Self) {
        self.weight += other.weight;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    fn mean_and_std_dev(&self) -> (f64, f64) {
        if self.weight <= 0.0 {
            return (0.0, 0.0);
        }
        let mean = self.sum / self.weight;
        let variance = (self.sum_sq / self.weight - mean * mean).max(0.0);
        (mean, variance.sqrt())
    }
}

/// Per-feature partial state of [`BasicStatsGenerator`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BasicFeatureAccumulator {
    feature_type: Option<FeatureType>,
    invalidated: bool,
    num_non_missing: u64,
    min_num_values: Option<u64>,
    max_num_values: u64,
    tot_num_values: u64,
    weighted_num_non_missing: f64,
    weighted_tot_num_values: f64,
    moments: Moments,
    weighted_moments: Moments,
    num_zeros: u64,
    min: Option<f64>,
    max: Option<f64>,
    total_length: u64,
    num_strings: u64,
}

impl BasicFeatureAccumulator {
    #[must_use]
    pub const fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    fn check_type(&mut self, path: &FeaturePath, feature_type: FeatureType) -> bool {
        match self.feature_type {
            Some(t) if t != feature_type => {
                warn!(
                    "Feature \"{path}\" has values of type {feature_type:?} but {t:?} was seen \
                     before; dropping its basic statistics."
                );
                self.invalidated = true;
                false
            }
            _ => {
                self.feature_type = Some(feature_type);
                true
            }
        }
    }

    fn merge(&mut self, path: &FeaturePath, other: Self) {
        if other.invalidated {
            self.invalidated = true;
        }
        if let Some(t) = other.feature_type {
            self.check_type(path, t);
        }
        if self.invalidated {
            return;
        }
        self.num_non_missing += other.num_non_missing;
        self.min_num_values = match (self.min_num_values, other.min_num_values) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_num_values = self.max_num_values.max(other.max_num_values);
        self.tot_num_values += other.tot_num_values;
        self.weighted_num_non_missing += other.weighted_num_non_missing;
        self.weighted_tot_num_values += other.weighted_tot_num_values;
        self.moments.merge(other.moments);
        self.weighted_moments.merge(other.weighted_moments);
        self.num_zeros += other.num_zeros;
        self.min = min_opt(self.min, other.min);
        self.max = max_opt(self.max, other.max);
        self.total_length += other.total_length;
        self.num_strings += other.num_strings;
    }
}

fn min_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Dataset-level generator of common, numeric and string statistics.
///
/// INT and FLOAT features get numeric stats; STRING features, and INT features the
/// schema marks categorical, get string stats. A feature whose value type changes
/// across batches is invalidated and reported by no one.
#[derive(Clone, Debug, Default)]
pub struct BasicStatsGenerator {
    weight_feature: Option<String>,
    categorical_features: HashSet<FeaturePath>,
}

impl BasicStatsGenerator {
    #[must_use]
    pub const fn new(weight_feature: Option<String>, categorical_features: HashSet<FeaturePath>) -> Self {
        Self {
            weight_feature,
            categorical_features,
        }
    }

    #[must_use]
    pub fn from_options(options: &StatsOptions) -> Self {
        Self::new(
            options.weight_feature.clone(),
            options
                .schema
                .as_ref()
                .map(|s| s.categorical_numeric_features())
                .unwrap_or_default(),
        )
    }

    fn add_column(
        &self,
        acc: &mut BasicFeatureAccumulator,
        path: &FeaturePath,
        column: &ArrayRef,
        weights: Option<&[f64]>,
    ) -> Result<()> {
        for (row, n) in num_values_per_row(column.as_ref()).into_iter().enumerate() {
            let Some(n) = n else { continue };
            let n = n as u64;
            acc.num_non_missing += 1;
            acc.min_num_values = Some(acc.min_num_values.map_or(n, |m| m.min(n)));
            acc.max_num_values = acc.max_num_values.max(n);
            acc.tot_num_values += n;
            if let Some(w) = weights {
                acc.weighted_num_non_missing += w[row];
                acc.weighted_tot_num_values += w[row] * n as f64;
            }
        }

        let flat = flatten(column)?;
        let weight_of = |i: usize| weights.map(|w| w[flat.parents[i]]);
        if self.categorical_features.contains(path) {
            if let Some(ints) = int_values(flat.values.as_ref())? {
                for v in ints.iter().flatten() {
                    acc.total_length += v.to_string().len() as u64;
                    acc.num_strings += 1;
                }
            }
        } else if let Some(bytes) = bytes_values(flat.values.as_ref()) {
            for b in bytes.into_iter().flatten() {
                acc.total_length += b.len() as u64;
                acc.num_strings += 1;
            }
        } else if let Some(floats) = float_values(flat.values.as_ref())? {
            for (i, x) in floats.iter().enumerate() {
                let Some(x) = x.filter(|x| !x.is_nan()) else {
                    continue;
                };
                acc.moments.add(x, 1.0);
                if let Some(w) = weight_of(i) {
                    acc.weighted_moments.add(x, w);
                }
                if x == 0.0 {
                    acc.num_zeros += 1;
                }
                acc.min = min_opt(acc.min, Some(x));
                acc.max = max_opt(acc.max, Some(x));
            }
        }
        Ok(())
    }

    fn make_feature_stats(&self, path: &FeaturePath, acc: &BasicFeatureAccumulator) -> Option<FeatureNameStatistics> {
        let feature_type = acc.feature_type?;
        let weighted = self.weight_feature.is_some();
        let avg = |tot: f64, n: f64| if n > 0.0 { tot / n } else { 0.0 };
        let common = CommonStatistics {
            num_non_missing: acc.num_non_missing,
            num_missing: 0,
            min_num_values: acc.min_num_values.unwrap_or(0),
            max_num_values: acc.max_num_values,
            avg_num_values: avg(acc.tot_num_values as f64, acc.num_non_missing as f64),
            tot_num_values: acc.tot_num_values,
            weighted_common_stats: weighted.then(|| WeightedCommonStatistics {
                num_non_missing: acc.weighted_num_non_missing,
                num_missing: 0.0,
                avg_num_values: avg(acc.weighted_tot_num_values, acc.weighted_num_non_missing),
                tot_num_values: acc.weighted_tot_num_values,
            }),
        };

        let mut stats = FeatureNameStatistics::new(path.clone());
        stats.feature_type = Some(feature_type);
        let is_string = feature_type == FeatureType::String || self.categorical_features.contains(path);
        if is_string {
            stats.string_stats = Some(StringStatistics {
                common_stats: Some(common),
                avg_length: avg(acc.total_length as f64, acc.num_strings as f64),
                ..StringStatistics::default()
            });
        } else {
            let (mean, std_dev) = acc.moments.mean_and_std_dev();
            stats.num_stats = Some(NumericStatistics {
                common_stats: Some(common),
                mean,
                std_dev,
                num_zeros: acc.num_zeros,
                min: acc.min.unwrap_or(0.0),
                max: acc.max.unwrap_or(0.0),
                weighted_numeric_stats: weighted.then(|| {
                    let (mean, std_dev) = acc.weighted_moments.mean_and_std_dev();
                    WeightedNumericStatistics { mean, std_dev }
                }),
            });
        }
        Some(stats)
    }
}

impl CombinerStatsGenerator for BasicStatsGenerator {
    type Accumulator = HashMap<FeaturePath, BasicFeatureAccumulator>;

    fn name(&self) -> &str {
        "BasicStatsGenerator"
    }

    fn create_accumulator(&self) -> Self::Accumulator {
        HashMap::new()
    }

    fn add_input(&self, acc: &mut Self::Accumulator, batch: &RecordBatch) -> Result<()> {
        let weights = match &self.weight_feature {
            Some(w) if batch.num_rows() > 0 => Some(row_weights(batch, w)?),
            _ => None,
        };
        let weight_path = self.weight_feature.as_deref().map(FeaturePath::from_name);
        for (path, column) in enumerate_arrays(batch)? {
            if weight_path.as_ref() == Some(&path) || column.null_count() == column.len() {
                continue;
            }
            let Some(feature_type) = feature_type_of(column.data_type()).filter(|t| *t != FeatureType::Struct)
            else {
                continue;
            };
            let feature_acc = acc.entry(path.clone()).or_default();
            if feature_acc.invalidated || !feature_acc.check_type(&path, feature_type) {
                continue;
            }
            self.add_column(feature_acc, &path, &column, weights.as_deref())?;
        }
        Ok(())
    }

    fn merge_accumulators(&self, accs: Vec<Self::Accumulator>) -> Result<Self::Accumulator> {
        let mut result = self.create_accumulator();
        for acc in accs {
            for (path, feature_acc) in acc {
                match result.get_mut(&path) {
                    Some(existing) => existing.merge(&path, feature_acc),
                    None => {
                        result.insert(path, feature_acc);
                    }
                }
            }
        }
        Ok(result)
    }

    fn extract_output(&self, acc: &Self::Accumulator) -> Result<DatasetFeatureStatistics> {
        let mut paths: Vec<&FeaturePath> = acc.keys().collect();
        paths.sort();
        let features = paths
            .into_iter()
            .filter(|p| !acc[*p].invalidated)
            .filter_map(|p| self.make_feature_stats(p, &acc[p]))
            .collect();
        Ok(DatasetFeatureStatistics {
            features,
            ..DatasetFeatureStatistics::default()
        })
    }
}
