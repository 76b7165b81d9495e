//! The nested statistics summary produced by every generator.
//!
//! The layout mirrors the external statistics-summary schema closely enough that callers
//! can map it onto their wire format field by field: a
//! [`DatasetFeatureStatisticsList`] holds one [`DatasetFeatureStatistics`] per slice,
//! which holds one [`FeatureNameStatistics`] per feature path.
//!
//! Summaries produced by different generators for the same feature are combined with
//! [`MergeFrom::merge_from`], which follows protobuf merge semantics: scalar fields that
//! carry a non-default value overwrite, repeated fields append and nested messages merge
//! recursively. Two generators that populate disjoint fields therefore union cleanly.

use crate::error::{Result, StatsError};
use crate::types::{FeaturePath, FeatureType};
use serde::{Deserialize, Serialize};

/// Field-wise merge of two values of the same summary type.
pub trait MergeFrom {
    fn merge_from(&mut self, other: Self);
}

macro_rules! merge_scalars {
    ($dst:ident, $src:ident; $($field:ident),+ $(,)?) => {
        $(
            if !is_default(&$src.$field) {
                $dst.$field = $src.$field;
            }
        )+
    };
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

fn merge_message<T: MergeFrom>(dst: &mut Option<T>, src: Option<T>) {
    match (dst.as_mut(), src) {
        (Some(d), Some(s)) => d.merge_from(s),
        (None, Some(s)) => *dst = Some(s),
        _ => {}
    }
}

/* ===================== Dataset level ===================== */

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetFeatureStatisticsList {
    pub datasets: Vec<DatasetFeatureStatistics>,
}

impl DatasetFeatureStatisticsList {
    /// The only dataset in the list.
    ///
    /// # Errors
    /// [`StatsError::SliceCount`] unless the list holds exactly one dataset.
    pub fn single_dataset(&self) -> Result<&DatasetFeatureStatistics> {
        match self.datasets.as_slice() {
            [one] => Ok(one),
            other => Err(StatsError::SliceCount {
                expected: 1,
                found: other.len(),
            }),
        }
    }

    /// Dataset for the slice with the given name (`""` for the unnamed slice).
    #[must_use]
    pub fn slice(&self, name: &str) -> Option<&DatasetFeatureStatistics> {
        self.datasets.iter().find(|d| d.name == name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetFeatureStatistics {
    /// Slice name; empty unless slicing is enabled.
    pub name: String,
    pub num_examples: u64,
    pub weighted_num_examples: f64,
    pub features: Vec<FeatureNameStatistics>,
}

impl DatasetFeatureStatistics {
    #[must_use]
    pub fn get_feature_stats(&self, path: &FeaturePath) -> Option<&FeatureNameStatistics> {
        self.features.iter().find(|f| &f.path == path)
    }

    pub fn get_feature_stats_mut(&mut self, path: &FeaturePath) -> Option<&mut FeatureNameStatistics> {
        self.features.iter_mut().find(|f| &f.path == path)
    }

    /// Remove and return the entry for `path`, if any.
    pub fn remove_feature(&mut self, path: &FeaturePath) -> Option<FeatureNameStatistics> {
        let idx = self.features.iter().position(|f| &f.path == path)?;
        Some(self.features.remove(idx))
    }
}

/* ===================== Feature level ===================== */

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureNameStatistics {
    pub path: FeaturePath,
    pub feature_type: Option<FeatureType>,
    pub num_stats: Option<NumericStatistics>,
    pub string_stats: Option<StringStatistics>,
    pub custom_stats: Vec<CustomStatistic>,
}

impl FeatureNameStatistics {
    #[must_use]
    pub fn new(path: FeaturePath) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    /// True when no statistic of any kind has been populated.
    #[must_use]
    pub fn has_no_stats(&self) -> bool {
        self.feature_type.is_none()
            && self.num_stats.is_none()
            && self.string_stats.is_none()
            && self.custom_stats.is_empty()
    }

    #[must_use]
    pub fn custom_stat(&self, name: &str) -> Option<&CustomStatistic> {
        self.custom_stats.iter().find(|c| c.name == name)
    }

    /// Common stats of whichever stats kind is populated, numeric first.
    #[must_use]
    pub fn common_stats(&self) -> Option<&CommonStatistics> {
        match (&self.num_stats, &self.string_stats) {
            (Some(n), _) => n.common_stats.as_ref(),
            (None, Some(s)) => s.common_stats.as_ref(),
            (None, None) => None,
        }
    }

    /// Mutable common stats, created under the string stats when neither kind exists.
    pub fn common_stats_mut(&mut self) -> &mut CommonStatistics {
        if let Some(n) = self.num_stats.as_mut() {
            return n.common_stats.get_or_insert_with(CommonStatistics::default);
        }
        self.string_stats
            .get_or_insert_with(StringStatistics::default)
            .common_stats
            .get_or_insert_with(CommonStatistics::default)
    }
}

impl MergeFrom for FeatureNameStatistics {
    fn merge_from(&mut self, other: Self) {
        if other.feature_type.is_some() {
            self.feature_type = other.feature_type;
        }
        merge_message(&mut self.num_stats, other.num_stats);
        merge_message(&mut self.string_stats, other.string_stats);
        self.custom_stats.extend(other.custom_stats);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonStatistics {
    pub num_non_missing: u64,
    pub num_missing: u64,
    pub min_num_values: u64,
    pub max_num_values: u64,
    pub avg_num_values: f64,
    pub tot_num_values: u64,
    pub weighted_common_stats: Option<WeightedCommonStatistics>,
}

impl MergeFrom for CommonStatistics {
    fn merge_from(&mut self, other: Self) {
        merge_scalars!(self, other;
            num_non_missing, num_missing, min_num_values, max_num_values,
            avg_num_values, tot_num_values);
        merge_message(&mut self.weighted_common_stats, other.weighted_common_stats);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedCommonStatistics {
    pub num_non_missing: f64,
    pub num_missing: f64,
    pub avg_num_values: f64,
    pub tot_num_values: f64,
}

impl MergeFrom for WeightedCommonStatistics {
    fn merge_from(&mut self, other: Self) {
        merge_scalars!(self, other; num_non_missing, num_missing, avg_num_values, tot_num_values);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericStatistics {
    pub common_stats: Option<CommonStatistics>,
    pub mean: f64,
    pub std_dev: f64,
    pub num_zeros: u64,
    pub min: f64,
    pub max: f64,
    pub weighted_numeric_stats: Option<WeightedNumericStatistics>,
}

impl MergeFrom for NumericStatistics {
    fn merge_from(&mut self, other: Self) {
        merge_message(&mut self.common_stats, other.common_stats);
        merge_scalars!(self, other; mean, std_dev, num_zeros, min, max);
        merge_message(&mut self.weighted_numeric_stats, other.weighted_numeric_stats);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedNumericStatistics {
    pub mean: f64,
    pub std_dev: f64,
}

impl MergeFrom for WeightedNumericStatistics {
    fn merge_from(&mut self, other: Self) {
        merge_scalars!(self, other; mean, std_dev);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StringStatistics {
    pub common_stats: Option<CommonStatistics>,
    pub unique: u64,
    pub top_values: Vec<FreqAndValue>,
    pub avg_length: f64,
    pub rank_histogram: Option<RankHistogram>,
    pub weighted_string_stats: Option<WeightedStringStatistics>,
}

impl MergeFrom for StringStatistics {
    fn merge_from(&mut self, other: Self) {
        merge_message(&mut self.common_stats, other.common_stats);
        merge_scalars!(self, other; unique, avg_length);
        self.top_values.extend(other.top_values);
        merge_message(&mut self.rank_histogram, other.rank_histogram);
        merge_message(&mut self.weighted_string_stats, other.weighted_string_stats);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedStringStatistics {
    pub top_values: Vec<FreqAndValue>,
    pub rank_histogram: Option<RankHistogram>,
}

impl MergeFrom for WeightedStringStatistics {
    fn merge_from(&mut self, other: Self) {
        self.top_values.extend(other.top_values);
        merge_message(&mut self.rank_histogram, other.rank_histogram);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FreqAndValue {
    pub value: String,
    pub frequency: f64,
}

/// Ordered (value, count) buckets ranked by descending frequency.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RankHistogram {
    pub buckets: Vec<RankBucket>,
}

impl MergeFrom for RankHistogram {
    fn merge_from(&mut self, other: Self) {
        self.buckets.extend(other.buckets);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RankBucket {
    pub low_rank: u64,
    pub high_rank: u64,
    pub label: String,
    pub sample_count: f64,
}

/// A named statistic outside the fixed schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomStatistic {
    pub name: String,
    pub value: CustomValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CustomValue {
    Num(f64),
    Str(String),
}

impl CustomStatistic {
    pub fn num(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: CustomValue::Num(value),
        }
    }

    pub fn str(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: CustomValue::Str(value.into()),
        }
    }

    #[must_use]
    pub fn as_num(&self) -> Option<f64> {
        match self.value {
            CustomValue::Num(v) => Some(v),
            CustomValue::Str(_) => None,
        }
    }
}
