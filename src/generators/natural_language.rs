//! Natural-language domain detection for string features.

use crate::arrow_util::{bytes_values, flatten, leaf_data_type};
use crate::error::{Result, StatsError};
use crate::generator::CombinerFeatureStatsGenerator;
use crate::statistics::{CustomStatistic, FeatureNameStatistics};
use crate::types::FeaturePath;
use arrow::array::ArrayRef;
use arrow::datatypes::DataType;
use log::warn;
use std::ops::AddAssign;
use std::sync::Arc;

pub const DOMAIN_INFO_STAT: &str = "domain_info";
pub const MATCH_RATE_STAT: &str = "natural_language_match_rate";

/// Decides whether a single string value looks like natural language.
pub trait NLClassifier: Send + Sync {
    fn classify(&self, value: &str) -> bool;
}

/// Classifies a value as text when its average word length and word count fall in
/// configured ranges.
///
/// ```
/// use ironstats::generators::{AverageWordHeuristic, NLClassifier};
///
/// // Average word length 3.8 over five words.
/// assert!(AverageWordHeuristic::default().classify("Hello this is some text"));
/// assert!(!AverageWordHeuristic::default().classify("xosuhddsofuhg123fdgosh"));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AverageWordHeuristic {
    pub avg_word_length_min: f64,
    pub avg_word_length_max: f64,
    pub min_words_per_value: usize,
    /// Only the first `crop_at_length` characters are inspected.
    pub crop_at_length: usize,
}

impl Default for AverageWordHeuristic {
    fn default() -> Self {
        Self {
            avg_word_length_min: 2.5,
            avg_word_length_max: 8.0,
            min_words_per_value: 3,
            crop_at_length: 100,
        }
    }
}

impl NLClassifier for AverageWordHeuristic {
    fn classify(&self, value: &str) -> bool {
        let cropped: String = value.chars().take(self.crop_at_length).collect();
        let words: Vec<&str> = cropped.split_whitespace().collect();
        if words.is_empty() || words.len() < self.min_words_per_value {
            return false;
        }
        let total: usize = words.iter().map(|w| w.chars().count()).sum();
        let avg = total as f64 / words.len() as f64;
        (self.avg_word_length_min..=self.avg_word_length_max).contains(&avg)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartialNLStats {
    pub matched: u64,
    pub considered: u64,
    pub invalidated: bool,
}

impl AddAssign for PartialNLStats {
    fn add_assign(&mut self, other: Self) {
        self.matched += other.matched;
        self.considered += other.considered;
        self.invalidated |= other.invalidated;
    }
}

/// Annotates a feature with the natural-language domain when enough of its values
/// are classified as text.
#[derive(Clone)]
pub struct NaturalLanguageStatsGenerator {
    classifier: Arc<dyn NLClassifier>,
    match_ratio: f64,
    values_threshold: u64,
}

impl std::fmt::Debug for NaturalLanguageStatsGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NaturalLanguageStatsGenerator")
            .field("match_ratio", &self.match_ratio)
            .field("values_threshold", &self.values_threshold)
            .finish_non_exhaustive()
    }
}

impl NaturalLanguageStatsGenerator {
    pub const DEFAULT_MATCH_RATIO: f64 = 0.8;
    pub const DEFAULT_VALUES_THRESHOLD: u64 = 100;

    /// # Errors
    /// [`StatsError::InvalidOption`] if `values_threshold` is 0 or `match_ratio` lies
    /// outside `[0, 1]`.
    pub fn new(classifier: Arc<dyn NLClassifier>, match_ratio: f64, values_threshold: u64) -> Result<Self> {
        if values_threshold == 0 {
            return Err(StatsError::invalid_option(
                "values_threshold",
                "NLStatsGenerator expects values_threshold > 0.",
            ));
        }
        if !(0.0..=1.0).contains(&match_ratio) {
            return Err(StatsError::invalid_option(
                "match_ratio",
                "NLStatsGenerator expects a match_ratio in [0, 1].",
            ));
        }
        Ok(Self {
            classifier,
            match_ratio,
            values_threshold,
        })
    }

    /// The average-word heuristic with default thresholds.
    pub fn with_defaults() -> Result<Self> {
        Self::new(
            Arc::new(AverageWordHeuristic::default()),
            Self::DEFAULT_MATCH_RATIO,
            Self::DEFAULT_VALUES_THRESHOLD,
        )
    }
}

impl CombinerFeatureStatsGenerator for NaturalLanguageStatsGenerator {
    type Accumulator = PartialNLStats;

    fn name(&self) -> &str {
        "NaturalLanguageStatsGenerator"
    }

    fn create_accumulator(&self) -> PartialNLStats {
        PartialNLStats::default()
    }

    fn add_input(&self, acc: &mut PartialNLStats, path: &FeaturePath, column: &ArrayRef) -> Result<()> {
        if acc.invalidated || matches!(leaf_data_type(column.data_type()), DataType::Null) {
            return Ok(());
        }
        let flat = flatten(column)?;
        let Some(values) = bytes_values(flat.values.as_ref()) else {
            warn!(
                "Feature \"{path}\" has values of type {}; natural language detection skipped.",
                column.data_type()
            );
            acc.invalidated = true;
            return Ok(());
        };
        for bytes in values.into_iter().flatten() {
            let Ok(text) = std::str::from_utf8(bytes) else {
                warn!("Feature \"{path}\" has a value that is not valid UTF-8; natural language detection skipped.");
                acc.invalidated = true;
                return Ok(());
            };
            acc.considered += 1;
            if self.classifier.classify(text) {
                acc.matched += 1;
            }
        }
        Ok(())
    }

    fn merge_accumulators(&self, accs: Vec<PartialNLStats>) -> Result<PartialNLStats> {
        Ok(accs.into_iter().fold(self.create_accumulator(), |mut out, acc| {
            out += acc;
            out
        }))
    }

    fn extract_output(&self, path: &FeaturePath, acc: &PartialNLStats) -> Result<FeatureNameStatistics> {
        let mut result = FeatureNameStatistics::new(path.clone());
        if acc.invalidated || acc.considered < self.values_threshold {
            return Ok(result);
        }
        let match_rate = acc.matched as f64 / acc.considered as f64;
        if match_rate >= self.match_ratio {
            result
                .custom_stats
                .push(CustomStatistic::str(DOMAIN_INFO_STAT, "natural_language_domain {}"));
            result
                .custom_stats
                .push(CustomStatistic::num(MATCH_RATE_STAT, match_rate));
        }
        Ok(result)
    }
}
