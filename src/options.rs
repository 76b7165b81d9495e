//! Configuration for a statistics run.

use crate::error::{Result, StatsError};
use crate::generator::StatsGenerator;
use crate::schema::Schema;
use crate::slicing::SliceFn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Rows buffered by the batching combiner before a flush, unless configured.
pub const DEFAULT_DESIRED_BATCH_SIZE: usize = 1000;

/// Seed for semantic-domain sub-sampling when none is configured.
pub const DEFAULT_SAMPLE_SEED: u64 = 0x5eed;

/// Options recognised by the statistics pipeline.
///
/// Everything except [`slice_functions`](Self::slice_functions) and
/// [`generators`](Self::generators) round-trips through JSON.
///
/// ```
/// use ironstats::StatsOptions;
///
/// let opts = StatsOptions::default()
///     .with_weight_feature("w")
///     .with_num_top_values(5);
/// opts.validate()?;
/// assert_eq!(opts.desired_batch_size(), 1000);
/// # Ok::<(), ironstats::StatsError>(())
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsOptions {
    /// Column holding one numeric weight per row.
    pub weight_feature: Option<String>,
    /// Only these top-level columns (plus the weight feature) are profiled.
    pub feature_whitelist: Option<Vec<String>>,
    pub schema: Option<Schema>,
    pub num_top_values: usize,
    pub frequency_threshold: u64,
    pub weighted_frequency_threshold: f64,
    pub num_rank_histogram_buckets: usize,
    pub desired_batch_size: Option<usize>,
    pub enable_semantic_domain_stats: bool,
    /// Probability of each batch being seen by semantic-domain generators.
    pub semantic_domain_stats_sample_rate: Option<f64>,
    pub sample_seed: Option<u64>,
    #[serde(skip)]
    pub slice_functions: Vec<SliceFn>,
    /// Custom generators run in addition to the built-in ones.
    #[serde(skip)]
    pub generators: Vec<StatsGenerator>,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            weight_feature: None,
            feature_whitelist: None,
            schema: None,
            num_top_values: 20,
            frequency_threshold: 1,
            weighted_frequency_threshold: 1.0,
            num_rank_histogram_buckets: 1000,
            desired_batch_size: None,
            enable_semantic_domain_stats: false,
            semantic_domain_stats_sample_rate: None,
            sample_seed: None,
            slice_functions: Vec::new(),
            generators: Vec::new(),
        }
    }
}

impl fmt::Debug for StatsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsOptions")
            .field("weight_feature", &self.weight_feature)
            .field("feature_whitelist", &self.feature_whitelist)
            .field("schema", &self.schema.as_ref().map(|s| s.features.len()))
            .field("num_top_values", &self.num_top_values)
            .field("frequency_threshold", &self.frequency_threshold)
            .field("weighted_frequency_threshold", &self.weighted_frequency_threshold)
            .field("num_rank_histogram_buckets", &self.num_rank_histogram_buckets)
            .field("desired_batch_size", &self.desired_batch_size)
            .field("enable_semantic_domain_stats", &self.enable_semantic_domain_stats)
            .field(
                "semantic_domain_stats_sample_rate",
                &self.semantic_domain_stats_sample_rate,
            )
            .field("sample_seed", &self.sample_seed)
            .field("slice_functions", &self.slice_functions.len())
            .field("generators", &self.generators)
            .finish()
    }
}

impl StatsOptions {
    #[must_use]
    pub fn with_weight_feature(mut self, name: impl Into<String>) -> Self {
        self.weight_feature = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_feature_whitelist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_whitelist = Some(names.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub const fn with_num_top_values(mut self, n: usize) -> Self {
        self.num_top_values = n;
        self
    }

    #[must_use]
    pub const fn with_frequency_threshold(mut self, n: u64) -> Self {
        self.frequency_threshold = n;
        self
    }

    #[must_use]
    pub const fn with_weighted_frequency_threshold(mut self, t: f64) -> Self {
        self.weighted_frequency_threshold = t;
        self
    }

    #[must_use]
    pub const fn with_num_rank_histogram_buckets(mut self, n: usize) -> Self {
        self.num_rank_histogram_buckets = n;
        self
    }

    #[must_use]
    pub const fn with_desired_batch_size(mut self, n: usize) -> Self {
        self.desired_batch_size = Some(n);
        self
    }

    #[must_use]
    pub const fn with_semantic_domain_stats(mut self, sample_rate: Option<f64>) -> Self {
        self.enable_semantic_domain_stats = true;
        self.semantic_domain_stats_sample_rate = sample_rate;
        self
    }

    #[must_use]
    pub const fn with_sample_seed(mut self, seed: u64) -> Self {
        self.sample_seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_slice_function(mut self, f: SliceFn) -> Self {
        self.slice_functions.push(f);
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: StatsGenerator) -> Self {
        self.generators.push(generator);
        self
    }

    /// Target rows per batching flush.
    #[must_use]
    pub fn desired_batch_size(&self) -> usize {
        self.desired_batch_size.unwrap_or(DEFAULT_DESIRED_BATCH_SIZE)
    }

    #[must_use]
    pub fn sample_seed(&self) -> u64 {
        self.sample_seed.unwrap_or(DEFAULT_SAMPLE_SEED)
    }

    #[must_use]
    pub fn is_slicing_enabled(&self) -> bool {
        !self.slice_functions.is_empty()
    }

    /// Check every option against its valid range.
    ///
    /// # Errors
    /// [`StatsError::InvalidOption`] naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        if self.num_top_values == 0 {
            return Err(StatsError::invalid_option("num_top_values", "must be > 0"));
        }
        if self.frequency_threshold < 1 {
            return Err(StatsError::invalid_option("frequency_threshold", "must be >= 1"));
        }
        if !self.weighted_frequency_threshold.is_finite() || self.weighted_frequency_threshold < 0.0 {
            return Err(StatsError::invalid_option(
                "weighted_frequency_threshold",
                "must be a finite value >= 0",
            ));
        }
        if self.num_rank_histogram_buckets == 0 {
            return Err(StatsError::invalid_option("num_rank_histogram_buckets", "must be > 0"));
        }
        if self.desired_batch_size == Some(0) {
            return Err(StatsError::invalid_option("desired_batch_size", "must be > 0"));
        }
        if let Some(rate) = self.semantic_domain_stats_sample_rate
            && !(rate > 0.0 && rate <= 1.0)
        {
            return Err(StatsError::invalid_option(
                "semantic_domain_stats_sample_rate",
                format!("must be in (0, 1], got {rate}"),
            ));
        }
        Ok(())
    }

    /// Parse and validate options from JSON.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(s)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
