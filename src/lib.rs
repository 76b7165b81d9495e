//! # Ironstats
//!
//! A **combiner-based statistics engine** for columnar datasets stored as arrow record
//! batches. Ironstats computes descriptive statistics per feature (counts, numeric
//! moments, top values and uniques, domain annotations) in a single pass over batched,
//! optionally sliced and optionally weighted input.
//!
//! ## Key Features
//!
//! - **Accumulator algebra** - every generator follows create / add / merge / extract,
//!   with associative, order-independent merges
//! - **Batching** - small batches are buffered and folded into all generators at once
//! - **Slicing** - statistics per slice key, with overlapping slices allowed
//! - **Weighted statistics** - a per-row weight column drives weighted counts and moments
//! - **Sequential and parallel execution** - partitions folded and merged on rayon
//! - **Invalidation instead of failure** - bad values drop a feature's statistics, never
//!   the run
//!
//! ## Quick Start
//!
//! ```
//! use ironstats::testing::BatchBuilder;
//! use ironstats::{FeaturePath, Runner, StatsOptions, generate_statistics};
//!
//! # fn main() -> ironstats::Result<()> {
//! let batches = vec![
//!     BatchBuilder::new()
//!         .strings("fruit", vec![Some(vec!["apple"]), Some(vec!["pear"]), None])
//!         .build()?,
//!     BatchBuilder::new()
//!         .strings("fruit", vec![Some(vec!["apple"])])
//!         .build()?,
//! ];
//!
//! let stats = generate_statistics(batches, &StatsOptions::default(), &Runner::default())?;
//! let dataset = stats.single_dataset()?;
//! assert_eq!(dataset.num_examples, 4);
//!
//! let fruit = dataset.get_feature_stats(&FeaturePath::from_name("fruit")).unwrap();
//! let string_stats = fruit.string_stats.as_ref().unwrap();
//! assert_eq!(string_stats.unique, 2);
//! assert_eq!(string_stats.top_values[0].value, "apple");
//! assert_eq!(fruit.common_stats().unwrap().num_missing, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Generators
//!
//! A generator is one of the kinds of [`StatsGenerator`]:
//! - a dataset-level [`CombinerStatsGenerator`](generator::CombinerStatsGenerator) folding
//!   whole batches,
//! - a single-feature [`CombinerFeatureStatsGenerator`](generator::CombinerFeatureStatsGenerator)
//!   folding one column at a time,
//! - a whole-stream [`TransformStatsGenerator`](generator::TransformStatsGenerator)
//!   running on the sliced stream through the [`Runner`].
//!
//! ### Pipeline
//!
//! [`generate_statistics`] filters whitelisted columns, slices each batch, folds every
//! dataset-level combiner per slice (behind one
//! [`BatchingCombiner`](batching::BatchingCombiner)), runs every whole-stream
//! generator, unions the per-generator summaries by feature path and reconciles
//! example and missing counts.
//!
//! ### Output
//!
//! A [`DatasetFeatureStatisticsList`] holds one dataset per slice, ordered by slice key.

pub mod arrow_util;
pub mod batching;
pub mod combiners;
pub mod error;
pub mod generator;
pub mod generators;
pub mod metrics;
pub mod options;
pub mod runner;
pub mod schema;
pub mod slicing;
pub mod statistics;
pub mod stats_impl;
pub mod testing;
pub mod types;
pub mod value_counts;

// General re-exports
pub use combiners::{CombineFn, Count, Sum, TopK};
pub use error::{Result, StatsError};
pub use generator::StatsGenerator;
pub use metrics::MetricsCollector;
pub use options::StatsOptions;
pub use runner::{ExecMode, Runner};
pub use schema::Schema;
pub use statistics::{
    DatasetFeatureStatistics, DatasetFeatureStatisticsList, FeatureNameStatistics, MergeFrom,
};
pub use stats_impl::{
    generate_sliced_statistics, generate_statistics, generate_statistics_in_memory,
};
pub use types::{FeaturePath, FeatureType, FeatureValue, SliceKey};
