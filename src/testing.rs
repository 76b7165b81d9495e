//! Testing utilities for statistics generators.
//!
//! - **Builders**: list-array and record-batch builders ([`BatchBuilder`]).
//! - **Assertions**: run a generator over every merge grouping and compare the
//!   summaries ([`assert_combiner_output_eq`], [`assert_feature_combiner_output_eq`]).
//!
//! # Quick Start
//!
//! ```
//! use ironstats::generators::NumExamplesStatsGenerator;
//! use ironstats::statistics::{CustomStatistic, DatasetFeatureStatistics, FeatureNameStatistics};
//! use ironstats::testing::*;
//! use ironstats::generators::{NUM_EXAMPLES_KEY, internal_feature_path};
//!
//! # fn main() -> ironstats::Result<()> {
//! let batches = vec![
//!     BatchBuilder::new().ints("a", vec![Some(vec![1]), None]).build()?,
//!     BatchBuilder::new().ints("a", vec![Some(vec![2])]).build()?,
//! ];
//! let mut internal = FeatureNameStatistics::new(internal_feature_path());
//! internal.custom_stats.push(CustomStatistic::num(NUM_EXAMPLES_KEY, 3.0));
//! let expected = DatasetFeatureStatistics {
//!     features: vec![internal],
//!     ..DatasetFeatureStatistics::default()
//! };
//! assert_combiner_output_eq(&NumExamplesStatsGenerator::new(None), &batches, &expected)?;
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;

pub use assertions::*;
pub use builders::*;
