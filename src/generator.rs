//! Statistics generator contracts.
//!
//! A generator is one of three kinds:
//!
//! - [`CombinerStatsGenerator`]: consumes whole record batches through the
//!   create / add / merge / extract accumulator protocol.
//! - [`CombinerFeatureStatsGenerator`]: consumes one feature column at a time; it runs
//!   wrapped in a [`FeatureWrapperGenerator`](crate::generators::FeatureWrapperGenerator).
//! - [`TransformStatsGenerator`]: consumes the whole sliced stream through the
//!   [`Runner`] and produces per-slice summaries directly.
//!
//! The pipeline handles generators through the closed [`StatsGenerator`] enum, with the
//! accumulator type erased behind [`AnyAccumulator`].

use crate::error::{Result, StatsError};
use crate::runner::Runner;
use crate::statistics::{DatasetFeatureStatistics, FeatureNameStatistics};
use crate::types::{FeaturePath, SliceKey};
use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Accumulator of some generator, with its concrete type erased.
pub type AnyAccumulator = Box<dyn Any + Send>;

/// Dataset-level combiner over record batches.
pub trait CombinerStatsGenerator: Send + Sync {
    type Accumulator: Send + 'static;

    fn name(&self) -> &str;

    /// A fresh zero-valued accumulator sharing nothing with any other.
    fn create_accumulator(&self) -> Self::Accumulator;

    /// Fold one batch in. Type mismatches invalidate the accumulator rather than fail.
    fn add_input(&self, acc: &mut Self::Accumulator, batch: &RecordBatch) -> Result<()>;

    /// Merge any number of accumulators, in any order.
    fn merge_accumulators(&self, accs: Vec<Self::Accumulator>) -> Result<Self::Accumulator>;

    fn compact(&self, _acc: &mut Self::Accumulator) -> Result<()> {
        Ok(())
    }

    /// Final summary. Must not mutate anything observable.
    fn extract_output(&self, acc: &Self::Accumulator) -> Result<DatasetFeatureStatistics>;
}

/// Single-feature combiner over one column at a time.
pub trait CombinerFeatureStatsGenerator: Send + Sync {
    type Accumulator: Send + 'static;

    fn name(&self) -> &str;

    fn create_accumulator(&self) -> Self::Accumulator;

    fn add_input(&self, acc: &mut Self::Accumulator, path: &FeaturePath, column: &ArrayRef) -> Result<()>;

    fn merge_accumulators(&self, accs: Vec<Self::Accumulator>) -> Result<Self::Accumulator>;

    /// Summary for the feature at `path`; an empty summary means nothing to report.
    fn extract_output(&self, path: &FeaturePath, acc: &Self::Accumulator) -> Result<FeatureNameStatistics>;
}

/// Generator that processes the whole sliced stream itself.
pub trait TransformStatsGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn transform(
        &self,
        runner: &Runner,
        sliced: &[(SliceKey, RecordBatch)],
    ) -> Result<Vec<(SliceKey, DatasetFeatureStatistics)>>;
}

/* ===================== Type erasure ===================== */

/// Object-safe view of a [`CombinerStatsGenerator`].
pub trait DynCombiner: Send + Sync {
    fn name(&self) -> &str;
    fn create_accumulator(&self) -> AnyAccumulator;
    fn add_input(&self, acc: &mut AnyAccumulator, batch: &RecordBatch) -> Result<()>;
    fn merge_accumulators(&self, accs: Vec<AnyAccumulator>) -> Result<AnyAccumulator>;
    fn compact(&self, acc: &mut AnyAccumulator) -> Result<()>;
    fn extract_output(&self, acc: &AnyAccumulator) -> Result<DatasetFeatureStatistics>;
}

/// Object-safe view of a [`CombinerFeatureStatsGenerator`].
pub trait DynFeatureCombiner: Send + Sync {
    fn name(&self) -> &str;
    fn create_accumulator(&self) -> AnyAccumulator;
    fn add_input(&self, acc: &mut AnyAccumulator, path: &FeaturePath, column: &ArrayRef) -> Result<()>;
    fn merge_accumulators(&self, accs: Vec<AnyAccumulator>) -> Result<AnyAccumulator>;
    fn extract_output(&self, path: &FeaturePath, acc: &AnyAccumulator) -> Result<FeatureNameStatistics>;
}

fn downcast_mut<'a, A: 'static>(name: &str, acc: &'a mut AnyAccumulator) -> Result<&'a mut A> {
    acc.downcast_mut::<A>()
        .ok_or_else(|| StatsError::AccumulatorMismatch(name.to_string()))
}

fn downcast_ref<'a, A: 'static>(name: &str, acc: &'a AnyAccumulator) -> Result<&'a A> {
    acc.downcast_ref::<A>()
        .ok_or_else(|| StatsError::AccumulatorMismatch(name.to_string()))
}

fn downcast_all<A: 'static>(name: &str, accs: Vec<AnyAccumulator>) -> Result<Vec<A>> {
    accs.into_iter()
        .map(|a| {
            a.downcast::<A>()
                .map(|b| *b)
                .map_err(|_| StatsError::AccumulatorMismatch(name.to_string()))
        })
        .collect()
}

impl<G: CombinerStatsGenerator> DynCombiner for G {
    fn name(&self) -> &str {
        CombinerStatsGenerator::name(self)
    }

    fn create_accumulator(&self) -> AnyAccumulator {
        Box::new(CombinerStatsGenerator::create_accumulator(self))
    }

    fn add_input(&self, acc: &mut AnyAccumulator, batch: &RecordBatch) -> Result<()> {
        let acc = downcast_mut::<G::Accumulator>(CombinerStatsGenerator::name(self), acc)?;
        CombinerStatsGenerator::add_input(self, acc, batch)
    }

    fn merge_accumulators(&self, accs: Vec<AnyAccumulator>) -> Result<AnyAccumulator> {
        let accs = downcast_all::<G::Accumulator>(CombinerStatsGenerator::name(self), accs)?;
        Ok(Box::new(CombinerStatsGenerator::merge_accumulators(self, accs)?))
    }

    fn compact(&self, acc: &mut AnyAccumulator) -> Result<()> {
        let acc = downcast_mut::<G::Accumulator>(CombinerStatsGenerator::name(self), acc)?;
        CombinerStatsGenerator::compact(self, acc)
    }

    fn extract_output(&self, acc: &AnyAccumulator) -> Result<DatasetFeatureStatistics> {
        let acc = downcast_ref::<G::Accumulator>(CombinerStatsGenerator::name(self), acc)?;
        CombinerStatsGenerator::extract_output(self, acc)
    }
}

impl<G: CombinerFeatureStatsGenerator> DynFeatureCombiner for G {
    fn name(&self) -> &str {
        CombinerFeatureStatsGenerator::name(self)
    }

    fn create_accumulator(&self) -> AnyAccumulator {
        Box::new(CombinerFeatureStatsGenerator::create_accumulator(self))
    }

    fn add_input(&self, acc: &mut AnyAccumulator, path: &FeaturePath, column: &ArrayRef) -> Result<()> {
        let acc = downcast_mut::<G::Accumulator>(CombinerFeatureStatsGenerator::name(self), acc)?;
        CombinerFeatureStatsGenerator::add_input(self, acc, path, column)
    }

    fn merge_accumulators(&self, accs: Vec<AnyAccumulator>) -> Result<AnyAccumulator> {
        let accs = downcast_all::<G::Accumulator>(CombinerFeatureStatsGenerator::name(self), accs)?;
        Ok(Box::new(CombinerFeatureStatsGenerator::merge_accumulators(self, accs)?))
    }

    fn extract_output(&self, path: &FeaturePath, acc: &AnyAccumulator) -> Result<FeatureNameStatistics> {
        let acc = downcast_ref::<G::Accumulator>(CombinerFeatureStatsGenerator::name(self), acc)?;
        CombinerFeatureStatsGenerator::extract_output(self, path, acc)
    }
}

/* ===================== StatsGenerator ===================== */

/// A generator of any kind, as configured on
/// [`StatsOptions::generators`](crate::StatsOptions::generators).
#[derive(Clone)]
pub enum StatsGenerator {
    Combiner(Arc<dyn DynCombiner>),
    FeatureCombiner(Arc<dyn DynFeatureCombiner>),
    Transform(Arc<dyn TransformStatsGenerator>),
}

impl StatsGenerator {
    pub fn combiner<G: CombinerStatsGenerator + 'static>(generator: G) -> Self {
        Self::Combiner(Arc::new(generator))
    }

    pub fn feature_combiner<G: CombinerFeatureStatsGenerator + 'static>(generator: G) -> Self {
        Self::FeatureCombiner(Arc::new(generator))
    }

    pub fn transform<G: TransformStatsGenerator + 'static>(generator: G) -> Self {
        Self::Transform(Arc::new(generator))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Combiner(g) => g.name(),
            Self::FeatureCombiner(g) => g.name(),
            Self::Transform(g) => g.name(),
        }
    }
}

impl fmt::Debug for StatsGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Combiner(_) => "Combiner",
            Self::FeatureCombiner(_) => "FeatureCombiner",
            Self::Transform(_) => "Transform",
        };
        f.debug_tuple(kind).field(&self.name()).finish()
    }
}
