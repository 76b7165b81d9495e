//! Batching wrapper around a list of dataset-level combiners.
//!
//! Dispatching every small record batch to every generator has a high fixed cost,
//! especially after slicing shrinks batches. [`BatchingCombiner`] buffers incoming
//! batches in its accumulator and folds them into the wrapped generators only once
//! enough rows have piled up, or when forced by [`CombineFn::compact`] or
//! [`CombineFn::finish`].

use crate::arrow_util::merge_batches;
use crate::combiners::CombineFn;
use crate::error::Result;
use crate::generator::{AnyAccumulator, DynCombiner};
use crate::metrics::{ADD_INPUT_BATCH_SIZE, MERGE_ACCUMULATOR_BATCH_SIZE, MetricsCollector, NUM_COMPACTS};
use crate::options::DEFAULT_DESIRED_BATCH_SIZE;
use crate::stats_impl::merge_dataset_feature_statistics;
use crate::statistics::DatasetFeatureStatistics;
use arrow::record_batch::RecordBatch;
use log::debug;
use std::sync::Arc;

/// Accumulators merged per group in [`BatchingCombiner::merge_all`](CombineFn::merge_all).
pub const DEFAULT_DESIRED_MERGE_ACCUMULATOR_BATCH_SIZE: usize = 100;

/// State of a [`BatchingCombiner`].
///
/// Pending batches are only dropped after being folded into every wrapped generator.
pub struct BatchingAccumulator {
    partial_accumulators: Vec<AnyAccumulator>,
    input_batches: Vec<RecordBatch>,
    curr_batch_size: usize,
}

impl BatchingAccumulator {
    /// Rows buffered but not yet folded.
    #[must_use]
    pub const fn pending_rows(&self) -> usize {
        self.curr_batch_size
    }

    #[must_use]
    pub fn num_pending_batches(&self) -> usize {
        self.input_batches.len()
    }
}

#[derive(Clone)]
pub struct BatchingCombiner {
    generators: Vec<Arc<dyn DynCombiner>>,
    desired_batch_size: usize,
    metrics: MetricsCollector,
}

impl BatchingCombiner {
    /// `desired_batch_size` of `None` (or 0) falls back to
    /// [`DEFAULT_DESIRED_BATCH_SIZE`].
    #[must_use]
    pub fn new(generators: Vec<Arc<dyn DynCombiner>>, desired_batch_size: Option<usize>, metrics: MetricsCollector) -> Self {
        Self {
            generators,
            desired_batch_size: desired_batch_size
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_DESIRED_BATCH_SIZE),
            metrics,
        }
    }

    #[must_use]
    pub const fn desired_batch_size(&self) -> usize {
        self.desired_batch_size
    }

    /// Fold the pending batches if there are enough rows, or any rows at all when forced.
    fn maybe_do_batch(&self, acc: &mut BatchingAccumulator, force: bool) -> Result<()> {
        let batch_size = acc.curr_batch_size;
        if !((force && batch_size > 0) || batch_size >= self.desired_batch_size) {
            return Ok(());
        }
        self.metrics.update_distribution(ADD_INPUT_BATCH_SIZE, batch_size as u64);
        debug!(
            "Flushing {batch_size} row(s) from {} pending batch(es)",
            acc.input_batches.len()
        );
        match acc.input_batches.as_slice() {
            [one] => fold_batch(&self.generators, &mut acc.partial_accumulators, one)?,
            many => match merge_batches(many) {
                Ok(merged) => fold_batch(&self.generators, &mut acc.partial_accumulators, &merged)?,
                // Same-name columns of different types are left for the generators to invalidate.
                Err(e) => {
                    debug!("Folding {} pending batch(es) one by one: {e}", many.len());
                    for batch in many {
                        fold_batch(&self.generators, &mut acc.partial_accumulators, batch)?;
                    }
                }
            },
        }
        acc.input_batches.clear();
        acc.curr_batch_size = 0;
        Ok(())
    }
}

fn fold_batch(generators: &[Arc<dyn DynCombiner>], partials: &mut [AnyAccumulator], batch: &RecordBatch) -> Result<()> {
    for (generator, partial) in generators.iter().zip(partials.iter_mut()) {
        generator.add_input(partial, batch)?;
    }
    Ok(())
}

impl CombineFn<RecordBatch, BatchingAccumulator, DatasetFeatureStatistics> for BatchingCombiner {
    fn create(&self) -> BatchingAccumulator {
        BatchingAccumulator {
            partial_accumulators: self.generators.iter().map(|g| g.create_accumulator()).collect(),
            input_batches: Vec::new(),
            curr_batch_size: 0,
        }
    }

    fn add_input(&self, acc: &mut BatchingAccumulator, batch: RecordBatch) -> Result<()> {
        // A zero-row batch has nothing to fold.
        if batch.num_rows() == 0 {
            return Ok(());
        }
        acc.curr_batch_size += batch.num_rows();
        acc.input_batches.push(batch);
        self.maybe_do_batch(acc, false)
    }

    fn merge(&self, acc: &mut BatchingAccumulator, other: BatchingAccumulator) -> Result<()> {
        self.metrics.update_distribution(MERGE_ACCUMULATOR_BATCH_SIZE, 2);
        // Pending batches stay in `acc` until a flush succeeds.
        acc.input_batches.extend(other.input_batches);
        acc.curr_batch_size += other.curr_batch_size;
        self.maybe_do_batch(acc, false)?;

        let current = std::mem::take(&mut acc.partial_accumulators);
        acc.partial_accumulators = self
            .generators
            .iter()
            .zip(current)
            .zip(other.partial_accumulators)
            .map(|((generator, mine), theirs)| generator.merge_accumulators(vec![mine, theirs]))
            .collect::<Result<_>>()?;
        Ok(())
    }

    fn merge_all(&self, accs: Vec<BatchingAccumulator>) -> Result<BatchingAccumulator> {
        let mut result = self.create();
        let mut accs = accs.into_iter().peekable();
        while accs.peek().is_some() {
            let group: Vec<BatchingAccumulator> = accs
                .by_ref()
                .take(DEFAULT_DESIRED_MERGE_ACCUMULATOR_BATCH_SIZE)
                .collect();
            self.metrics
                .update_distribution(MERGE_ACCUMULATOR_BATCH_SIZE, group.len() as u64);
            debug!("Merging a group of {} accumulator(s)", group.len());

            // Pool pending batches, flushing through the usual threshold as they pile up.
            let mut by_generator: Vec<Vec<AnyAccumulator>> =
                self.generators.iter().map(|_| Vec::new()).collect();
            for acc in group {
                result.input_batches.extend(acc.input_batches);
                result.curr_batch_size += acc.curr_batch_size;
                self.maybe_do_batch(&mut result, false)?;
                for (list, partial) in by_generator.iter_mut().zip(acc.partial_accumulators) {
                    list.push(partial);
                }
            }

            let current = std::mem::take(&mut result.partial_accumulators);
            result.partial_accumulators = self
                .generators
                .iter()
                .zip(current)
                .zip(by_generator)
                .map(|((generator, mine), mut others)| {
                    others.insert(0, mine);
                    generator.merge_accumulators(others)
                })
                .collect::<Result<_>>()?;
        }
        Ok(result)
    }

    fn compact(&self, acc: &mut BatchingAccumulator) -> Result<()> {
        self.maybe_do_batch(acc, true)?;
        for (generator, partial) in self.generators.iter().zip(acc.partial_accumulators.iter_mut()) {
            generator.compact(partial)?;
        }
        self.metrics.increment_counter(NUM_COMPACTS, 1);
        Ok(())
    }

    fn finish(&self, mut acc: BatchingAccumulator) -> Result<DatasetFeatureStatistics> {
        self.maybe_do_batch(&mut acc, true)?;
        let outputs = self
            .generators
            .iter()
            .zip(&acc.partial_accumulators)
            .map(|(generator, partial)| generator.extract_output(partial))
            .collect::<Result<Vec<_>>>()?;
        Ok(merge_dataset_feature_statistics(outputs))
    }
}
