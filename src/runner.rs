//! Execution engine for the statistics pipeline.
//!
//! The runner exposes the two primitives the pipeline needs from an execution engine:
//! [`Runner::flat_map`] and [`Runner::combine_per_key`]. In
//! [`ExecMode::Parallel`] both run on rayon, with the input split into partitions that
//! are folded independently and then shuffled by key, the same way a distributed engine
//! would pre-aggregate on each worker before the network shuffle.

use crate::combiners::CombineFn;
use crate::error::{Result, StatsError};
use crate::metrics::MetricsCollector;
use log::debug;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    Parallel {
        threads: Option<usize>,
        partitions: Option<usize>,
    },
}

#[derive(Clone, Debug)]
pub struct Runner {
    pub mode: ExecMode,
    pub default_partitions: usize,
    metrics: MetricsCollector,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(ExecMode::Parallel {
            threads: None,
            partitions: None,
        })
    }
}

impl Runner {
    #[must_use]
    pub fn new(mode: ExecMode) -> Self {
        Self {
            mode,
            default_partitions: 2 * num_cpus::get().max(2),
            metrics: MetricsCollector::new(),
        }
    }

    #[must_use]
    pub fn sequential() -> Self {
        Self::new(ExecMode::Sequential)
    }

    /// Share an existing collector instead of the runner's own.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub const fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    fn partitions(&self, len: usize) -> usize {
        let wanted = match self.mode {
            ExecMode::Sequential => 1,
            ExecMode::Parallel { partitions, .. } => partitions.unwrap_or(self.default_partitions),
        };
        wanted.max(1).min(len.max(1))
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> Result<R> {
        match self.mode {
            ExecMode::Parallel {
                threads: Some(t), ..
            } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(t)
                    .build()
                    .map_err(|e| StatsError::Execution(e.to_string()))?;
                Ok(pool.install(op))
            }
            _ => Ok(op()),
        }
    }

    /// Apply `f` to every element and concatenate the outputs in input order.
    pub fn flat_map<T, U, F>(&self, input: Vec<T>, f: F) -> Result<Vec<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> Result<Vec<U>> + Send + Sync,
    {
        let nested: Vec<Vec<U>> = match self.mode {
            ExecMode::Sequential => input.into_iter().map(&f).collect::<Result<_>>()?,
            ExecMode::Parallel { .. } => {
                self.install(|| input.into_par_iter().map(&f).collect::<Result<Vec<_>>>())??
            }
        };
        Ok(nested.into_iter().flatten().collect())
    }

    /// Combine all values sharing a key with `comb`.
    ///
    /// Input is split into partitions, each folded locally per key and compacted, then
    /// accumulators are grouped by key and merged in rounds of at most `fanout`
    /// accumulators (`None` merges all of a key's accumulators at once). Output is
    /// sorted by key.
    pub fn combine_per_key<K, V, A, O, C>(
        &self,
        input: Vec<(K, V)>,
        comb: &C,
        fanout: Option<usize>,
    ) -> Result<Vec<(K, O)>>
    where
        K: Eq + Hash + Ord + Send,
        V: Send,
        A: Send,
        O: Send,
        C: CombineFn<V, A, O>,
    {
        let parts = self.partitions(input.len());
        let chunks = split_vec(input, parts);

        let fold = |chunk: Vec<(K, V)>| -> Result<HashMap<K, A>> {
            let mut local: HashMap<K, A> = HashMap::new();
            for (k, v) in chunk {
                let acc = local.entry(k).or_insert_with(|| comb.create());
                comb.add_input(acc, v)?;
            }
            for acc in local.values_mut() {
                comb.compact(acc)?;
            }
            Ok(local)
        };
        let locals: Vec<HashMap<K, A>> = match self.mode {
            ExecMode::Sequential => chunks.into_iter().map(fold).collect::<Result<_>>()?,
            ExecMode::Parallel { .. } => {
                self.install(|| chunks.into_par_iter().map(fold).collect::<Result<Vec<_>>>())??
            }
        };

        // Shuffle: group partial accumulators by key.
        let mut grouped: BTreeMap<K, Vec<A>> = BTreeMap::new();
        for local in locals {
            for (k, acc) in local {
                grouped.entry(k).or_default().push(acc);
            }
        }
        debug!("combine_per_key: {} key(s) from {parts} partition(s)", grouped.len());
        let grouped: Vec<(K, Vec<A>)> = grouped.into_iter().collect();

        let fanout = fanout.unwrap_or(usize::MAX).max(2);
        let merge = |(k, accs): (K, Vec<A>)| -> Result<(K, O)> {
            let acc = merge_in_rounds::<V, A, O, C>(comb, accs, fanout)?;
            Ok((k, comb.finish(acc)?))
        };
        match self.mode {
            ExecMode::Sequential => grouped.into_iter().map(merge).collect(),
            ExecMode::Parallel { .. } => {
                self.install(|| grouped.into_par_iter().map(merge).collect::<Result<Vec<_>>>())?
            }
        }
    }
}

/// Tree-merge `accs`, at most `fanout` accumulators per merge call.
fn merge_in_rounds<V, A, O, C>(comb: &C, mut accs: Vec<A>, fanout: usize) -> Result<A>
where
    C: CombineFn<V, A, O>,
{
    while accs.len() > 1 {
        let mut next = Vec::with_capacity(accs.len().div_ceil(fanout));
        let mut it = accs.into_iter().peekable();
        while it.peek().is_some() {
            let group: Vec<A> = it.by_ref().take(fanout).collect();
            next.push(comb.merge_all(group)?);
        }
        accs = next;
    }
    Ok(accs.pop().unwrap_or_else(|| comb.create()))
}

/// Split into `n` contiguous chunks of near-equal length.
fn split_vec<T>(v: Vec<T>, n: usize) -> Vec<Vec<T>> {
    let n = n.max(1);
    let len = v.len();
    let base = len / n;
    let extra = len % n;
    let mut out = Vec::with_capacity(n);
    let mut it = v.into_iter();
    for i in 0..n {
        let take = base + usize::from(i < extra);
        out.push(it.by_ref().take(take).collect());
    }
    out
}
