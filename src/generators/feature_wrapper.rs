//! Runs single-feature generators as one dataset-level combiner.

use crate::arrow_util::enumerate_arrays;
use crate::error::{Result, StatsError};
use crate::generator::{AnyAccumulator, CombinerStatsGenerator, DynFeatureCombiner};
use crate::statistics::{DatasetFeatureStatistics, FeatureNameStatistics, MergeFrom};
use crate::types::FeaturePath;
use arrow::record_batch::RecordBatch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Adapts N [`CombinerFeatureStatsGenerator`](crate::generator::CombinerFeatureStatsGenerator)s
/// into one [`CombinerStatsGenerator`].
///
/// Every non-weight leaf column is folded into every wrapped generator. With a sample
/// rate set, each incoming batch is kept with that probability and otherwise skipped
/// whole. Every accumulator draws from its own stream, derived from the seed and the
/// order in which accumulators are created, so sequential runs repeat exactly.
#[derive(Clone)]
pub struct FeatureWrapperGenerator {
    generators: Vec<Arc<dyn DynFeatureCombiner>>,
    weight_feature: Option<String>,
    sample_rate: Option<f64>,
    seed: u64,
    streams: Arc<AtomicU64>,
}

impl std::fmt::Debug for FeatureWrapperGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.generators.iter().map(|g| g.name()).collect();
        f.debug_struct("FeatureWrapperGenerator")
            .field("generators", &names)
            .field("weight_feature", &self.weight_feature)
            .field("sample_rate", &self.sample_rate)
            .field("seed", &self.seed)
            .finish()
    }
}

/// Feature path to one sub-accumulator per wrapped generator, index-aligned.
pub struct FeatureWrapperAccumulator {
    features: HashMap<FeaturePath, Vec<AnyAccumulator>>,
    rng: StdRng,
}

impl FeatureWrapperAccumulator {
    /// Number of features seen so far.
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.features.len()
    }
}

impl FeatureWrapperGenerator {
    /// # Errors
    /// [`StatsError::InvalidOption`] if `sample_rate` is set outside `(0, 1]`.
    pub fn new(
        generators: Vec<Arc<dyn DynFeatureCombiner>>,
        weight_feature: Option<String>,
        sample_rate: Option<f64>,
        seed: u64,
    ) -> Result<Self> {
        if let Some(rate) = sample_rate
            && !(rate > 0.0 && rate <= 1.0)
        {
            return Err(StatsError::invalid_option(
                "semantic_domain_stats_sample_rate",
                format!("must be in (0, 1], got {rate}"),
            ));
        }
        Ok(Self {
            generators,
            weight_feature,
            sample_rate,
            seed,
            streams: Arc::new(AtomicU64::new(0)),
        })
    }

    fn next_rng(&self) -> StdRng {
        let stream = self.streams.fetch_add(1, Ordering::Relaxed);
        StdRng::seed_from_u64(self.seed ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15))
    }

    fn new_slots(&self) -> Vec<AnyAccumulator> {
        self.generators.iter().map(|g| g.create_accumulator()).collect()
    }
}

impl CombinerStatsGenerator for FeatureWrapperGenerator {
    type Accumulator = FeatureWrapperAccumulator;

    fn name(&self) -> &str {
        "FeatureWrapperGenerator"
    }

    fn create_accumulator(&self) -> FeatureWrapperAccumulator {
        FeatureWrapperAccumulator {
            features: HashMap::new(),
            rng: self.next_rng(),
        }
    }

    fn add_input(&self, acc: &mut FeatureWrapperAccumulator, batch: &RecordBatch) -> Result<()> {
        if let Some(rate) = self.sample_rate
            && acc.rng.random::<f64>() >= rate
        {
            return Ok(());
        }
        let weight_path = self.weight_feature.as_deref().map(FeaturePath::from_name);
        for (path, column) in enumerate_arrays(batch)? {
            if weight_path.as_ref() == Some(&path) {
                continue;
            }
            let slots = acc
                .features
                .entry(path.clone())
                .or_insert_with(|| self.new_slots());
            for (generator, slot) in self.generators.iter().zip(slots.iter_mut()) {
                generator.add_input(slot, &path, &column)?;
            }
        }
        Ok(())
    }

    fn merge_accumulators(&self, accs: Vec<FeatureWrapperAccumulator>) -> Result<FeatureWrapperAccumulator> {
        let mut rng = None;
        let mut per_feature: HashMap<FeaturePath, Vec<Vec<AnyAccumulator>>> = HashMap::new();
        for acc in accs {
            rng.get_or_insert(acc.rng);
            for (path, slots) in acc.features {
                let lists = per_feature
                    .entry(path)
                    .or_insert_with(|| self.generators.iter().map(|_| Vec::new()).collect());
                for (list, slot) in lists.iter_mut().zip(slots) {
                    list.push(slot);
                }
            }
        }
        let features = per_feature
            .into_iter()
            .map(|(path, lists)| {
                let merged = self
                    .generators
                    .iter()
                    .zip(lists)
                    .map(|(g, list)| g.merge_accumulators(list))
                    .collect::<Result<Vec<_>>>()?;
                Ok((path, merged))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(FeatureWrapperAccumulator {
            features,
            rng: rng.unwrap_or_else(|| self.next_rng()),
        })
    }

    fn extract_output(&self, acc: &FeatureWrapperAccumulator) -> Result<DatasetFeatureStatistics> {
        let mut paths: Vec<&FeaturePath> = acc.features.keys().collect();
        paths.sort();
        let mut features = Vec::new();
        for path in paths {
            let mut stats = FeatureNameStatistics::new(path.clone());
            for (generator, slot) in self.generators.iter().zip(&acc.features[path]) {
                stats.merge_from(generator.extract_output(path, slot)?);
            }
            if !stats.has_no_stats() {
                features.push(stats);
            }
        }
        Ok(DatasetFeatureStatistics {
            features,
            ..DatasetFeatureStatistics::default()
        })
    }
}
