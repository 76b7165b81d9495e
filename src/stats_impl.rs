//! The statistics pipeline: filter, slice, aggregate, merge and reconcile.
//!
//! [`generate_statistics`] runs over a stream of record batches through a [`Runner`]:
//! every dataset-level combiner is folded per slice behind one [`BatchingCombiner`],
//! every whole-stream generator runs on the sliced stream itself, and the per-generator
//! summaries of each slice are unioned by feature path before the example counts are
//! reconciled. [`generate_statistics_in_memory`] computes the same summary for a single
//! batch without a runner.

use crate::batching::BatchingCombiner;
use crate::error::{Result, StatsError};
use crate::generator::{DynCombiner, DynFeatureCombiner, StatsGenerator, TransformStatsGenerator};
use crate::generators::{
    BasicStatsGenerator, FeatureWrapperGenerator, NUM_EXAMPLES_KEY, NaturalLanguageStatsGenerator,
    NumExamplesStatsGenerator, TopKUniquesCombinerStatsGenerator, TopKUniquesConfig,
    TopKUniquesStatsGenerator, WEIGHTED_NUM_EXAMPLES_KEY, internal_feature_path,
};
use crate::metrics::{MetricsCollector, NUM_INSTANCES};
use crate::options::StatsOptions;
use crate::runner::Runner;
use crate::slicing::{filter_features, generate_slices};
use crate::statistics::{
    CommonStatistics, CustomStatistic, DatasetFeatureStatistics, DatasetFeatureStatisticsList,
    FeatureNameStatistics, MergeFrom,
};
use crate::types::{FeaturePath, SliceKey};
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Accumulators merged per round for one slice key.
pub const HOT_KEY_FANOUT: usize = 8;

/// Every generator a run uses, built-in ones first.
///
/// Single-feature generators are collapsed into one
/// [`FeatureWrapperGenerator`]; the semantic-domain generators get a wrapper of their
/// own so their sample rate applies to them alone.
///
/// # Errors
/// [`StatsError::UnsupportedGenerator`] when `in_memory` is set and a whole-stream
/// generator is configured, or any construction error of a built-in generator.
pub fn get_generators(options: &StatsOptions, in_memory: bool) -> Result<Vec<StatsGenerator>> {
    let top_k_config = TopKUniquesConfig::from_options(options);
    let mut generators = vec![
        StatsGenerator::combiner(BasicStatsGenerator::from_options(options)),
        StatsGenerator::combiner(NumExamplesStatsGenerator::new(options.weight_feature.clone())),
        if in_memory {
            StatsGenerator::combiner(TopKUniquesCombinerStatsGenerator::new(top_k_config))
        } else {
            StatsGenerator::transform(TopKUniquesStatsGenerator::new(top_k_config))
        },
    ];
    generators.extend(options.generators.iter().cloned());

    if options.enable_semantic_domain_stats {
        let semantic = vec![StatsGenerator::feature_combiner(
            NaturalLanguageStatsGenerator::with_defaults()?,
        )];
        generators.push(StatsGenerator::combiner(FeatureWrapperGenerator::new(
            feature_combiners(semantic),
            options.weight_feature.clone(),
            options.semantic_domain_stats_sample_rate,
            options.sample_seed(),
        )?));
    }

    let (single_feature, mut generators): (Vec<_>, Vec<_>) = generators
        .into_iter()
        .partition(|g| matches!(g, StatsGenerator::FeatureCombiner(_)));
    if !single_feature.is_empty() {
        generators.push(StatsGenerator::combiner(FeatureWrapperGenerator::new(
            feature_combiners(single_feature),
            options.weight_feature.clone(),
            None,
            options.sample_seed(),
        )?));
    }

    if in_memory
        && let Some(g) = generators
            .iter()
            .find(|g| matches!(g, StatsGenerator::Transform(_)))
    {
        return Err(StatsError::UnsupportedGenerator {
            name: g.name().to_string(),
            context: "in in-memory mode".to_string(),
        });
    }
    Ok(generators)
}

fn feature_combiners(generators: Vec<StatsGenerator>) -> Vec<Arc<dyn DynFeatureCombiner>> {
    generators
        .into_iter()
        .filter_map(|g| match g {
            StatsGenerator::FeatureCombiner(g) => Some(g),
            _ => None,
        })
        .collect()
}

type SplitGenerators = (Vec<Arc<dyn DynCombiner>>, Vec<Arc<dyn TransformStatsGenerator>>);

fn split_generators(generators: Vec<StatsGenerator>) -> Result<SplitGenerators> {
    let mut combiners = Vec::new();
    let mut transforms = Vec::new();
    for generator in generators {
        match generator {
            StatsGenerator::Combiner(g) => combiners.push(g),
            StatsGenerator::Transform(g) => transforms.push(g),
            StatsGenerator::FeatureCombiner(g) => {
                return Err(StatsError::UnsupportedGenerator {
                    name: g.name().to_string(),
                    context: "without a feature wrapper".to_string(),
                });
            }
        }
    }
    Ok((combiners, transforms))
}

/// Statistics for a stream of record batches.
///
/// Options are validated and generators built before any batch is touched. The runner's
/// metrics are reset at the start of the run.
///
/// # Errors
/// Any configuration error, an error raised by a slice function, or an integrity
/// violation during reconciliation.
pub fn generate_statistics(
    batches: Vec<RecordBatch>,
    options: &StatsOptions,
    runner: &Runner,
) -> Result<DatasetFeatureStatisticsList> {
    options.validate()?;
    let generators = get_generators(options, false)?;
    let metrics = runner.metrics();
    metrics.record_start();
    info!(
        "Generating statistics for {} batch(es) with {} generator(s)",
        batches.len(),
        generators.len()
    );

    let batches = match &options.feature_whitelist {
        Some(whitelist) => batches
            .iter()
            .map(|b| filter_features(b, whitelist, options.weight_feature.as_deref()))
            .collect::<Result<Vec<_>>>()?,
        None => batches,
    };
    let sliced = if options.is_slicing_enabled() {
        let slice_functions = &options.slice_functions;
        runner.flat_map(batches, |batch| generate_slices(&batch, slice_functions))?
    } else {
        batches
            .into_iter()
            .map(|b| (SliceKey::whole_dataset(), b))
            .collect()
    };

    let result = run_sliced(generators, sliced, options, options.is_slicing_enabled(), runner)?;
    metrics.record_end();
    info!(
        "Generated statistics for {} slice(s) in {} ms",
        result.datasets.len(),
        metrics.elapsed().map_or(0, |d| d.as_millis())
    );
    Ok(result)
}

/// Statistics for already-sliced batches, one dataset per distinct slice key.
///
/// # Errors
/// As [`generate_statistics`].
pub fn generate_sliced_statistics(
    sliced: Vec<(SliceKey, RecordBatch)>,
    options: &StatsOptions,
    is_slicing_enabled: bool,
    runner: &Runner,
) -> Result<DatasetFeatureStatisticsList> {
    options.validate()?;
    let generators = get_generators(options, false)?;
    run_sliced(generators, sliced, options, is_slicing_enabled, runner)
}

fn run_sliced(
    generators: Vec<StatsGenerator>,
    sliced: Vec<(SliceKey, RecordBatch)>,
    options: &StatsOptions,
    is_slicing_enabled: bool,
    runner: &Runner,
) -> Result<DatasetFeatureStatisticsList> {
    let (combiners, transforms) = split_generators(generators)?;
    debug!(
        "Running {} combiner(s) and {} transform(s) over {} sliced batch(es)",
        combiners.len(),
        transforms.len(),
        sliced.len()
    );

    let mut transformed = Vec::new();
    for transform in &transforms {
        transformed.extend(transform.transform(runner, &sliced)?);
    }

    let mut per_slice: BTreeMap<SliceKey, Vec<DatasetFeatureStatistics>> = BTreeMap::new();
    if !combiners.is_empty() {
        let combiner = BatchingCombiner::new(combiners, options.desired_batch_size, runner.metrics().clone());
        for (slice, stats) in runner.combine_per_key(sliced, &combiner, Some(HOT_KEY_FANOUT))? {
            per_slice.entry(slice).or_default().push(stats);
        }
    }
    for (slice, stats) in transformed {
        per_slice.entry(slice).or_default().push(stats);
    }

    let datasets = per_slice
        .into_iter()
        .map(|(slice, parts)| {
            let mut stats = merge_dataset_feature_statistics(parts);
            stats.name = if is_slicing_enabled {
                slice.to_string()
            } else {
                String::new()
            };
            update_example_and_missing_count(&mut stats, runner.metrics())?;
            Ok((slice, stats))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(make_dataset_feature_statistics_list(datasets))
}

/// Statistics for one batch, computed directly with each generator's accumulator.
///
/// Only combiner-style generators are supported.
///
/// # Errors
/// Any configuration error, including [`StatsError::UnsupportedGenerator`] for a
/// whole-stream custom generator.
pub fn generate_statistics_in_memory(batch: &RecordBatch, options: &StatsOptions) -> Result<DatasetFeatureStatisticsList> {
    options.validate()?;
    let (combiners, _) = split_generators(get_generators(options, true)?)?;
    let batch = match &options.feature_whitelist {
        Some(whitelist) => filter_features(batch, whitelist, options.weight_feature.as_deref())?,
        None => batch.clone(),
    };

    let mut outputs = Vec::with_capacity(combiners.len());
    for generator in &combiners {
        let mut acc = generator.create_accumulator();
        generator.add_input(&mut acc, &batch)?;
        let acc = generator.merge_accumulators(vec![acc])?;
        outputs.push(generator.extract_output(&acc)?);
    }
    let mut stats = merge_dataset_feature_statistics(outputs);
    update_example_and_missing_count(&mut stats, &MetricsCollector::new())?;
    Ok(make_dataset_feature_statistics_list(vec![(SliceKey::whole_dataset(), stats)]))
}

/// Union of several summaries of the same slice, merged per feature path.
///
/// Features keep first-seen order. `num_examples` is taken from the first feature with
/// common stats; reconciliation overwrites it.
#[must_use]
pub fn merge_dataset_feature_statistics(parts: Vec<DatasetFeatureStatistics>) -> DatasetFeatureStatistics {
    let mut result = DatasetFeatureStatistics::default();
    let mut positions: HashMap<FeaturePath, usize> = HashMap::new();
    for part in parts {
        if result.name.is_empty() {
            result.name = part.name;
        }
        for feature in part.features {
            match positions.get(&feature.path) {
                Some(&i) => result.features[i].merge_from(feature),
                None => {
                    positions.insert(feature.path.clone(), result.features.len());
                    result.features.push(feature);
                }
            }
        }
    }
    if let Some(common) = result.features.iter().find_map(FeatureNameStatistics::common_stats) {
        result.num_examples = common.num_non_missing + common.num_missing;
    }
    result
}

fn common_stats_mut(feature: &mut FeatureNameStatistics) -> Option<&mut CommonStatistics> {
    match (&mut feature.num_stats, &mut feature.string_stats) {
        (Some(n), _) => n.common_stats.as_mut(),
        (None, Some(s)) => s.common_stats.as_mut(),
        (None, None) => None,
    }
}

/// Replace the internal example-count entry by the dataset's example counts, and derive
/// every feature's missing count from them.
///
/// # Errors
/// [`StatsError::MissingExampleCount`] without an internal entry, [`StatsError::Integrity`]
/// if a feature has more non-missing examples than the dataset has examples.
pub fn update_example_and_missing_count(stats: &mut DatasetFeatureStatistics, metrics: &MetricsCollector) -> Result<()> {
    let internal = stats
        .remove_feature(&internal_feature_path())
        .ok_or_else(|| StatsError::MissingExampleCount(stats.name.clone()))?;
    let num_examples = internal
        .custom_stat(NUM_EXAMPLES_KEY)
        .and_then(CustomStatistic::as_num)
        .ok_or_else(|| StatsError::MissingExampleCount(stats.name.clone()))? as u64;
    let weighted_num_examples = internal
        .custom_stat(WEIGHTED_NUM_EXAMPLES_KEY)
        .and_then(CustomStatistic::as_num);

    for feature in &mut stats.features {
        let path = feature.path.clone();
        let Some(common) = common_stats_mut(feature) else {
            continue;
        };
        if common.num_non_missing > num_examples {
            return Err(StatsError::Integrity {
                feature: path,
                num_examples,
                num_non_missing: common.num_non_missing,
            });
        }
        common.num_missing = num_examples - common.num_non_missing;
        if let Some(total_weight) = weighted_num_examples
            && let Some(weighted) = common.weighted_common_stats.as_mut()
        {
            weighted.num_missing = total_weight - weighted.num_non_missing;
        }
    }

    stats.num_examples = num_examples;
    if let Some(total_weight) = weighted_num_examples {
        stats.weighted_num_examples = total_weight;
    }
    metrics.increment_counter(NUM_INSTANCES, num_examples);
    Ok(())
}

/// Final output, ordered by slice key.
#[must_use]
pub fn make_dataset_feature_statistics_list(
    mut datasets: Vec<(SliceKey, DatasetFeatureStatistics)>,
) -> DatasetFeatureStatisticsList {
    datasets.sort_by(|a, b| a.0.cmp(&b.0));
    DatasetFeatureStatisticsList {
        datasets: datasets.into_iter().map(|(_, d)| d).collect(),
    }
}
