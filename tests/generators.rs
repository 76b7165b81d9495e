//! Tests for the built-in dataset-level generators.

use anyhow::Result;
use arrow::array::{Array, ArrayRef, Int64Array, ListArray, StructArray};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{DataType, Field, Fields};
use arrow::record_batch::RecordBatch;
use ironstats::generator::CombinerStatsGenerator;
use ironstats::generators::{
    BasicStatsGenerator, NUM_EXAMPLES_KEY, NumExamplesStatsGenerator, TopKUniquesCombinerStatsGenerator,
    TopKUniquesConfig, WEIGHTED_NUM_EXAMPLES_KEY, internal_feature_path,
};
use ironstats::statistics::{CustomStatistic, DatasetFeatureStatistics, FeatureNameStatistics};
use ironstats::testing::{BatchBuilder, assert_combiner_output_eq, assert_stats_approx_eq};
use ironstats::types::INVALID_STRING;
use ironstats::{FeaturePath, FeatureType};
use std::collections::HashSet;
use std::sync::Arc;

#[macro_use]
mod macros;

fn extract<G: CombinerStatsGenerator>(generator: &G, batches: &[RecordBatch]) -> Result<DatasetFeatureStatistics> {
    let mut acc = generator.create_accumulator();
    for batch in batches {
        generator.add_input(&mut acc, batch)?;
    }
    Ok(generator.extract_output(&acc)?)
}

fn feature<'a>(stats: &'a DatasetFeatureStatistics, name: &str) -> &'a FeatureNameStatistics {
    stats
        .get_feature_stats(&FeaturePath::from_name(name))
        .unwrap_or_else(|| panic!("no statistics for feature {name}"))
}

fn labels(top: &[ironstats::statistics::FreqAndValue]) -> Vec<(&str, f64)> {
    top.iter().map(|f| (f.value.as_str(), f.frequency)).collect()
}

/* ===================== Num examples ===================== */

#[test]
fn num_examples_counts_rows_and_weights() -> Result<()> {
    let batches = vec![
        BatchBuilder::new()
            .ints("a", vec![Some(vec![1]), None])
            .weights("w", &[1.0, 2.0])
            .build()?,
        BatchBuilder::new()
            .ints("a", vec![Some(vec![3])])
            .weights("w", &[0.5])
            .build()?,
    ];
    let mut internal = FeatureNameStatistics::new(internal_feature_path());
    internal.custom_stats.push(CustomStatistic::num(NUM_EXAMPLES_KEY, 3.0));
    internal
        .custom_stats
        .push(CustomStatistic::num(WEIGHTED_NUM_EXAMPLES_KEY, 3.5));
    let expected = DatasetFeatureStatistics {
        features: vec![internal],
        ..DatasetFeatureStatistics::default()
    };
    assert_combiner_output_eq(&NumExamplesStatsGenerator::new(Some("w".into())), &batches, &expected)?;
    Ok(())
}

#[test]
fn num_examples_without_weight_omits_weighted_count() -> Result<()> {
    let batch = BatchBuilder::new().ints("a", vec![Some(vec![1])]).build()?;
    let stats = extract(&NumExamplesStatsGenerator::new(None), &[batch])?;
    let internal = stats.get_feature_stats(&internal_feature_path()).unwrap();
    assert_eq!(internal.custom_stat(NUM_EXAMPLES_KEY).and_then(CustomStatistic::as_num), Some(1.0));
    assert!(internal.custom_stat(WEIGHTED_NUM_EXAMPLES_KEY).is_none());
    Ok(())
}

/* ===================== Basic stats ===================== */

#[test]
fn basic_numeric_stats() -> Result<()> {
    let batches = vec![
        BatchBuilder::new()
            .floats("x", vec![Some(vec![1.0, 2.0]), None])
            .build()?,
        BatchBuilder::new()
            .floats("x", vec![Some(vec![3.0]), Some(vec![])])
            .build()?,
    ];
    let generator = BasicStatsGenerator::default();
    let stats = extract(&generator, &batches)?;
    let x = feature(&stats, "x");
    assert_eq!(x.feature_type, Some(FeatureType::Float));

    let num = x.num_stats.as_ref().unwrap();
    let common = num.common_stats.as_ref().unwrap();
    assert_eq!(common.num_non_missing, 3);
    assert_eq!(common.min_num_values, 0);
    assert_eq!(common.max_num_values, 2);
    assert_eq!(common.tot_num_values, 3);
    assert_approx_eq!(common.avg_num_values, 1.0);
    assert_approx_eq!(num.mean, 2.0);
    assert_approx_eq!(num.std_dev, (2.0f64 / 3.0).sqrt());
    assert_approx_eq!(num.min, 1.0);
    assert_approx_eq!(num.max, 3.0);
    assert_eq!(num.num_zeros, 0);
    assert!(num.weighted_numeric_stats.is_none());

    assert_combiner_output_eq(&generator, &batches, &stats)?;
    Ok(())
}

#[test]
fn basic_weighted_numeric_stats() -> Result<()> {
    let batch = BatchBuilder::new()
        .ints("n", vec![Some(vec![0]), Some(vec![10]), None])
        .weights("w", &[1.0, 3.0, 2.0])
        .build()?;
    let stats = extract(&BasicStatsGenerator::new(Some("w".into()), HashSet::new()), &[batch])?;
    assert!(stats.get_feature_stats(&FeaturePath::from_name("w")).is_none());

    let n = feature(&stats, "n");
    assert_eq!(n.feature_type, Some(FeatureType::Int));
    let num = n.num_stats.as_ref().unwrap();
    assert_eq!(num.num_zeros, 1);
    assert_approx_eq!(num.mean, 5.0);
    let weighted = num.weighted_numeric_stats.as_ref().unwrap();
    assert_approx_eq!(weighted.mean, 7.5);
    let weighted_common = num
        .common_stats
        .as_ref()
        .and_then(|c| c.weighted_common_stats.as_ref())
        .unwrap();
    assert_approx_eq!(weighted_common.num_non_missing, 4.0);
    assert_approx_eq!(weighted_common.tot_num_values, 4.0);
    Ok(())
}

#[test]
fn basic_string_and_categorical_stats() -> Result<()> {
    let batch = BatchBuilder::new()
        .strings("s", vec![Some(vec!["ab", "abcd"]), None])
        .ints("c", vec![Some(vec![10]), Some(vec![5])])
        .build()?;
    let categorical = HashSet::from([FeaturePath::from_name("c")]);
    let stats = extract(&BasicStatsGenerator::new(None, categorical), &[batch])?;

    let s = feature(&stats, "s");
    assert_eq!(s.feature_type, Some(FeatureType::String));
    let string_stats = s.string_stats.as_ref().unwrap();
    assert_approx_eq!(string_stats.avg_length, 3.0);
    assert_eq!(string_stats.common_stats.as_ref().unwrap().num_non_missing, 1);

    let c = feature(&stats, "c");
    assert!(c.num_stats.is_none());
    assert_approx_eq!(c.string_stats.as_ref().unwrap().avg_length, 1.5);
    Ok(())
}

#[test]
fn basic_skips_nan_values() -> Result<()> {
    let batch = BatchBuilder::new()
        .floats("x", vec![Some(vec![f64::NAN, 4.0]), Some(vec![2.0])])
        .build()?;
    let stats = extract(&BasicStatsGenerator::default(), &[batch])?;
    let num = feature(&stats, "x").num_stats.clone().unwrap();
    assert_approx_eq!(num.mean, 3.0);
    assert_approx_eq!(num.min, 2.0);
    assert_eq!(num.common_stats.unwrap().tot_num_values, 3);
    Ok(())
}

#[test]
fn basic_batch_size_invariance() -> Result<()> {
    let whole = BatchBuilder::new()
        .floats("x", vec![Some(vec![1.5]), Some(vec![-2.0, 7.0]), None, Some(vec![0.0])])
        .strings("s", vec![Some(vec!["a"]), None, Some(vec!["bb", "c"]), Some(vec!["dddd"])])
        .weights("w", &[1.0, 2.0, 3.0, 4.0])
        .build()?;
    let generator = BasicStatsGenerator::new(Some("w".into()), HashSet::new());
    let expected = extract(&generator, std::slice::from_ref(&whole))?;
    let split = [whole.slice(0, 1), whole.slice(1, 3)];
    assert_combiner_output_eq(&generator, &split, &expected)?;
    Ok(())
}

#[test]
fn basic_type_change_invalidates_feature() -> Result<()> {
    let batches = vec![
        BatchBuilder::new().ints("a", vec![Some(vec![1]), Some(vec![2])]).build()?,
        BatchBuilder::new().strings("a", vec![Some(vec!["x"])]).build()?,
        BatchBuilder::new().ints("a", vec![Some(vec![3])]).build()?,
    ];
    assert_combiner_output_eq(&BasicStatsGenerator::default(), &batches, &DatasetFeatureStatistics::default())?;
    Ok(())
}

#[test]
fn basic_reaches_into_repeated_structs() -> Result<()> {
    let values: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
    let items = StructArray::try_new(
        Fields::from(vec![Field::new("a", DataType::Int64, true)]),
        vec![values],
        None,
    )?;
    let column = ListArray::try_new(
        Arc::new(Field::new_list_field(items.data_type().clone(), true)),
        OffsetBuffer::from_lengths([2, 1]),
        Arc::new(items),
        None,
    )?;
    let batch = BatchBuilder::new().column("s", Arc::new(column)).build()?;

    let stats = extract(&BasicStatsGenerator::default(), &[batch])?;
    let a = stats
        .get_feature_stats(&FeaturePath::new(["s", "a"]))
        .expect("statistics for s.a");
    assert_eq!(a.feature_type, Some(FeatureType::Int));
    let num = a.num_stats.as_ref().unwrap();
    let common = num.common_stats.as_ref().unwrap();
    assert_eq!(common.num_non_missing, 2);
    assert_eq!(common.tot_num_values, 3);
    assert_eq!((common.min_num_values, common.max_num_values), (1, 2));
    assert_approx_eq!(num.mean, 2.0);
    Ok(())
}

#[test]
fn basic_ignores_all_null_columns() -> Result<()> {
    let batch = BatchBuilder::new().ints("a", vec![None, None]).build()?;
    let stats = extract(&BasicStatsGenerator::default(), &[batch])?;
    assert!(stats.features.is_empty());
    Ok(())
}

/* ===================== Top-K and uniques ===================== */

#[test]
fn top_k_ties_break_toward_larger_value() -> Result<()> {
    let batch = BatchBuilder::new()
        .strings("s", vec![Some(vec!["a"]), Some(vec!["b"]), Some(vec!["c", "a"])])
        .build()?;
    let generator = TopKUniquesCombinerStatsGenerator::default();
    let stats = extract(&generator, std::slice::from_ref(&batch))?;
    let s = feature(&stats, "s");
    assert_eq!(s.feature_type, Some(FeatureType::String));

    let string_stats = s.string_stats.as_ref().unwrap();
    assert_eq!(string_stats.unique, 3);
    assert_eq!(labels(&string_stats.top_values), vec![("a", 2.0), ("c", 1.0), ("b", 1.0)]);
    let buckets = &string_stats.rank_histogram.as_ref().unwrap().buckets;
    let ranked: Vec<(u64, &str)> = buckets.iter().map(|b| (b.low_rank, b.label.as_str())).collect();
    assert_eq!(ranked, vec![(0, "a"), (1, "c"), (2, "b")]);
    assert!(string_stats.weighted_string_stats.is_none());

    assert_combiner_output_eq(&generator, &[batch.slice(0, 1), batch.slice(1, 2)], &stats)?;
    Ok(())
}

#[test]
fn top_k_weighted_and_unweighted_counts_are_independent() -> Result<()> {
    let batch = BatchBuilder::new()
        .strings("s", vec![Some(vec!["x"]), Some(vec!["y"])])
        .weights("w", &[2.0, 3.0])
        .build()?;
    let config = TopKUniquesConfig {
        weight_feature: Some("w".into()),
        ..TopKUniquesConfig::default()
    };
    let stats = extract(&TopKUniquesCombinerStatsGenerator::new(config), &[batch])?;
    assert!(stats.get_feature_stats(&FeaturePath::from_name("w")).is_none());

    let string_stats = feature(&stats, "s").string_stats.as_ref().unwrap();
    assert_eq!(labels(&string_stats.top_values), vec![("y", 1.0), ("x", 1.0)]);
    let weighted = string_stats.weighted_string_stats.as_ref().unwrap();
    assert_eq!(labels(&weighted.top_values), vec![("y", 3.0), ("x", 2.0)]);
    Ok(())
}

#[test]
fn top_k_frequency_threshold_still_counts_uniques() -> Result<()> {
    let batch = BatchBuilder::new()
        .strings("s", vec![Some(vec!["a", "a"]), Some(vec!["b"]), Some(vec!["c"])])
        .build()?;
    let config = TopKUniquesConfig {
        frequency_threshold: 2,
        ..TopKUniquesConfig::default()
    };
    let stats = extract(&TopKUniquesCombinerStatsGenerator::new(config), &[batch])?;
    let string_stats = feature(&stats, "s").string_stats.as_ref().unwrap();
    assert_eq!(string_stats.unique, 3);
    assert_eq!(labels(&string_stats.top_values), vec![("a", 2.0)]);
    assert_eq!(string_stats.rank_histogram.as_ref().unwrap().buckets.len(), 1);
    Ok(())
}

#[test]
fn top_k_bounds_top_values_and_buckets_separately() -> Result<()> {
    let batch = BatchBuilder::new()
        .strings("s", vec![Some(vec!["a", "b", "c", "d"])])
        .build()?;
    let config = TopKUniquesConfig {
        num_top_values: 1,
        num_rank_histogram_buckets: 3,
        ..TopKUniquesConfig::default()
    };
    let stats = extract(&TopKUniquesCombinerStatsGenerator::new(config), &[batch])?;
    let string_stats = feature(&stats, "s").string_stats.as_ref().unwrap();
    assert_eq!(string_stats.top_values.len(), 1);
    assert_eq!(string_stats.rank_histogram.as_ref().unwrap().buckets.len(), 3);
    assert_eq!(string_stats.unique, 4);
    Ok(())
}

#[test]
fn top_k_replaces_undecodable_bytes() -> Result<()> {
    let batch = BatchBuilder::new()
        .bytes("b", vec![Some(vec![&[0xff, 0xfe][..]]), Some(vec![b"ok".as_slice()])])
        .build()?;
    let stats = extract(&TopKUniquesCombinerStatsGenerator::default(), &[batch])?;
    let string_stats = feature(&stats, "b").string_stats.as_ref().unwrap();
    let values: HashSet<&str> = string_stats.top_values.iter().map(|f| f.value.as_str()).collect();
    assert_eq!(values, HashSet::from([INVALID_STRING, "ok"]));
    Ok(())
}

#[test]
fn top_k_categorical_ints() -> Result<()> {
    let batch = BatchBuilder::new()
        .ints("c", vec![Some(vec![7, 7]), Some(vec![3])])
        .ints("n", vec![Some(vec![1]), Some(vec![1])])
        .build()?;
    let config = TopKUniquesConfig {
        categorical_features: HashSet::from([FeaturePath::from_name("c")]),
        ..TopKUniquesConfig::default()
    };
    let stats = extract(&TopKUniquesCombinerStatsGenerator::new(config), &[batch])?;
    assert!(stats.get_feature_stats(&FeaturePath::from_name("n")).is_none());

    let c = feature(&stats, "c");
    assert_eq!(c.feature_type, Some(FeatureType::Int));
    assert_eq!(labels(&c.string_stats.as_ref().unwrap().top_values), vec![("7", 2.0), ("3", 1.0)]);
    Ok(())
}

#[test]
fn top_k_merge_is_associative() -> Result<()> {
    let batches = vec![
        BatchBuilder::new().strings("s", vec![Some(vec!["a", "b"])]).build()?,
        BatchBuilder::new().strings("s", vec![Some(vec!["b"]), None]).build()?,
        BatchBuilder::new().strings("s", vec![Some(vec!["c", "b", "a"])]).build()?,
    ];
    let generator = TopKUniquesCombinerStatsGenerator::default();

    let accs = |g: &TopKUniquesCombinerStatsGenerator| -> Result<Vec<_>> {
        batches
            .iter()
            .map(|b| {
                let mut acc = g.create_accumulator();
                g.add_input(&mut acc, b)?;
                Ok(acc)
            })
            .collect()
    };

    let mut left = accs(&generator)?.into_iter();
    let (a, b, c) = (left.next().unwrap(), left.next().unwrap(), left.next().unwrap());
    let ab = generator.merge_accumulators(vec![a, b])?;
    let left = generator.extract_output(&generator.merge_accumulators(vec![ab, c])?)?;

    let mut right = accs(&generator)?.into_iter();
    let (a, b, c) = (right.next().unwrap(), right.next().unwrap(), right.next().unwrap());
    let bc = generator.merge_accumulators(vec![b, c])?;
    let right = generator.extract_output(&generator.merge_accumulators(vec![a, bc])?)?;

    let flat = generator.extract_output(&generator.merge_accumulators(accs(&generator)?)?)?;
    assert_stats_approx_eq(&left, &right, "(ab)c vs a(bc)");
    assert_stats_approx_eq(&left, &flat, "(ab)c vs abc");
    assert_eq!(feature(&flat, "s").string_stats.as_ref().unwrap().top_values[0].value, "b");
    Ok(())
}
