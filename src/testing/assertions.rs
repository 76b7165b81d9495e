//! Assertions that run a generator over every merge grouping.
//!
//! A combiner must produce the same summary however its partial accumulators are
//! grouped. Each assertion folds the input into one accumulator, into one accumulator
//! per input merged flat (in both orders), and into one accumulator per input merged as
//! a binary tree, and compares every extracted summary against the expected one.
//! Floating-point fields compare with a relative tolerance.

use crate::error::Result;
use crate::generator::{CombinerFeatureStatsGenerator, CombinerStatsGenerator};
use crate::statistics::{DatasetFeatureStatistics, FeatureNameStatistics};
use crate::types::FeaturePath;
use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

const RELATIVE_TOLERANCE: f64 = 1e-9;

fn approx_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= RELATIVE_TOLERANCE * x.abs().max(y.abs()).max(1.0),
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| approx_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| approx_eq(x, y)))
        }
        _ => a == b,
    }
}

/// Assert two summaries are equal up to floating-point tolerance.
///
/// # Panics
///
/// Panics with both summaries if they differ.
pub fn assert_stats_approx_eq<T: Serialize + Debug>(actual: &T, expected: &T, context: &str) {
    let same = match (serde_json::to_value(actual), serde_json::to_value(expected)) {
        (Ok(a), Ok(e)) => approx_eq(&a, &e),
        _ => false,
    };
    assert!(
        same,
        "Statistics mismatch ({context}):\n  Expected: {expected:#?}\n  Actual: {actual:#?}"
    );
}

/// Merge pairwise until one accumulator is left.
fn tree_merge<A>(mut accs: Vec<A>, merge: impl Fn(Vec<A>) -> Result<A>) -> Result<A> {
    while accs.len() > 1 {
        let mut next = Vec::with_capacity(accs.len().div_ceil(2));
        let mut it = accs.into_iter();
        while let Some(a) = it.next() {
            match it.next() {
                Some(b) => next.push(merge(vec![a, b])?),
                None => next.push(a),
            }
        }
        accs = next;
    }
    match accs.pop() {
        Some(acc) => Ok(acc),
        None => merge(Vec::new()),
    }
}

/// Assert a dataset-level generator yields `expected` over `batches` for every grouping.
///
/// # Errors
/// Any error raised by the generator.
///
/// # Panics
///
/// Panics if any grouping yields a different summary.
pub fn assert_combiner_output_eq<G: CombinerStatsGenerator>(
    generator: &G,
    batches: &[RecordBatch],
    expected: &DatasetFeatureStatistics,
) -> Result<()> {
    let mut single = G::create_accumulator(generator);
    for batch in batches {
        G::add_input(generator, &mut single, batch)?;
    }
    let single = G::merge_accumulators(generator, vec![single])?;
    assert_stats_approx_eq(&G::extract_output(generator, &single)?, expected, "single accumulator");

    let per_batch = || -> Result<Vec<G::Accumulator>> {
        batches
            .iter()
            .map(|batch| {
                let mut acc = G::create_accumulator(generator);
                G::add_input(generator, &mut acc, batch)?;
                G::compact(generator, &mut acc)?;
                Ok(acc)
            })
            .collect()
    };

    let flat = G::merge_accumulators(generator, per_batch()?)?;
    assert_stats_approx_eq(&G::extract_output(generator, &flat)?, expected, "flat merge");

    let mut reversed = per_batch()?;
    reversed.reverse();
    let reversed = G::merge_accumulators(generator, reversed)?;
    assert_stats_approx_eq(&G::extract_output(generator, &reversed)?, expected, "reversed merge");

    let tree = tree_merge(per_batch()?, |accs| G::merge_accumulators(generator, accs))?;
    assert_stats_approx_eq(&G::extract_output(generator, &tree)?, expected, "tree merge");
    Ok(())
}

/// Assert a single-feature generator yields `expected` over `columns` of the feature at
/// `path` for every grouping.
///
/// # Errors
/// Any error raised by the generator.
///
/// # Panics
///
/// Panics if any grouping yields a different summary.
pub fn assert_feature_combiner_output_eq<G: CombinerFeatureStatsGenerator>(
    generator: &G,
    path: &FeaturePath,
    columns: &[ArrayRef],
    expected: &FeatureNameStatistics,
) -> Result<()> {
    let mut single = G::create_accumulator(generator);
    for column in columns {
        G::add_input(generator, &mut single, path, column)?;
    }
    let single = G::merge_accumulators(generator, vec![single])?;
    assert_stats_approx_eq(&G::extract_output(generator, path, &single)?, expected, "single accumulator");

    let per_column = || -> Result<Vec<G::Accumulator>> {
        columns
            .iter()
            .map(|column| {
                let mut acc = G::create_accumulator(generator);
                G::add_input(generator, &mut acc, path, column)?;
                Ok(acc)
            })
            .collect()
    };

    let flat = G::merge_accumulators(generator, per_column()?)?;
    assert_stats_approx_eq(&G::extract_output(generator, path, &flat)?, expected, "flat merge");

    let tree = tree_merge(per_column()?, |accs| G::merge_accumulators(generator, accs))?;
    assert_stats_approx_eq(&G::extract_output(generator, path, &tree)?, expected, "tree merge");
    Ok(())
}
