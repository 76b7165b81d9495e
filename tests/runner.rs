//! Tests for the execution runner.

use anyhow::Result;
use ironstats::combiners::{CombineFn, Count, Sum, TopK};
use ironstats::{ExecMode, Runner, StatsError};
use std::sync::atomic::{AtomicUsize, Ordering};

fn runners() -> Vec<Runner> {
    vec![
        Runner::sequential(),
        Runner::default(),
        Runner::new(ExecMode::Parallel {
            threads: Some(2),
            partitions: Some(3),
        }),
        Runner::new(ExecMode::Parallel {
            threads: None,
            partitions: Some(64),
        }),
    ]
}

fn keyed(n: u64) -> Vec<(String, u64)> {
    (1..=n).map(|i| (format!("k{}", i % 3), i)).collect()
}

#[test]
fn combine_per_key_sums_in_every_mode() -> Result<()> {
    for runner in runners() {
        for fanout in [None, Some(2), Some(8)] {
            let out = runner.combine_per_key(keyed(100), &Sum::<u64>::new(), fanout)?;
            let expected: Vec<(String, u64)> = vec![
                ("k0".into(), (1..=100).filter(|i| i % 3 == 0).sum()),
                ("k1".into(), (1..=100).filter(|i| i % 3 == 1).sum()),
                ("k2".into(), (1..=100).filter(|i| i % 3 == 2).sum()),
            ];
            assert_eq!(out, expected, "{:?} fanout {fanout:?}", runner.mode);
        }
    }
    Ok(())
}

#[test]
fn combine_per_key_counts_and_top_k() -> Result<()> {
    for runner in runners() {
        let counts = runner.combine_per_key(keyed(10), &Count, Some(2))?;
        assert_eq!(counts, vec![("k0".into(), 3), ("k1".into(), 4), ("k2".into(), 3)]);

        let top = runner.combine_per_key(keyed(10), &TopK::new(2), None)?;
        let top: Vec<(String, Vec<u64>)> = top;
        assert_eq!(top[1], ("k1".into(), vec![10, 7]));
        assert_eq!(top[2], ("k2".into(), vec![8, 5]));
    }
    Ok(())
}

#[test]
fn combine_per_key_on_empty_input() -> Result<()> {
    for runner in runners() {
        let out: Vec<(String, u64)> = runner.combine_per_key(Vec::new(), &Sum::<u64>::new(), Some(4))?;
        assert!(out.is_empty());
    }
    Ok(())
}

#[test]
fn flat_map_preserves_input_order() -> Result<()> {
    for runner in runners() {
        let out = runner.flat_map((0..50).collect(), |i: u32| Ok(vec![i; (i % 3) as usize]))?;
        let expected: Vec<u32> = (0..50).flat_map(|i| vec![i; (i % 3) as usize]).collect();
        assert_eq!(out, expected);
    }
    Ok(())
}

#[test]
fn flat_map_propagates_errors() {
    for runner in runners() {
        let out = runner.flat_map((0..10).collect(), |i: u32| {
            if i == 7 {
                Err(StatsError::Execution("boom".into()))
            } else {
                Ok(vec![i])
            }
        });
        assert!(matches!(out, Err(StatsError::Execution(ref m)) if m == "boom"));
    }
}

/// Sum that counts how often accumulators are compacted.
struct CompactingSum<'a> {
    compactions: &'a AtomicUsize,
}

impl CombineFn<u64, u64, u64> for CompactingSum<'_> {
    fn create(&self) -> u64 {
        0
    }

    fn add_input(&self, acc: &mut u64, v: u64) -> ironstats::Result<()> {
        *acc += v;
        Ok(())
    }

    fn merge(&self, acc: &mut u64, other: u64) -> ironstats::Result<()> {
        *acc += other;
        Ok(())
    }

    fn compact(&self, _acc: &mut u64) -> ironstats::Result<()> {
        self.compactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finish(&self, acc: u64) -> ironstats::Result<u64> {
        Ok(acc)
    }
}

#[test]
fn every_partition_compacts_its_accumulators() -> Result<()> {
    let compactions = AtomicUsize::new(0);
    let comb = CompactingSum {
        compactions: &compactions,
    };

    Runner::sequential().combine_per_key(keyed(30), &comb, None)?;
    assert_eq!(compactions.load(Ordering::SeqCst), 3);

    compactions.store(0, Ordering::SeqCst);
    let runner = Runner::new(ExecMode::Parallel {
        threads: Some(2),
        partitions: Some(30),
    });
    let out = runner.combine_per_key(keyed(30), &comb, Some(2))?;
    // One partition per element, so one accumulator per element.
    assert_eq!(compactions.load(Ordering::SeqCst), 30);
    assert_eq!(out.iter().map(|(_, v)| v).sum::<u64>(), (1..=30).sum::<u64>());
    Ok(())
}

#[test]
fn runner_metrics_can_be_shared() {
    let metrics = ironstats::MetricsCollector::new();
    let runner = Runner::sequential().with_metrics(metrics.clone());
    runner.metrics().increment_counter("c", 2);
    assert_eq!(metrics.counter("c"), 2);
}
