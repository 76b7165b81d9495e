//! Process-wide counters and distributions for a statistics run.
//!
//! A [`MetricsCollector`] is cheap to clone; every clone shares the same state behind a
//! mutex, so combiners running on different partitions can record into one collector.
//! All recorded quantities only ever grow, which keeps concurrent updates from
//! independent partitions order-independent.
//!
//! # Example
//!
//! ```
//! use ironstats::metrics::MetricsCollector;
//!
//! let metrics = MetricsCollector::new();
//! metrics.record_start();
//! metrics.increment_counter("num_compacts", 1);
//! metrics.update_distribution("combine_add_input_batch_size", 1000);
//! metrics.update_distribution("combine_add_input_batch_size", 250);
//! metrics.record_end();
//!
//! assert_eq!(metrics.counter("num_compacts"), 1);
//! let d = metrics.distribution("combine_add_input_batch_size").unwrap();
//! assert_eq!((d.count, d.sum, d.min, d.max), (2, 1250, 250, 1000));
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Rows folded per batching flush.
pub const ADD_INPUT_BATCH_SIZE: &str = "combine_add_input_batch_size";
/// Accumulators merged per merge group.
pub const MERGE_ACCUMULATOR_BATCH_SIZE: &str = "combine_merge_accumulator_batch_size";
/// Forced flushes of pending batches.
pub const NUM_COMPACTS: &str = "num_compacts";
/// Examples reconciled across all slices.
pub const NUM_INSTANCES: &str = "num_instances";

/// Summary of every value recorded under one distribution name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl Distribution {
    fn update(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// Thread-safe collector of monotone counters and distributions.
#[derive(Clone, Debug, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsCollectorInner>>,
}

#[derive(Debug, Default)]
struct MetricsCollectorInner {
    counters: BTreeMap<String, u64>,
    distributions: BTreeMap<String, Distribution>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a counter half-updated.
    fn lock(&self) -> MutexGuard<'_, MetricsCollectorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear everything recorded so far and mark the start of a run.
    pub fn record_start(&self) {
        let mut inner = self.lock();
        inner.counters.clear();
        inner.distributions.clear();
        inner.start_time = Some(Instant::now());
        inner.end_time = None;
    }

    pub fn record_end(&self) {
        self.lock().end_time = Some(Instant::now());
    }

    /// Elapsed time between [`record_start`](Self::record_start) and
    /// [`record_end`](Self::record_end), if both were called.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let inner = self.lock();
        match (inner.start_time, inner.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Add `value` to the counter `name`, creating it at zero first if needed.
    pub fn increment_counter(&self, name: &str, value: u64) {
        *self.lock().counters.entry(name.to_string()).or_default() += value;
    }

    /// Record one observation under the distribution `name`.
    pub fn update_distribution(&self, name: &str, value: u64) {
        self.lock()
            .distributions
            .entry(name.to_string())
            .or_default()
            .update(value);
    }

    /// Current value of a counter (zero if never incremented).
    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        self.lock().counters.get(name).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn distribution(&self, name: &str) -> Option<Distribution> {
        self.lock().distributions.get(name).copied()
    }

    /// Snapshot of all metric names and their JSON values.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let inner = self.lock();
        let counters = inner.counters.iter().map(|(k, v)| (k.clone(), json!(v)));
        let distributions = inner
            .distributions
            .iter()
            .map(|(k, d)| (k.clone(), json!(d)));
        counters.chain(distributions).collect()
    }

    /// All metrics as one JSON object, plus `execution_time_ms` when timed.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut metrics_json: serde_json::Map<String, Value> = self.snapshot().into_iter().collect();
        if let Some(elapsed) = self.elapsed() {
            metrics_json.insert("execution_time_ms".to_string(), json!(elapsed.as_millis()));
        }
        Value::Object(metrics_json)
    }

    /// Print all metrics to stdout in a human-readable format.
    pub fn print(&self) {
        println!("\n========== Statistics Metrics ==========");
        if let Some(elapsed) = self.elapsed() {
            println!(
                "Execution Time: {:.3}s ({} ms)",
                elapsed.as_secs_f64(),
                elapsed.as_millis()
            );
            println!("----------------------------------------");
        }
        for (name, value) in self.snapshot() {
            println!("{name}: {value}");
        }
        println!("========================================\n");
    }

    /// Save all metrics to a pretty-printed JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file = File::create(path)?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }
}
