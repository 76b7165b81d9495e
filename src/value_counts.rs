//! Value-count accumulators for categorical features.

use crate::types::FeatureValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::ops::AddAssign;

/// Mapping from a feature value to an accumulated count.
///
/// `C` is `u64` for occurrence counts and `f64` for weight sums.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueCounter<C> {
    counts: HashMap<FeatureValue, C>,
}

impl<C> ValueCounter<C>
where
    C: Copy + Default + AddAssign,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    pub fn increment(&mut self, value: FeatureValue, amount: C) {
        *self.counts.entry(value).or_default() += amount;
    }

    /// Elementwise sum over the union of keys.
    pub fn merge(&mut self, other: Self) {
        if self.counts.len() < other.counts.len() {
            let mine = std::mem::replace(&mut self.counts, other.counts);
            self.absorb(mine);
        } else {
            self.absorb(other.counts);
        }
    }

    fn absorb(&mut self, counts: HashMap<FeatureValue, C>) {
        for (value, c) in counts {
            match self.counts.entry(value) {
                Entry::Occupied(mut e) => *e.get_mut() += c,
                Entry::Vacant(e) => {
                    e.insert(c);
                }
            }
        }
    }

    pub fn get(&self, value: &FeatureValue) -> Option<C> {
        self.counts.get(value).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeatureValue, C)> {
        self.counts.iter().map(|(v, c)| (v, *c))
    }

    /// Number of distinct values seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Unweighted and (optionally) weighted value counts tracked side by side.
///
/// The weighted counter exists only when a weight feature is configured; weighted
/// outputs are omitted otherwise.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureValueCounts {
    pub unweighted: ValueCounter<u64>,
    pub weighted: Option<ValueCounter<f64>>,
}

impl FeatureValueCounts {
    #[must_use]
    pub fn new(weighted: bool) -> Self {
        Self {
            unweighted: ValueCounter::new(),
            weighted: weighted.then(ValueCounter::new),
        }
    }

    /// Count one occurrence of `value`, with `weight` added to the weighted counter.
    pub fn increment(&mut self, value: FeatureValue, weight: Option<f64>) {
        if let (Some(w), Some(counter)) = (weight, self.weighted.as_mut()) {
            counter.increment(value.clone(), w);
        }
        self.unweighted.increment(value, 1);
    }

    pub fn merge(&mut self, other: Self) {
        self.unweighted.merge(other.unweighted);
        match (self.weighted.as_mut(), other.weighted) {
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            (None, Some(theirs)) => self.weighted = Some(theirs),
            _ => {}
        }
    }
}

/// An (occurrences, weight) pair summed by the whole-stream top-k path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CountAndWeight {
    pub count: u64,
    pub weight: f64,
}

impl AddAssign for CountAndWeight {
    fn add_assign(&mut self, rhs: Self) {
        self.count += rhs.count;
        self.weight += rhs.weight;
    }
}
