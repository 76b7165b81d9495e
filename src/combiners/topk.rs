//! Top-K combiner for selecting the largest values

use super::CombineFn;
use crate::error::Result;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::marker::PhantomData;

/* ===================== TopK<T> ===================== */

/// The largest top-**K** values per key (requires `Ord`).
///
/// The accumulator maintains a **min-heap** (via `BinaryHeap<Reverse<T>>`) of
/// size ≤ `k`, so memory is bounded by `k`.
///
/// - Accumulator: `BinaryHeap<Reverse<T>>`
/// - Output: `Vec<T>` sorted descending.
///
/// `k == 0` always produces an empty vector.
#[derive(Clone, Debug)]
pub struct TopK<T> {
    /// Number of largest elements to keep.
    pub k: usize,
    _m: PhantomData<T>,
}
impl<T> TopK<T> {
    #[must_use]
    pub const fn new(k: usize) -> Self {
        Self { k, _m: PhantomData }
    }

    fn trim(&self, acc: &mut BinaryHeap<Reverse<T>>)
    where
        T: Ord,
    {
        while acc.len() > self.k {
            acc.pop();
        }
    }
}

impl<T> CombineFn<T, BinaryHeap<Reverse<T>>, Vec<T>> for TopK<T>
where
    T: Ord + Send + Sync,
{
    fn create(&self) -> BinaryHeap<Reverse<T>> {
        BinaryHeap::new()
    }

    fn add_input(&self, acc: &mut BinaryHeap<Reverse<T>>, v: T) -> Result<()> {
        acc.push(Reverse(v));
        self.trim(acc);
        Ok(())
    }

    fn merge(&self, acc: &mut BinaryHeap<Reverse<T>>, other: BinaryHeap<Reverse<T>>) -> Result<()> {
        // Keep the larger heap as the base so fewer elements are re-pushed.
        let mut other = other;
        if other.len() > acc.len() {
            std::mem::swap(acc, &mut other);
        }
        acc.extend(other);
        self.trim(acc);
        Ok(())
    }

    fn finish(&self, acc: BinaryHeap<Reverse<T>>) -> Result<Vec<T>> {
        // into_sorted_vec is ascending in Reverse<T>, i.e. descending in T.
        Ok(acc.into_sorted_vec().into_iter().map(|Reverse(x)| x).collect())
    }
}
