//! Counting combiners: Sum, Count

use super::CombineFn;
use crate::error::Result;
use std::marker::PhantomData;
use std::ops::AddAssign;

/* ===================== Sum<T> ===================== */

/// Sum of values per key.
///
/// - Accumulator: `T`
/// - Output: `T`
///
/// Requires `T: AddAssign + Default`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sum<T>(pub PhantomData<T>);
impl<T> Sum<T> {
    /// Convenience constructor (same as `Default`).
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> CombineFn<T, T, T> for Sum<T>
where
    T: AddAssign + Default + Send + Sync,
{
    fn create(&self) -> T {
        T::default()
    }

    fn add_input(&self, acc: &mut T, v: T) -> Result<()> {
        *acc += v;
        Ok(())
    }

    fn merge(&self, acc: &mut T, other: T) -> Result<()> {
        *acc += other;
        Ok(())
    }

    fn finish(&self, acc: T) -> Result<T> {
        Ok(acc)
    }
}

/* ===================== Count ===================== */

/// Number of values per key, whatever their type.
#[derive(Clone, Copy, Debug, Default)]
pub struct Count;

impl<V> CombineFn<V, u64, u64> for Count {
    fn create(&self) -> u64 {
        0
    }

    fn add_input(&self, acc: &mut u64, _v: V) -> Result<()> {
        *acc += 1;
        Ok(())
    }

    fn merge(&self, acc: &mut u64, other: u64) -> Result<()> {
        *acc += other;
        Ok(())
    }

    fn finish(&self, acc: u64) -> Result<u64> {
        Ok(acc)
    }
}
