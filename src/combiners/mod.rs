//! The accumulator contract used by the [`Runner`](crate::Runner), plus a few generic
//! combiners built on it.
//!
//! A [`CombineFn<V, A, O>`] folds values of type `V` into an accumulator `A` and finally
//! turns it into an output `O`. Merges must be associative and commutative: the runner
//! is free to merge partial accumulators in any grouping and order.
//!
//! - [`Sum<T>`] sums values.
//! - [`Count`] counts values.
//! - [`TopK<T>`] keeps the K largest values.
//!
//! # Examples
//! ```
//! use ironstats::combiners::{CombineFn, TopK};
//!
//! let top = TopK::<u32>::new(2);
//! let mut a = top.create();
//! top.add_input(&mut a, 3)?;
//! top.add_input(&mut a, 7)?;
//! let mut b = top.create();
//! top.add_input(&mut b, 5)?;
//! top.merge(&mut a, b)?;
//! assert_eq!(top.finish(a)?, vec![7, 5]);
//! # Ok::<(), ironstats::StatsError>(())
//! ```

mod basic;
mod topk;

pub use basic::{Count, Sum};
pub use topk::TopK;

use crate::error::Result;

/// Fallible create / fold / merge / finish protocol.
pub trait CombineFn<V, A, O>: Send + Sync {
    fn create(&self) -> A;

    fn add_input(&self, acc: &mut A, v: V) -> Result<()>;

    fn merge(&self, acc: &mut A, other: A) -> Result<()>;

    /// Merge any number of accumulators; zero accumulators yield a fresh one.
    fn merge_all(&self, accs: Vec<A>) -> Result<A> {
        let mut it = accs.into_iter();
        let Some(mut acc) = it.next() else {
            return Ok(self.create());
        };
        for other in it {
            self.merge(&mut acc, other)?;
        }
        Ok(acc)
    }

    /// Bound the size of an accumulator before it leaves its partition.
    fn compact(&self, _acc: &mut A) -> Result<()> {
        Ok(())
    }

    fn finish(&self, acc: A) -> Result<O>;
}
