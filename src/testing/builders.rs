//! Array and record-batch builders for test inputs.
//!
//! Every feature column is built as a list array: `None` is a missing row, `Some(vec![])`
//! a present row without values.

use crate::error::Result;
use arrow::array::{
    ArrayRef, BinaryBuilder, Float64Array, ListArray, ListBuilder, StringBuilder,
};
use arrow::datatypes::{Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

#[must_use]
pub fn string_list_array(rows: Vec<Option<Vec<&str>>>) -> ArrayRef {
    let mut builder = ListBuilder::new(StringBuilder::new());
    for row in rows {
        match row {
            Some(values) => {
                for v in values {
                    builder.values().append_value(v);
                }
                builder.append(true);
            }
            None => builder.append_null(),
        }
    }
    Arc::new(builder.finish())
}

#[must_use]
pub fn binary_list_array(rows: Vec<Option<Vec<&[u8]>>>) -> ArrayRef {
    let mut builder = ListBuilder::new(BinaryBuilder::new());
    for row in rows {
        match row {
            Some(values) => {
                for v in values {
                    builder.values().append_value(v);
                }
                builder.append(true);
            }
            None => builder.append_null(),
        }
    }
    Arc::new(builder.finish())
}

#[must_use]
pub fn int_list_array(rows: Vec<Option<Vec<i64>>>) -> ArrayRef {
    let rows = rows
        .into_iter()
        .map(|row| row.map(|values| values.into_iter().map(Some)));
    Arc::new(ListArray::from_iter_primitive::<Int64Type, _, _>(rows))
}

#[must_use]
pub fn float_list_array(rows: Vec<Option<Vec<f64>>>) -> ArrayRef {
    let rows = rows
        .into_iter()
        .map(|row| row.map(|values| values.into_iter().map(Some)));
    Arc::new(ListArray::from_iter_primitive::<Float64Type, _, _>(rows))
}

/// A fluent builder for record batches of list-valued feature columns.
///
/// # Example
///
/// ```
/// use ironstats::testing::BatchBuilder;
///
/// let batch = BatchBuilder::new()
///     .strings("fruit", vec![Some(vec!["apple"]), None, Some(vec!["pear", "fig"])])
///     .weights("w", &[1.0, 2.0, 0.5])
///     .build()?;
/// assert_eq!(batch.num_rows(), 3);
/// assert_eq!(batch.num_columns(), 2);
/// # Ok::<(), ironstats::StatsError>(())
/// ```
#[derive(Debug, Default)]
pub struct BatchBuilder {
    columns: Vec<(String, ArrayRef)>,
}

impl BatchBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self { columns: Vec::new() }
    }

    /// Add an arbitrary column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, array: ArrayRef) -> Self {
        self.columns.push((name.into(), array));
        self
    }

    #[must_use]
    pub fn strings(self, name: impl Into<String>, rows: Vec<Option<Vec<&str>>>) -> Self {
        self.column(name, string_list_array(rows))
    }

    #[must_use]
    pub fn bytes(self, name: impl Into<String>, rows: Vec<Option<Vec<&[u8]>>>) -> Self {
        self.column(name, binary_list_array(rows))
    }

    #[must_use]
    pub fn ints(self, name: impl Into<String>, rows: Vec<Option<Vec<i64>>>) -> Self {
        self.column(name, int_list_array(rows))
    }

    #[must_use]
    pub fn floats(self, name: impl Into<String>, rows: Vec<Option<Vec<f64>>>) -> Self {
        self.column(name, float_list_array(rows))
    }

    /// A flat, non-null `Float64` weight column.
    #[must_use]
    pub fn weights(self, name: impl Into<String>, weights: &[f64]) -> Self {
        self.column(name, Arc::new(Float64Array::from(weights.to_vec())))
    }

    /// # Errors
    /// An arrow error if no column was added or the columns differ in length.
    pub fn build(self) -> Result<RecordBatch> {
        Ok(RecordBatch::try_from_iter(self.columns)?)
    }
}
