//! Helpers over arrow arrays and record batches.
//!
//! A feature column is either a list array (each row holds zero or more values, a null
//! row is a missing value) or a flat array (each valid row holds exactly one value).
//! Nested lists are flattened all the way down to their leaf values.

use crate::error::{Result, StatsError};
use crate::types::{FeaturePath, FeatureType, FeatureValue};
use arrow::array::{
    Array, ArrayRef, AsArray, Float64Array, GenericListArray, Int64Array, OffsetSizeTrait,
    UInt64Array, make_array, new_null_array,
};
use arrow::buffer::NullBuffer;
use arrow::compute::{cast, concat_batches, take};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::collections::HashMap;
use std::sync::Arc;

/// Every leaf column of `batch` with its feature path.
///
/// Struct columns are recursed into; a null struct row makes the row null in every child.
/// Below a list of structs each child is re-wrapped in the outer list, so `s.a` still has
/// one entry per row holding the values of every struct in that row.
pub fn enumerate_arrays(batch: &RecordBatch) -> Result<Vec<(FeaturePath, ArrayRef)>> {
    let schema = batch.schema();
    let mut out = Vec::with_capacity(batch.num_columns());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        push_leaves(FeaturePath::from_name(field.name().clone()), Arc::clone(column), &mut out)?;
    }
    Ok(out)
}

fn push_leaves(path: FeaturePath, array: ArrayRef, out: &mut Vec<(FeaturePath, ArrayRef)>) -> Result<()> {
    match array.data_type() {
        DataType::Struct(fields) => {
            let parent = array.as_struct();
            for (field, child) in fields.iter().zip(parent.columns()) {
                let child = with_parent_nulls(child, parent.nulls())?;
                push_leaves(path.child(field.name().clone()), child, out)?;
            }
        }
        DataType::List(f) if holds_struct(f.data_type()) => push_list_leaves(path, array.as_list::<i32>(), out)?,
        DataType::LargeList(f) if holds_struct(f.data_type()) => {
            push_list_leaves(path, array.as_list::<i64>(), out)?;
        }
        _ => out.push((path, array)),
    }
    Ok(())
}

fn holds_struct(data_type: &DataType) -> bool {
    matches!(leaf_data_type(data_type), DataType::Struct(_))
}

fn push_list_leaves<O: OffsetSizeTrait>(
    path: FeaturePath,
    list: &GenericListArray<O>,
    out: &mut Vec<(FeaturePath, ArrayRef)>,
) -> Result<()> {
    let mut inner = Vec::new();
    push_leaves(path, Arc::clone(list.values()), &mut inner)?;
    for (child_path, child) in inner {
        let field = Arc::new(Field::new_list_field(child.data_type().clone(), true));
        let wrapped = GenericListArray::<O>::try_new(field, list.offsets().clone(), child, list.nulls().cloned())?;
        out.push((child_path, Arc::new(wrapped)));
    }
    Ok(())
}

fn with_parent_nulls(child: &ArrayRef, parent: Option<&NullBuffer>) -> Result<ArrayRef> {
    if parent.is_none() {
        return Ok(Arc::clone(child));
    }
    let nulls = NullBuffer::union(child.nulls(), parent);
    let data = child.to_data().into_builder().nulls(nulls).build()?;
    Ok(make_array(data))
}

/* ===================== Flattening ===================== */

/// Leaf values of a column together with the row each value came from.
#[derive(Clone, Debug)]
pub struct FlatValues {
    pub values: ArrayRef,
    /// `parents[i]` is the row index of `values[i]`.
    pub parents: Vec<usize>,
}

/// Flatten a column down to its leaf values, skipping null list rows.
pub fn flatten(array: &ArrayRef) -> Result<FlatValues> {
    match array.data_type() {
        DataType::List(_) => flatten_list(array.as_list::<i32>()),
        DataType::LargeList(_) => flatten_list(array.as_list::<i64>()),
        _ => Ok(FlatValues {
            values: Arc::clone(array),
            parents: (0..array.len()).collect(),
        }),
    }
}

fn flatten_list<O: OffsetSizeTrait>(list: &GenericListArray<O>) -> Result<FlatValues> {
    let offsets = list.value_offsets();
    let mut indices = Vec::new();
    let mut rows = Vec::new();
    for row in 0..list.len() {
        if list.is_null(row) {
            continue;
        }
        let (start, end) = (offsets[row].as_usize(), offsets[row + 1].as_usize());
        indices.extend((start..end).map(|i| i as u64));
        rows.extend(std::iter::repeat_n(row, end - start));
    }
    let values = take(list.values().as_ref(), &UInt64Array::from(indices), None)?;
    let inner = flatten(&values)?;
    let parents = inner.parents.into_iter().map(|i| rows[i]).collect();
    Ok(FlatValues {
        values: inner.values,
        parents,
    })
}

pub fn flatten_values(array: &ArrayRef) -> Result<ArrayRef> {
    Ok(flatten(array)?.values)
}

pub fn value_parent_indices(array: &ArrayRef) -> Result<Vec<usize>> {
    Ok(flatten(array)?.parents)
}

/// Number of values in each row, `None` for a missing row.
#[must_use]
pub fn num_values_per_row(array: &dyn Array) -> Vec<Option<usize>> {
    match array.data_type() {
        DataType::List(_) => list_lengths(array.as_list::<i32>()),
        DataType::LargeList(_) => list_lengths(array.as_list::<i64>()),
        _ => (0..array.len()).map(|i| array.is_valid(i).then_some(1)).collect(),
    }
}

fn list_lengths<O: OffsetSizeTrait>(list: &GenericListArray<O>) -> Vec<Option<usize>> {
    (0..list.len())
        .map(|row| list.is_valid(row).then(|| list.value_length(row).as_usize()))
        .collect()
}

/* ===================== Types ===================== */

/// Data type of the leaf values, looking through any list nesting.
#[must_use]
pub fn leaf_data_type(data_type: &DataType) -> &DataType {
    match data_type {
        DataType::List(f) | DataType::LargeList(f) => leaf_data_type(f.data_type()),
        other => other,
    }
}

/// Statistics type of a column, or `None` when the column carries no typed values.
#[must_use]
pub fn feature_type_of(data_type: &DataType) -> Option<FeatureType> {
    match leaf_data_type(data_type) {
        DataType::Boolean
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Some(FeatureType::Int),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Some(FeatureType::Float),
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Utf8View
        | DataType::Binary
        | DataType::LargeBinary
        | DataType::BinaryView => Some(FeatureType::String),
        DataType::Struct(_) => Some(FeatureType::Struct),
        _ => None,
    }
}

/// Raw bytes of a flat string or binary array, `None` for other types.
#[must_use]
pub fn bytes_values(array: &dyn Array) -> Option<Vec<Option<&[u8]>>> {
    if let Some(a) = array.as_string_opt::<i32>() {
        return Some(a.iter().map(|v| v.map(str::as_bytes)).collect());
    }
    if let Some(a) = array.as_string_opt::<i64>() {
        return Some(a.iter().map(|v| v.map(str::as_bytes)).collect());
    }
    if let Some(a) = array.as_string_view_opt() {
        return Some(a.iter().map(|v| v.map(str::as_bytes)).collect());
    }
    if let Some(a) = array.as_binary_opt::<i32>() {
        return Some(a.iter().collect());
    }
    if let Some(a) = array.as_binary_opt::<i64>() {
        return Some(a.iter().collect());
    }
    array.as_binary_view_opt().map(|a| a.iter().collect())
}

/// A flat integer (or boolean) array widened to `Int64`.
pub fn int_values(array: &dyn Array) -> Result<Option<Int64Array>> {
    if feature_type_of(array.data_type()) != Some(FeatureType::Int) {
        return Ok(None);
    }
    let widened = cast(array, &DataType::Int64)?;
    Ok(Some(widened.as_primitive::<Int64Type>().clone()))
}

/// A flat numeric array widened to `Float64`.
pub fn float_values(array: &dyn Array) -> Result<Option<Float64Array>> {
    match feature_type_of(array.data_type()) {
        Some(FeatureType::Int | FeatureType::Float) => {
            let widened = cast(array, &DataType::Float64)?;
            Ok(Some(widened.as_primitive::<Float64Type>().clone()))
        }
        _ => Ok(None),
    }
}

/// Flat values as categorical [`FeatureValue`]s: strings/bytes always, integers only
/// when `categorical_int` is set. `None` when the array holds neither.
pub fn categorical_values(array: &dyn Array, categorical_int: bool) -> Result<Option<Vec<Option<FeatureValue>>>> {
    if let Some(bytes) = bytes_values(array) {
        return Ok(Some(
            bytes
                .into_iter()
                .map(|v| v.map(|b| FeatureValue::Bytes(b.to_vec())))
                .collect(),
        ));
    }
    if categorical_int && let Some(ints) = int_values(array)? {
        return Ok(Some(ints.iter().map(|v| v.map(FeatureValue::Int)).collect()));
    }
    Ok(None)
}

/// One weight per row, read from `weight_feature`.
///
/// # Errors
/// [`StatsError::MissingColumn`] if the column is absent, [`StatsError::InvalidWeight`]
/// if any row does not hold exactly one non-null numeric value.
pub fn row_weights(batch: &RecordBatch, weight_feature: &str) -> Result<Vec<f64>> {
    let column = batch
        .column_by_name(weight_feature)
        .ok_or_else(|| StatsError::MissingColumn(weight_feature.to_string()))?;
    let invalid = |reason: String| StatsError::InvalidWeight {
        feature: weight_feature.to_string(),
        reason,
    };
    if let Some(row) = num_values_per_row(column.as_ref())
        .iter()
        .position(|n| *n != Some(1))
    {
        return Err(invalid(format!("row {row} does not hold exactly one value")));
    }
    let flat = flatten(column)?;
    let weights = float_values(flat.values.as_ref())?
        .ok_or_else(|| invalid(format!("weights must be numeric, found {}", column.data_type())))?;
    if weights.null_count() > 0 {
        return Err(invalid("weights must not be null".into()));
    }
    Ok(weights.values().to_vec())
}

/* ===================== Batches ===================== */

/// Concatenate batches whose schemas may differ.
///
/// The output schema is the union of all columns by name in first-seen order, every
/// field nullable; batches lacking a column get nulls for it.
///
/// # Errors
/// A schema error if the same column name appears with two different data types.
pub fn merge_batches(batches: &[RecordBatch]) -> Result<RecordBatch> {
    let mut fields: Vec<Field> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for batch in batches {
        for field in batch.schema().fields() {
            match positions.get(field.name()) {
                Some(&i) if fields[i].data_type() != field.data_type() => {
                    return Err(ArrowError::SchemaError(format!(
                        "column `{}` has conflicting types {} and {}",
                        field.name(),
                        fields[i].data_type(),
                        field.data_type()
                    ))
                    .into());
                }
                Some(_) => {}
                None => {
                    positions.insert(field.name().clone(), fields.len());
                    fields.push(Field::new(field.name(), field.data_type().clone(), true));
                }
            }
        }
    }
    let schema = Arc::new(Schema::new(fields));
    let mut aligned = Vec::with_capacity(batches.len());
    for batch in batches {
        let columns = schema
            .fields()
            .iter()
            .map(|f| match batch.column_by_name(f.name()) {
                Some(c) => Arc::clone(c),
                None => new_null_array(f.data_type(), batch.num_rows()),
            })
            .collect();
        let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
        aligned.push(RecordBatch::try_new_with_options(Arc::clone(&schema), columns, &options)?);
    }
    if aligned.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    Ok(concat_batches(&schema, &aligned)?)
}
