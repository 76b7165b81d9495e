//! Tests for the arrow helpers.

use anyhow::Result;
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, Int64Builder, ListArray, ListBuilder,
    StringArray, StructArray,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{DataType, Field, Fields, Int64Type};
use ironstats::arrow_util::{
    bytes_values, categorical_values, enumerate_arrays, feature_type_of, flatten, float_values, int_values,
    merge_batches, num_values_per_row, row_weights,
};
use ironstats::testing::{BatchBuilder, float_list_array, int_list_array, string_list_array};
use ironstats::{FeaturePath, FeatureType, FeatureValue, StatsError};
use std::sync::Arc;

#[test]
fn flattens_lists_with_parent_rows() -> Result<()> {
    let column = int_list_array(vec![Some(vec![1, 2]), None, Some(vec![]), Some(vec![3])]);
    let flat = flatten(&column)?;
    assert_eq!(flat.values.as_primitive::<Int64Type>().values().to_vec(), vec![1, 2, 3]);
    assert_eq!(flat.parents, vec![0, 0, 3]);
    assert_eq!(num_values_per_row(column.as_ref()), vec![Some(2), None, Some(0), Some(1)]);
    Ok(())
}

#[test]
fn flattens_nested_lists_to_leaves() -> Result<()> {
    let mut builder = ListBuilder::new(ListBuilder::new(Int64Builder::new()));
    builder.values().values().append_value(1);
    builder.values().values().append_value(2);
    builder.values().append(true);
    builder.values().values().append_value(3);
    builder.values().append(true);
    builder.append(true);
    builder.append_null();
    builder.values().values().append_value(4);
    builder.values().append(true);
    builder.append(true);
    let column: ArrayRef = Arc::new(builder.finish());

    let flat = flatten(&column)?;
    assert_eq!(flat.values.as_primitive::<Int64Type>().values().to_vec(), vec![1, 2, 3, 4]);
    assert_eq!(flat.parents, vec![0, 0, 0, 2]);
    assert_eq!(feature_type_of(column.data_type()), Some(FeatureType::Int));
    Ok(())
}

#[test]
fn flat_columns_have_one_value_per_valid_row() -> Result<()> {
    let column: ArrayRef = Arc::new(Int64Array::from(vec![Some(5), None, Some(7)]));
    assert_eq!(num_values_per_row(column.as_ref()), vec![Some(1), None, Some(1)]);
    assert_eq!(flatten(&column)?.parents, vec![0, 1, 2]);
    Ok(())
}

#[test]
fn enumerates_struct_leaves_with_parent_nulls() -> Result<()> {
    let a = int_list_array(vec![Some(vec![1]), Some(vec![2]), Some(vec![3])]);
    let b = string_list_array(vec![Some(vec!["x"]), None, Some(vec!["z"])]);
    let fields = Fields::from(vec![
        Field::new("a", a.data_type().clone(), true),
        Field::new("b", b.data_type().clone(), true),
    ]);
    let parent = StructArray::try_new(fields, vec![a, b], Some(NullBuffer::from(vec![true, false, true])))?;
    let batch = BatchBuilder::new()
        .column("s", Arc::new(parent))
        .ints("top", vec![Some(vec![9]), None, None])
        .build()?;

    let leaves = enumerate_arrays(&batch)?;
    let paths: Vec<String> = leaves.iter().map(|(p, _)| p.to_string()).collect();
    assert_eq!(paths, vec!["s.a", "s.b", "top"]);
    assert_eq!(leaves[0].0, FeaturePath::new(["s", "a"]));
    assert_eq!(num_values_per_row(leaves[0].1.as_ref()), vec![Some(1), None, Some(1)]);
    assert_eq!(num_values_per_row(leaves[1].1.as_ref()), vec![Some(1), None, Some(1)]);
    Ok(())
}

#[test]
fn enumerates_children_of_repeated_structs() -> Result<()> {
    let a: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
    let items = StructArray::try_new(
        Fields::from(vec![Field::new("a", DataType::Int64, true)]),
        vec![a],
        Some(NullBuffer::from(vec![true, true, false])),
    )?;
    let column = ListArray::try_new(
        Arc::new(Field::new_list_field(items.data_type().clone(), true)),
        OffsetBuffer::from_lengths([2, 1, 0]),
        Arc::new(items),
        Some(NullBuffer::from(vec![true, true, false])),
    )?;
    let batch = BatchBuilder::new().column("s", Arc::new(column)).build()?;

    let leaves = enumerate_arrays(&batch)?;
    assert_eq!(leaves.len(), 1);
    let (path, leaf) = &leaves[0];
    assert_eq!(*path, FeaturePath::new(["s", "a"]));
    assert_eq!(num_values_per_row(leaf.as_ref()), vec![Some(2), Some(1), None]);
    assert_eq!(feature_type_of(leaf.data_type()), Some(FeatureType::Int));

    // The null struct in row 1 is a null value, not a dropped one.
    let flat = flatten(leaf)?;
    assert_eq!(flat.parents, vec![0, 0, 1]);
    assert_eq!(flat.values.null_count(), 1);
    Ok(())
}

#[test]
fn classifies_value_types() {
    assert_eq!(feature_type_of(&DataType::Boolean), Some(FeatureType::Int));
    assert_eq!(feature_type_of(&DataType::Float32), Some(FeatureType::Float));
    assert_eq!(
        feature_type_of(string_list_array(vec![]).data_type()),
        Some(FeatureType::String)
    );
    assert_eq!(feature_type_of(&DataType::Null), None);
}

#[test]
fn extracts_typed_values() -> Result<()> {
    let strings = StringArray::from(vec![Some("a"), None, Some("bc")]);
    assert_eq!(
        bytes_values(&strings),
        Some(vec![Some(&b"a"[..]), None, Some(&b"bc"[..])])
    );

    let ints = Int64Array::from(vec![1, 2]);
    assert!(bytes_values(&ints).is_none());
    assert_eq!(float_values(&ints)?.map(|a| a.values().to_vec()), Some(vec![1.0, 2.0]));

    let bools = BooleanArray::from(vec![true, false]);
    assert_eq!(int_values(&bools)?.map(|a| a.values().to_vec()), Some(vec![1, 0]));

    let floats = Float64Array::from(vec![0.5]);
    assert!(int_values(&floats)?.is_none());
    assert!(float_values(&strings)?.is_none());

    assert!(categorical_values(&ints, false)?.is_none());
    assert_eq!(
        categorical_values(&ints, true)?,
        Some(vec![Some(FeatureValue::Int(1)), Some(FeatureValue::Int(2))])
    );
    assert_eq!(
        categorical_values(&strings, false)?,
        Some(vec![Some(FeatureValue::from("a")), None, Some(FeatureValue::from("bc"))])
    );
    Ok(())
}

#[test]
fn reads_row_weights() -> Result<()> {
    let flat = BatchBuilder::new().weights("w", &[1.0, 2.5]).build()?;
    assert_eq!(row_weights(&flat, "w")?, vec![1.0, 2.5]);

    let list = BatchBuilder::new()
        .floats("w", vec![Some(vec![3.0]), Some(vec![4.0])])
        .build()?;
    assert_eq!(row_weights(&list, "w")?, vec![3.0, 4.0]);

    let ints = BatchBuilder::new().ints("w", vec![Some(vec![2])]).build()?;
    assert_eq!(row_weights(&ints, "w")?, vec![2.0]);
    Ok(())
}

#[test]
fn rejects_malformed_weights() -> Result<()> {
    let batch = BatchBuilder::new()
        .floats("two", vec![Some(vec![1.0, 2.0])])
        .floats("missing_row", vec![None])
        .strings("text", vec![Some(vec!["1"])])
        .column("null", Arc::new(Float64Array::from(vec![None::<f64>])))
        .build()?;

    assert!(matches!(row_weights(&batch, "w"), Err(StatsError::MissingColumn(ref c)) if c == "w"));
    for column in ["two", "missing_row", "text", "null"] {
        assert!(
            matches!(row_weights(&batch, column), Err(StatsError::InvalidWeight { .. })),
            "{column}"
        );
    }
    Ok(())
}

#[test]
fn merges_batches_with_different_columns() -> Result<()> {
    let first = BatchBuilder::new()
        .ints("a", vec![Some(vec![1]), Some(vec![2])])
        .build()?;
    let second = BatchBuilder::new()
        .floats("b", vec![Some(vec![0.5])])
        .ints("a", vec![None])
        .build()?;
    let merged = merge_batches(&[first, second])?;

    assert_eq!(merged.num_rows(), 3);
    let schema = merged.schema();
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(
        num_values_per_row(merged.column(0).as_ref()),
        vec![Some(1), Some(1), None]
    );
    assert_eq!(num_values_per_row(merged.column(1).as_ref()), vec![None, None, Some(1)]);
    assert!(schema.fields().iter().all(|f| f.is_nullable()));

    assert_eq!(merge_batches(&[])?.num_rows(), 0);
    Ok(())
}

#[test]
fn merging_conflicting_types_fails() -> Result<()> {
    let ints = BatchBuilder::new().ints("a", vec![Some(vec![1])]).build()?;
    let floats = BatchBuilder::new().column("a", float_list_array(vec![Some(vec![1.0])])).build()?;
    assert!(matches!(merge_batches(&[ints, floats]), Err(StatsError::Arrow(_))));
    Ok(())
}
