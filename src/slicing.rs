//! Slice-key assignment and feature filtering.
//!
//! A [`SliceFn`] maps one record batch to zero or more `(slice key, rows)` pairs. The
//! same rows may appear under several keys, so slices can overlap.

use crate::arrow_util::{categorical_values, flatten};
use crate::error::{Result, StatsError};
use crate::types::{DEFAULT_SLICE_KEY, FeatureValue, SliceKey};
use anyhow::{Context, bail};
use arrow::array::BooleanArray;
use arrow::compute::filter_record_batch;
use arrow::record_batch::RecordBatch;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type SliceFn = Arc<dyn Fn(&RecordBatch) -> anyhow::Result<Vec<(SliceKey, RecordBatch)>> + Send + Sync>;

/// Puts every batch under the `All Examples` slice.
#[must_use]
pub fn default_slicer() -> SliceFn {
    Arc::new(|batch: &RecordBatch| Ok(vec![(SliceKey::named(DEFAULT_SLICE_KEY), batch.clone())]))
}

/// One slice per distinct value of a univalent categorical feature, named
/// `{feature}_{value}`.
///
/// With `values` set, only those values get a slice. Rows where the feature is missing
/// belong to no slice; a row with several values is an error.
pub fn feature_value_slicer(feature: impl Into<String>, values: Option<Vec<FeatureValue>>) -> SliceFn {
    let feature = feature.into();
    Arc::new(move |batch: &RecordBatch| {
        let Some(column) = batch.column_by_name(&feature) else {
            return Ok(Vec::new());
        };
        let flat = flatten(column)?;
        let Some(flat_values) = categorical_values(flat.values.as_ref(), true)? else {
            bail!("cannot slice on feature `{feature}` of type {}", column.data_type());
        };

        let mut row_value: Vec<Option<FeatureValue>> = vec![None; batch.num_rows()];
        for (value, &row) in flat_values.into_iter().zip(&flat.parents) {
            let Some(value) = value else { continue };
            if row_value[row].is_some() {
                bail!("feature `{feature}` has more than one value in row {row}");
            }
            row_value[row] = Some(value);
        }

        let mut rows_by_value: BTreeMap<FeatureValue, Vec<bool>> = BTreeMap::new();
        for (row, value) in row_value.into_iter().enumerate() {
            let Some(value) = value else { continue };
            if values.as_ref().is_some_and(|wanted| !wanted.contains(&value)) {
                continue;
            }
            rows_by_value
                .entry(value)
                .or_insert_with(|| vec![false; batch.num_rows()])[row] = true;
        }

        rows_by_value
            .into_iter()
            .map(|(value, mask)| {
                let rows = filter_record_batch(batch, &BooleanArray::from(mask))
                    .with_context(|| format!("slicing on feature `{feature}`"))?;
                Ok((SliceKey::named(format!("{feature}_{}", value.label())), rows))
            })
            .collect()
    })
}

/// All slices of `batch`: the default slice first, then those of every function in order.
pub fn generate_slices(batch: &RecordBatch, slice_functions: &[SliceFn]) -> Result<Vec<(SliceKey, RecordBatch)>> {
    let mut out = Vec::new();
    for f in std::iter::once(&default_slicer()).chain(slice_functions) {
        out.extend(f(batch).map_err(StatsError::Other)?);
    }
    Ok(out)
}

/// Keep only the whitelisted columns, in whitelist order, plus the weight column.
pub fn filter_features(batch: &RecordBatch, whitelist: &[String], weight_feature: Option<&str>) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut indices: Vec<usize> = whitelist
        .iter()
        .filter_map(|name| schema.index_of(name).ok())
        .collect();
    if let Some(w) = weight_feature
        && let Ok(i) = schema.index_of(w)
        && !indices.contains(&i)
    {
        indices.push(i);
    }
    Ok(batch.project(&indices)?)
}
