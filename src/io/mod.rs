//! Frame and spectrum containers.
//!
//! One container file holds one or more frames (or spectra), one row each,
//! with the full header embedded as JSON. Format is chosen by extension:
//!
//! * `.parquet` / `.pq` – Arrow/Parquet, the primary format
//! * `.json`            – records array, same fields with the header inline
//! * `.csv`             – spectra only: `x`/`y` cells hold
//!                        semicolon-separated floats (lossy: no full header)

mod frames;
mod spectra;

pub use frames::{load_directory, load_frames, save_frames};
pub use spectra::{load_spectra, save_spectra};

use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, Float32Array, Float64Array, Int32Array, Int64Array, LargeListArray,
    ListArray, StringArray,
};
use arrow::datatypes::{DataType, Field};

use crate::error::{Error, Result};

/// Lower-cased file extension, empty string when there is none.
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Field describing a `List<Float64>` column.
pub(crate) fn f64_list_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
        false,
    )
}

// ---------------------------------------------------------------------------
// Arrow column readers (shared by the frame and spectrum loaders)
// ---------------------------------------------------------------------------

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
pub(crate) fn list_f64_at(col: &ArrayRef, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        return Err(Error::container("null value in list column"));
    }

    let values = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| Error::container("expected ListArray"))?
            .value(row),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .ok_or_else(|| Error::container("expected LargeListArray"))?
            .value(row),
        other => {
            return Err(Error::container(format!(
                "expected List or LargeList column, got {other:?}"
            )))
        }
    };

    // The inner array can be Float64 or Float32
    if let Some(arr) = values.as_any().downcast_ref::<Float64Array>() {
        Ok(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(arr) = values.as_any().downcast_ref::<Float32Array>() {
        Ok(arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        Err(Error::container(format!(
            "list inner type is {:?}, expected Float64 or Float32",
            values.data_type()
        )))
    }
}

/// Extract a string from a Utf8/LargeUtf8 column at the given row.
pub(crate) fn str_at(col: &ArrayRef, row: usize) -> Result<String> {
    if col.is_null(row) {
        return Err(Error::container("null value in string column"));
    }
    match col.data_type() {
        DataType::Utf8 => {
            let arr = col
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| Error::container("expected StringArray"))?;
            Ok(arr.value(row).to_string())
        }
        DataType::LargeUtf8 => Ok(col.as_string::<i64>().value(row).to_string()),
        other => Err(Error::container(format!(
            "expected string column, got {other:?}"
        ))),
    }
}

/// Extract an integer from an Int64/Int32 column at the given row.
pub(crate) fn int_at(col: &ArrayRef, row: usize) -> Result<i64> {
    if col.is_null(row) {
        return Err(Error::container("null value in integer column"));
    }
    match col.data_type() {
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| Error::container("expected Int64Array"))?;
            Ok(arr.value(row))
        }
        DataType::Int32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int32Array>()
                .ok_or_else(|| Error::container("expected Int32Array"))?;
            Ok(arr.value(row) as i64)
        }
        other => Err(Error::container(format!(
            "expected integer column, got {other:?}"
        ))),
    }
}

/// Index of a named column, as a container error rather than an Arrow one.
pub(crate) fn column_index(
    schema: &arrow::datatypes::Schema,
    name: &str,
    path: &Path,
) -> Result<usize> {
    schema.index_of(name).map_err(|_| {
        Error::container(format!(
            "{} is missing the '{name}' column",
            path.display()
        ))
    })
}
