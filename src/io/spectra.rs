use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};

use super::{column_index, extension_of, f64_list_field, list_f64_at, str_at};
use crate::error::{Error, Result};
use crate::header::Header;
use crate::spectrum::Spectrum;

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Load spectra from a container file. Dispatch by extension.
pub fn load_spectra(path: &Path) -> Result<Vec<Spectrum>> {
    match extension_of(path).as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

/// Save spectra to a container file (extension picks the format).
///
/// CSV output is lossy: only the `OBJECT`/`OBSTYPE` keywords survive, not
/// the full header.
pub fn save_spectra(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    if spectra.is_empty() {
        return Err(Error::EmptyInput {
            what: format!("no spectra to write to {}", path.display()),
        });
    }
    match extension_of(path).as_str() {
        "parquet" | "pq" => save_parquet(path, spectra),
        "json" => save_json(path, spectra),
        "csv" => save_csv(path, spectra),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

fn object_of(sp: &Spectrum) -> String {
    sp.header.get_str("OBJECT").unwrap_or("").to_string()
}

fn obstype_of(sp: &Spectrum) -> String {
    sp.header.get_str("OBSTYPE").unwrap_or("UNKNOWN").to_string()
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// One row per spectrum: `x`/`y` list columns plus `object`, `obstype`, and
/// the JSON-encoded `header`.
fn save_parquet(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    let mut x_builder = ListBuilder::new(Float64Builder::new());
    let mut y_builder = ListBuilder::new(Float64Builder::new());
    let mut objects = Vec::with_capacity(spectra.len());
    let mut obstypes = Vec::with_capacity(spectra.len());
    let mut headers = Vec::with_capacity(spectra.len());

    for sp in spectra {
        let values = x_builder.values();
        for &v in &sp.x {
            values.append_value(v);
        }
        x_builder.append(true);

        let values = y_builder.values();
        for &v in &sp.y {
            values.append_value(v);
        }
        y_builder.append(true);

        objects.push(object_of(sp));
        obstypes.push(obstype_of(sp));
        headers.push(serde_json::to_string(&sp.header)?);
    }

    let schema = Arc::new(Schema::new(vec![
        f64_list_field("x"),
        f64_list_field("y"),
        Field::new("object", DataType::Utf8, false),
        Field::new("obstype", DataType::Utf8, false),
        Field::new("header", DataType::Utf8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(x_builder.finish()),
            Arc::new(y_builder.finish()),
            Arc::new(StringArray::from(
                objects.iter().map(String::as_str).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                obstypes.iter().map(String::as_str).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                headers.iter().map(String::as_str).collect::<Vec<_>>(),
            )),
        ],
    )?;

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn load_parquet(path: &Path) -> Result<Vec<Spectrum>> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut spectra = Vec::new();

    for batch in reader {
        let batch = batch?;
        let schema = batch.schema();

        let x_idx = column_index(&schema, "x", path)?;
        let y_idx = column_index(&schema, "y", path)?;
        let header_idx = column_index(&schema, "header", path)?;

        for row in 0..batch.num_rows() {
            let x = list_f64_at(batch.column(x_idx), row)?;
            let y = list_f64_at(batch.column(y_idx), row)?;
            let header: Header = serde_json::from_str(&str_at(batch.column(header_idx), row)?)?;
            spectra.push(Spectrum::new(x, y, header).map_err(|e| {
                Error::container(format!("row {row} of {}: {e}", path.display()))
            })?);
        }
    }

    Ok(spectra)
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct SpectrumRecord {
    x: Vec<f64>,
    y: Vec<f64>,
    object: String,
    obstype: String,
    header: Header,
}

fn save_json(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    let records: Vec<SpectrumRecord> = spectra
        .iter()
        .map(|sp| SpectrumRecord {
            x: sp.x.clone(),
            y: sp.y.clone(),
            object: object_of(sp),
            obstype: obstype_of(sp),
            header: sp.header.clone(),
        })
        .collect();

    let file = File::create(path)?;
    serde_json::to_writer(file, &records)?;
    Ok(())
}

fn load_json(path: &Path) -> Result<Vec<Spectrum>> {
    let text = std::fs::read_to_string(path)?;
    let records: Vec<SpectrumRecord> = serde_json::from_str(&text)?;

    records
        .into_iter()
        .enumerate()
        .map(|(row, r)| {
            Spectrum::new(r.x, r.y, r.header)
                .map_err(|e| Error::container(format!("row {row} of {}: {e}", path.display())))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV – x/y cells hold semicolon-separated floats
// ---------------------------------------------------------------------------

fn save_csv(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["x", "y", "object", "obstype"])?;
    for sp in spectra {
        let x = join_floats(&sp.x);
        let y = join_floats(&sp.y);
        writer.write_record([x.as_str(), y.as_str(), &object_of(sp), &obstype_of(sp)])?;
    }
    writer.flush()?;
    Ok(())
}

fn load_csv(path: &Path) -> Result<Vec<Spectrum>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let find = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::container(format!("CSV missing '{name}' column")))
    };
    let x_idx = find("x")?;
    let y_idx = find("y")?;
    let object_idx = headers.iter().position(|h| h == "object");
    let obstype_idx = headers.iter().position(|h| h == "obstype");

    let mut spectra = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let x = split_floats(record.get(x_idx).unwrap_or(""), row, "x")?;
        let y = split_floats(record.get(y_idx).unwrap_or(""), row, "y")?;

        let mut header = Header::new();
        if let Some(i) = object_idx {
            let object = record.get(i).unwrap_or("");
            if !object.is_empty() {
                header.set("OBJECT", object);
            }
        }
        if let Some(i) = obstype_idx {
            let obstype = record.get(i).unwrap_or("");
            if !obstype.is_empty() {
                header.set("OBSTYPE", obstype);
            }
        }

        spectra.push(
            Spectrum::new(x, y, header)
                .map_err(|e| Error::container(format!("CSV row {row}: {e}")))?,
        );
    }

    Ok(spectra)
}

fn join_floats(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

fn split_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim().parse::<f64>().map_err(|_| {
                Error::container(format!("CSV row {row}, {col}[{j}]: '{tok}' is not a number"))
            })
        })
        .collect()
}
