use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Float64Builder, Int64Array, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};

use super::{column_index, extension_of, f64_list_field, int_at, list_f64_at, str_at};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::header::Header;

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Load frames from a container file. Dispatch by extension; CSV has no
/// sensible 2D layout and is rejected.
pub fn load_frames(path: &Path) -> Result<Vec<Frame>> {
    match extension_of(path).as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

/// Save frames to a container file (extension picks the format).
pub fn save_frames(path: &Path, frames: &[Frame]) -> Result<()> {
    if frames.is_empty() {
        return Err(Error::EmptyInput {
            what: format!("no frames to write to {}", path.display()),
        });
    }
    match extension_of(path).as_str() {
        "parquet" | "pq" => save_parquet(path, frames),
        "json" => save_json(path, frames),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

/// Load every supported container in a directory, sorted by file name.
pub fn load_directory(dir: &Path) -> Result<Vec<Frame>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| matches!(extension_of(p).as_str(), "parquet" | "pq" | "json"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(Error::NoInput {
            path: dir.to_path_buf(),
        });
    }

    let mut frames = Vec::new();
    for path in &paths {
        let mut loaded = load_frames(path)?;
        log::debug!("loaded {} frame(s) from {}", loaded.len(), path.display());
        frames.append(&mut loaded);
    }
    Ok(frames)
}

// ---------------------------------------------------------------------------
// Row <-> Frame conversion
// ---------------------------------------------------------------------------

fn frame_name(frame: &Frame, index: usize) -> String {
    frame
        .header
        .get_str("FILENAME")
        .map(str::to_string)
        .unwrap_or_else(|| format!("frame_{index:04}"))
}

fn frame_obstype(frame: &Frame) -> String {
    frame
        .header
        .get_str("OBSTYPE")
        .unwrap_or("UNKNOWN")
        .to_string()
}

fn assemble_frame(
    filename: String,
    data: Vec<f64>,
    naxis1: i64,
    naxis2: i64,
    mut header: Header,
    row: usize,
) -> Result<Frame> {
    let (cols, rows) = (naxis1 as usize, naxis2 as usize);
    if cols * rows != data.len() {
        return Err(Error::container(format!(
            "row {row} ({filename}): {cols} x {rows} does not match {} pixels",
            data.len()
        )));
    }
    let array = Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::container(format!("row {row} ({filename}): {e}")))?;
    // the container column is authoritative for the name
    header.set("FILENAME", filename);
    Ok(Frame::new(array, header))
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// One row per frame: `filename`, `obstype`, `data` (row-major flattened),
/// `naxis1`, `naxis2`, `header` (JSON-encoded [`Header`]).
fn save_parquet(path: &Path, frames: &[Frame]) -> Result<()> {
    let mut names = Vec::with_capacity(frames.len());
    let mut obstypes = Vec::with_capacity(frames.len());
    let mut naxis1 = Vec::with_capacity(frames.len());
    let mut naxis2 = Vec::with_capacity(frames.len());
    let mut headers = Vec::with_capacity(frames.len());

    let mut data_builder = ListBuilder::new(Float64Builder::new());
    for (i, frame) in frames.iter().enumerate() {
        let values = data_builder.values();
        for &v in frame.data.iter() {
            values.append_value(v);
        }
        data_builder.append(true);

        names.push(frame_name(frame, i));
        obstypes.push(frame_obstype(frame));
        let (rows, cols) = frame.shape();
        naxis1.push(cols as i64);
        naxis2.push(rows as i64);
        headers.push(serde_json::to_string(&frame.header)?);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("filename", DataType::Utf8, false),
        Field::new("obstype", DataType::Utf8, false),
        f64_list_field("data"),
        Field::new("naxis1", DataType::Int64, false),
        Field::new("naxis2", DataType::Int64, false),
        Field::new("header", DataType::Utf8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(
                names.iter().map(String::as_str).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                obstypes.iter().map(String::as_str).collect::<Vec<_>>(),
            )),
            Arc::new(data_builder.finish()),
            Arc::new(Int64Array::from(naxis1)),
            Arc::new(Int64Array::from(naxis2)),
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

fn load_parquet(path: &Path) -> Result<Vec<Frame>> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut frames = Vec::new();

    for batch in reader {
        let batch = batch?;
        let schema = batch.schema();

        let name_idx = column_index(&schema, "filename", path)?;
        let data_idx = column_index(&schema, "data", path)?;
        let naxis1_idx = column_index(&schema, "naxis1", path)?;
        let naxis2_idx = column_index(&schema, "naxis2", path)?;
        let header_idx = column_index(&schema, "header", path)?;

        for row in 0..batch.num_rows() {
            let filename = str_at(batch.column(name_idx), row)?;
            let data = list_f64_at(batch.column(data_idx), row)?;
            let naxis1 = int_at(batch.column(naxis1_idx), row)?;
            let naxis2 = int_at(batch.column(naxis2_idx), row)?;
            let header: Header = serde_json::from_str(&str_at(batch.column(header_idx), row)?)?;

            frames.push(assemble_frame(filename, data, naxis1, naxis2, header, row)?);
        }
    }

    Ok(frames)
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// JSON record mirroring the Parquet row, with the header inline.
#[derive(Serialize, Deserialize)]
struct FrameRecord {
    filename: String,
    obstype: String,
    data: Vec<f64>,
    naxis1: i64,
    naxis2: i64,
    header: Header,
}

fn save_json(path: &Path, frames: &[Frame]) -> Result<()> {
    let records: Vec<FrameRecord> = frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let (rows, cols) = frame.shape();
            FrameRecord {
                filename: frame_name(frame, i),
                obstype: frame_obstype(frame),
                data: frame.data.iter().copied().collect(),
                naxis1: cols as i64,
                naxis2: rows as i64,
                header: frame.header.clone(),
            }
        })
        .collect();

    let file = File::create(path)?;
    serde_json::to_writer(file, &records)?;
    Ok(())
}

fn load_json(path: &Path) -> Result<Vec<Frame>> {
    let text = std::fs::read_to_string(path)?;
    let records: Vec<FrameRecord> = serde_json::from_str(&text)?;

    records
        .into_iter()
        .enumerate()
        .map(|(row, r)| assemble_frame(r.filename, r.data, r.naxis1, r.naxis2, r.header, row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_frames() -> Vec<Frame> {
        let mut h1 = Header::new();
        h1.set("OBSTYPE", "BIAS");
        h1.set("FILENAME", "bias_001");
        h1.add_history("simulated");
        let f1 = Frame::new(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]], h1);

        let mut h2 = Header::new();
        h2.set("OBSTYPE", "OBJECT");
        h2.set("OBJECT", "HD 12345");
        let f2 = Frame::new(array![[9.0, 8.0], [7.0, 6.0], [5.0, 4.0]], h2);

        vec![f1, f2]
    }

    #[test]
    fn parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.parquet");

        let frames = sample_frames();
        save_frames(&path, &frames).unwrap();
        let back = load_frames(&path).unwrap();

        assert_eq!(back.len(), 2);
        assert_eq!(back[0].data, frames[0].data);
        assert_eq!(back[0].header.get_str("OBSTYPE"), Some("BIAS"));
        assert_eq!(back[0].header.history(), vec!["simulated"]);
        // unnamed frame got a generated container name
        assert_eq!(back[1].header.get_str("FILENAME"), Some("frame_0001"));
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.json");

        let frames = sample_frames();
        save_frames(&path, &frames).unwrap();
        let back = load_frames(&path).unwrap();

        assert_eq!(back.len(), 2);
        assert_eq!(back[1].data, frames[1].data);
        assert_eq!(back[1].header.get_str("OBJECT"), Some("HD 12345"));
    }

    #[test]
    fn unsupported_extension_rejected() {
        let err = load_frames(Path::new("frames.csv"));
        assert!(matches!(err, Err(Error::UnsupportedFormat { .. })));
        let err = save_frames(Path::new("frames.fits"), &sample_frames());
        assert!(matches!(err, Err(Error::UnsupportedFormat { .. })));
    }

    #[test]
    fn empty_save_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.parquet");
        assert!(matches!(
            save_frames(&path, &[]),
            Err(Error::EmptyInput { .. })
        ));
    }

    #[test]
    fn directory_loads_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let frames = sample_frames();
        save_frames(&dir.path().join("b_second.parquet"), &frames[1..]).unwrap();
        save_frames(&dir.path().join("a_first.parquet"), &frames[..1]).unwrap();

        let all = load_directory(dir.path()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].header.get_str("OBSTYPE"), Some("BIAS"));

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_directory(empty.path()),
            Err(Error::NoInput { .. })
        ));
    }
}
