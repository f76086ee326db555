use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::stats;

use super::combine::{combine, CombineMethod};

// ---------------------------------------------------------------------------
// Master bias
// ---------------------------------------------------------------------------

/// Combine bias frames into a master bias. Provenance goes into the header:
/// `OBSTYPE = MBIAS`, `NCOMBINE`, and one HISTORY entry per input.
pub fn create_master_bias(biases: &[Frame], method: CombineMethod) -> Result<Frame> {
    let mut master = combine(biases, method)?;
    master.header.set("OBSTYPE", "MBIAS");
    master.header.set("FILENAME", "master_bias");
    master
        .header
        .set_with_comment("NCOMBINE", biases.len(), "frames combined");
    master
        .header
        .add_history(format!("master bias: {} combine of {} frames", method, biases.len()));
    for frame in biases {
        master.header.add_history(format!("combined {}", frame.id()));
    }
    log::info!("master bias from {} frames ({method})", biases.len());
    Ok(master)
}

/// Subtract a master bias. A frame already carrying `BIASSUB` is returned
/// unchanged with a warning, so the correction is never applied twice.
pub fn subtract_bias(frame: &Frame, master: &Frame) -> Result<Frame> {
    if frame.header.contains("BIASSUB") {
        log::warn!("{}: already bias subtracted, skipping", frame.id());
        return Ok(frame.clone());
    }

    let (rows, cols) = master.shape();
    if frame.shape() != (rows, cols) {
        return Err(Error::ShapeMismatch {
            expected_rows: rows,
            expected_cols: cols,
            got_rows: frame.rows(),
            got_cols: frame.cols(),
        });
    }

    let data = &frame.data - &master.data;
    let mut header = frame.header.clone();
    header.set_with_comment("BIASSUB", master.id(), "master bias subtracted");
    header.add_history(format!("bias subtracted ({})", master.id()));
    Ok(Frame::new(data, header))
}

// ---------------------------------------------------------------------------
// Master flat
// ---------------------------------------------------------------------------

/// How a combined flat is scaled to unity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalize {
    Mean,
    Median,
}

impl std::fmt::Display for Normalize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Normalize::Mean => f.write_str("mean"),
            Normalize::Median => f.write_str("median"),
        }
    }
}

/// Combine flat frames and normalize the result to unity. The divisor
/// (frame mean or median) is stored under `FLATNORM`; `OBSTYPE = MFLAT`.
pub fn create_master_flat(
    flats: &[Frame],
    method: CombineMethod,
    normalize: Normalize,
) -> Result<Frame> {
    let mut master = combine(flats, method)?;

    let values: Vec<f64> = master.data.iter().copied().collect();
    let divisor = match normalize {
        Normalize::Mean => stats::mean(&values),
        Normalize::Median => stats::median(&values),
    };
    if !divisor.is_finite() || divisor <= 0.0 {
        return Err(Error::FlatNormalization { divisor });
    }
    master.data.mapv_inplace(|v| v / divisor);

    master.header.set("OBSTYPE", "MFLAT");
    master.header.set("FILENAME", "master_flat");
    master
        .header
        .set_with_comment("NCOMBINE", flats.len(), "frames combined");
    master.header.set_with_comment(
        "FLATNORM",
        divisor,
        match normalize {
            Normalize::Mean => "mean of combined flat",
            Normalize::Median => "median of combined flat",
        },
    );
    master.header.add_history(format!(
        "master flat: {} combine of {} frames, {} normalized ({divisor:.2})",
        method,
        flats.len(),
        normalize
    ));
    for frame in flats {
        master.header.add_history(format!("combined {}", frame.id()));
    }
    log::info!(
        "master flat from {} frames ({method}), {normalize} {divisor:.2}",
        flats.len()
    );
    Ok(master)
}

/// Divide by a normalized master flat. Master pixels at or below
/// `min_ratio` would blow up the quotient, so the input pixel passes
/// through unchanged there; the count of protected pixels is logged and
/// stored under `FLATPROT`.
pub fn divide_flat(frame: &Frame, master: &Frame, min_ratio: f64) -> Result<Frame> {
    if frame.header.contains("FLATCOR") {
        log::warn!("{}: already flat corrected, skipping", frame.id());
        return Ok(frame.clone());
    }

    let (rows, cols) = master.shape();
    if frame.shape() != (rows, cols) {
        return Err(Error::ShapeMismatch {
            expected_rows: rows,
            expected_cols: cols,
            got_rows: frame.rows(),
            got_cols: frame.cols(),
        });
    }

    let mut data = frame.data.clone();
    let mut protected: usize = 0;
    for y in 0..rows {
        for x in 0..cols {
            let m = master.data[(y, x)];
            if m <= min_ratio {
                protected += 1;
            } else {
                data[(y, x)] /= m;
            }
        }
    }

    if protected > 0 {
        log::warn!(
            "{}: {protected} master flat pixels at or below {min_ratio}, input passed through",
            frame.id()
        );
    }

    let mut header = frame.header.clone();
    header.set_with_comment("FLATCOR", master.id(), "master flat divided");
    header.set_with_comment("FLATPROT", protected, "pixels protected from flat division");
    header.add_history(format!("flat corrected ({})", master.id()));
    Ok(Frame::new(data, header))
}
