use std::fmt;

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::stats;

// ---------------------------------------------------------------------------
// CombineMethod
// ---------------------------------------------------------------------------

/// Pixel-wise frame combination strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombineMethod {
    Median,
    Mean,
    /// Iterative sigma-clipped mean: pixels beyond `sigma` sample standard
    /// deviations from the stack mean are excluded, up to `iterations`
    /// rounds, then the survivors are averaged.
    SigmaClip { sigma: f64, iterations: u32 },
}

impl fmt::Display for CombineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombineMethod::Median => f.write_str("median"),
            CombineMethod::Mean => f.write_str("mean"),
            CombineMethod::SigmaClip { sigma, iterations } => {
                write!(f, "sigma-clip({sigma}, {iterations} iterations)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// combine
// ---------------------------------------------------------------------------

/// Combine frames pixel by pixel. All inputs must share one shape; the
/// output header is a copy of the first frame's (callers stamp provenance).
///
/// Inputs are never mutated. A single frame combines to itself.
pub fn combine(frames: &[Frame], method: CombineMethod) -> Result<Frame> {
    let first = frames.first().ok_or_else(|| Error::EmptyInput {
        what: "no frames to combine".to_string(),
    })?;

    let (rows, cols) = first.shape();
    for frame in &frames[1..] {
        let (r, c) = frame.shape();
        if (r, c) != (rows, cols) {
            return Err(Error::ShapeMismatch {
                expected_rows: rows,
                expected_cols: cols,
                got_rows: r,
                got_cols: c,
            });
        }
    }

    if frames.len() == 1 {
        return Ok(first.clone());
    }

    let mut out = Array2::zeros((rows, cols));
    let mut stack = Vec::with_capacity(frames.len());
    for y in 0..rows {
        for x in 0..cols {
            stack.clear();
            stack.extend(frames.iter().map(|f| f.data[(y, x)]));
            out[(y, x)] = match method {
                CombineMethod::Median => stats::median(&stack),
                CombineMethod::Mean => stats::mean(&stack),
                CombineMethod::SigmaClip { sigma, iterations } => {
                    sigma_clipped_mean(&stack, sigma, iterations)
                }
            };
        }
    }

    Ok(Frame::new(out, first.header.clone()))
}

/// Mean of the values surviving iterative sigma clipping. When a round
/// rejects everything the stack is hopeless and the plain median of the
/// original values is returned instead.
fn sigma_clipped_mean(values: &[f64], sigma: f64, iterations: u32) -> f64 {
    let mut kept: Vec<f64> = values.to_vec();
    for _ in 0..iterations {
        if kept.len() < 2 {
            break;
        }
        let center = stats::mean(&kept);
        let spread = stats::sample_stddev(&kept);
        if spread == 0.0 {
            break;
        }
        let before = kept.len();
        kept.retain(|v| (v - center).abs() <= sigma * spread);
        if kept.is_empty() {
            return stats::median(values);
        }
        if kept.len() == before {
            break;
        }
    }
    stats::mean(&kept)
}
