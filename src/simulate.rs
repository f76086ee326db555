//! Synthetic observing night.
//!
//! Generates raw frames carrying the blemishes the reduction pipeline is
//! meant to remove (bias pedestal, overscan strip, flat-field gradient)
//! plus an arc exposure whose line positions are known exactly. Used by the
//! `simulate_night` binary and the end-to-end tests.

use ndarray::Array2;

use crate::frame::Frame;
use crate::header::Header;
use crate::rng::Xoshiro256;

/// Spatial rows of a raw frame.
pub const ROWS: usize = 100;
/// Dispersion columns of a raw frame, overscan included.
pub const COLS: usize = 400;
/// Columns 1..=380 carry light.
pub const TRIMSEC: &str = "[1:380,1:100]";
/// Columns 381..=400 are the overscan strip.
pub const BIASSEC: &str = "[381:400,1:100]";

const SCIENCE_COLS: usize = 380;
const BIAS_LEVEL: f64 = 300.0;
const READ_NOISE: f64 = 5.0;
const FLAT_LEVEL: f64 = 20_000.0;
const TARGET_ROW: f64 = 50.0;
const TARGET_SIGMA: f64 = 3.5;
const ARC_SIGMA: f64 = 1.3;

/// Arc lines as (trimmed 0-based pixel, peak counts per row). Sub-pixel
/// centers on purpose, so centroiding has something to refine.
const ARC_LINES: [(f64, f64); 10] = [
    (22.4, 8200.0),
    (58.7, 9400.0),
    (96.2, 7600.0),
    (133.8, 10_000.0),
    (170.3, 8800.0),
    (207.9, 7200.0),
    (244.1, 9800.0),
    (281.6, 8400.0),
    (318.2, 7000.0),
    (355.7, 9000.0),
];

/// Dispersion law of the synthetic spectrograph: nearly linear, with a
/// small quadratic term a straight-line solution cannot absorb.
pub fn wavelength_of(pixel: f64) -> f64 {
    3500.0 + 2.0 * pixel + 1.5e-5 * pixel * pixel
}

/// Knobs for the synthetic night.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub seed: u64,
    pub nbias: usize,
    pub nflat: usize,
    pub object_name: String,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        SimulationPlan {
            seed: 42,
            nbias: 5,
            nflat: 3,
            object_name: "sim_star".to_string(),
        }
    }
}

/// A generated night plus the arc-line truth table.
#[derive(Debug)]
pub struct SimulatedNight {
    pub frames: Vec<Frame>,
    /// `(pixel, wavelength)` of every arc line, in trimmed 0-based pixels.
    pub lines: Vec<(f64, f64)>,
}

/// Builds the raw frames of one night: biases, flats, one object exposure
/// and one comparison-lamp exposure, all sharing a single instrument setup.
pub fn simulate_night(plan: &SimulationPlan) -> SimulatedNight {
    let mut rng = Xoshiro256::new(plan.seed);
    let mut frames = Vec::with_capacity(plan.nbias + plan.nflat + 2);

    for i in 0..plan.nbias {
        let mut header = base_header("BIAS", &format!("bias_{:03}", i + 1));
        header.set("EXPTIME", 0.0);
        frames.push(Frame::new(bias_data(&mut rng), header));
    }

    for i in 0..plan.nflat {
        let mut header = base_header("FLAT", &format!("flat_{:03}", i + 1));
        header.set("EXPTIME", 2.0);
        frames.push(Frame::new(flat_data(&mut rng), header));
    }

    let mut header = base_header("OBJECT", "object_001");
    header.set("OBJECT", plan.object_name.as_str());
    header.set("EXPTIME", 600.0);
    frames.push(Frame::new(object_data(&mut rng), header));

    let mut header = base_header("COMP", "comp_001");
    header.set("OBJECT", "HgArNe");
    header.set("LAMP", "HgArNe");
    header.set("EXPTIME", 30.0);
    frames.push(Frame::new(comp_data(&mut rng), header));

    let lines = ARC_LINES
        .iter()
        .map(|&(pixel, _)| (pixel, wavelength_of(pixel)))
        .collect();

    SimulatedNight { frames, lines }
}

fn base_header(obstype: &str, filename: &str) -> Header {
    let mut header = Header::new();
    header.set("OBSTYPE", obstype);
    header.set("FILENAME", filename);
    header.set("GRATING", "930");
    header.set("WAVMODE", "M1");
    header.set("FILTER", "NONE");
    header.set("TRIMSEC", TRIMSEC);
    header.set("BIASSEC", BIASSEC);
    header
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn bias_data(rng: &mut Xoshiro256) -> Array2<f64> {
    Array2::from_shape_fn((ROWS, COLS), |_| BIAS_LEVEL + rng.gauss(0.0, READ_NOISE))
}

fn flat_data(rng: &mut Xoshiro256) -> Array2<f64> {
    Array2::from_shape_fn((ROWS, COLS), |(_, col)| {
        let base = BIAS_LEVEL + rng.gauss(0.0, READ_NOISE);
        if col >= SCIENCE_COLS {
            return base;
        }
        // smooth 10% illumination gradient along the dispersion axis
        let signal = FLAT_LEVEL * (0.95 + 0.10 * col as f64 / SCIENCE_COLS as f64);
        base + signal + rng.gauss(0.0, signal.sqrt())
    })
}

fn object_data(rng: &mut Xoshiro256) -> Array2<f64> {
    Array2::from_shape_fn((ROWS, COLS), |(row, col)| {
        let base = BIAS_LEVEL + rng.gauss(0.0, READ_NOISE);
        if col >= SCIENCE_COLS {
            return base;
        }
        let continuum = 3000.0 + 2.0 * col as f64;
        let signal = continuum * gaussian(row as f64, TARGET_ROW, TARGET_SIGMA, 1.0);
        base + signal + rng.gauss(0.0, signal.max(0.0).sqrt())
    })
}

fn comp_data(rng: &mut Xoshiro256) -> Array2<f64> {
    Array2::from_shape_fn((ROWS, COLS), |(_, col)| {
        let base = BIAS_LEVEL + rng.gauss(0.0, READ_NOISE);
        if col >= SCIENCE_COLS {
            return base;
        }
        let signal: f64 = ARC_LINES
            .iter()
            .map(|&(pixel, amp)| gaussian(col as f64, pixel, ARC_SIGMA, amp))
            .sum();
        base + signal + rng.gauss(0.0, signal.max(0.0).sqrt())
    })
}
