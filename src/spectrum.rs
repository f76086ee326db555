use crate::error::{Error, Result};
use crate::header::Header;

// ---------------------------------------------------------------------------
// Spectrum – one extracted 1D spectrum
// ---------------------------------------------------------------------------

/// A single 1D spectrum.
///
/// `x` is the coordinate axis — pixel index right after extraction,
/// wavelength in Angstrom once calibrated — and `y` the flux, always the
/// same length. The header travels with the spectrum through calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub header: Header,
}

impl Spectrum {
    /// Build from explicit axes; errors if lengths differ or are zero.
    pub fn new(x: Vec<f64>, y: Vec<f64>, header: Header) -> Result<Spectrum> {
        if x.len() != y.len() {
            return Err(Error::container(format!(
                "spectrum x has {} values but y has {}",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(Error::EmptyInput {
                what: "spectrum axes".to_string(),
            });
        }
        Ok(Spectrum { x, y, header })
    }

    /// Build from flux alone; `x` becomes the 0-based pixel index.
    pub fn from_flux(y: Vec<f64>, header: Header) -> Result<Spectrum> {
        let x = (0..y.len()).map(|i| i as f64).collect();
        Spectrum::new(x, y, header)
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// A short identifier for log lines.
    pub fn id(&self) -> &str {
        self.header
            .get_str("OBJECT")
            .or_else(|| self.header.get_str("FILENAME"))
            .unwrap_or("spectrum")
    }
}
