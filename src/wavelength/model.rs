use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Dispersion models
// ---------------------------------------------------------------------------

/// The model families the calibration can fit. Anything else is refused
/// explicitly rather than silently approximated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    Chebyshev,
}

/// A pixel-to-wavelength mapping.
///
/// Pixels are 0-based throughout the library; the FITS `CRPIX` convention
/// (1-based reference pixel) is translated at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum DispersionModel {
    /// wavelength(p) = crval + (p - (crpix - 1)) * cdelt
    Linear { crval: f64, cdelt: f64, crpix: f64 },
    /// Chebyshev series of the first kind over pixels mapped to [-1, 1]
    /// across [pmin, pmax]. `coeffs.len() == degree + 1`.
    Chebyshev {
        degree: usize,
        pmin: f64,
        pmax: f64,
        coeffs: Vec<f64>,
    },
}

impl DispersionModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            DispersionModel::Linear { .. } => ModelKind::Linear,
            DispersionModel::Chebyshev { .. } => ModelKind::Chebyshev,
        }
    }

    /// Wavelength at a (fractional, 0-based) pixel. Evaluation outside the
    /// fitted pixel range extrapolates.
    pub fn wavelength(&self, pixel: f64) -> f64 {
        match self {
            DispersionModel::Linear {
                crval,
                cdelt,
                crpix,
            } => crval + (pixel - (crpix - 1.0)) * cdelt,
            DispersionModel::Chebyshev {
                pmin,
                pmax,
                coeffs,
                ..
            } => {
                let t = if pmax > pmin {
                    (2.0 * pixel - (pmin + pmax)) / (pmax - pmin)
                } else {
                    0.0
                };
                clenshaw(t, coeffs)
            }
        }
    }

    /// Wavelengths over the 0-based pixel grid `0..npix`.
    pub fn wavelengths(&self, npix: usize) -> Vec<f64> {
        (0..npix).map(|p| self.wavelength(p as f64)).collect()
    }
}

/// Clenshaw recurrence for a Chebyshev series at `t` in [-1, 1].
fn clenshaw(t: f64, coeffs: &[f64]) -> f64 {
    let Some(&first) = coeffs.first() else {
        return 0.0;
    };
    let mut b1 = 0.0;
    let mut b2 = 0.0;
    for &a in coeffs.iter().skip(1).rev() {
        let b0 = a + 2.0 * t * b1 - b2;
        b2 = b1;
        b1 = b0;
    }
    first + t * b1 - b2
}
