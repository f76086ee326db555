use crate::error::{Error, Result};

use super::model::{DispersionModel, ModelKind};

/// Highest Chebyshev degree the solver accepts. Arc-lamp solutions in
/// practice use degree 3 to 5; anything past this is a caller mistake.
const MAX_DEGREE: usize = 16;

// ---------------------------------------------------------------------------
// WavelengthSolution
// ---------------------------------------------------------------------------

/// A dispersion model fitted to pixel/wavelength correspondences, with its
/// fit quality.
#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthSolution {
    model: DispersionModel,
    /// Root mean square of the residuals, in wavelength units.
    pub rms: f64,
    /// Per-correspondence residuals, observed minus model.
    pub residuals: Vec<f64>,
    pub npoints: usize,
}

impl WavelengthSolution {
    /// Least-squares fit of the requested model kind over correspondence
    /// pairs. `degree` applies to [`ModelKind::Chebyshev`] and is ignored
    /// for the linear model.
    ///
    /// Duplicate pixels are permitted (plain least squares); all pixels at
    /// one location, mismatched list lengths, too few points, or non-finite
    /// values are errors.
    pub fn fit(
        pixels: &[f64],
        wavelengths: &[f64],
        kind: ModelKind,
        degree: usize,
    ) -> Result<WavelengthSolution> {
        if pixels.len() != wavelengths.len() {
            return Err(Error::LengthMismatch {
                pixels: pixels.len(),
                wavelengths: wavelengths.len(),
            });
        }
        if pixels
            .iter()
            .chain(wavelengths.iter())
            .any(|v| !v.is_finite())
        {
            return Err(Error::NonFinite {
                what: "pixel/wavelength correspondences".to_string(),
            });
        }

        let model = match kind {
            ModelKind::Linear => fit_linear(pixels, wavelengths)?,
            ModelKind::Chebyshev => fit_chebyshev(pixels, wavelengths, degree)?,
        };

        let residuals: Vec<f64> = pixels
            .iter()
            .zip(wavelengths)
            .map(|(&p, &w)| w - model.wavelength(p))
            .collect();
        let rms = (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt();

        Ok(WavelengthSolution {
            model,
            rms,
            residuals,
            npoints: pixels.len(),
        })
    }

    /// The fitted dispersion model.
    pub fn model(&self) -> &DispersionModel {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Model fits
// ---------------------------------------------------------------------------

fn fit_linear(pixels: &[f64], wavelengths: &[f64]) -> Result<DispersionModel> {
    let n = pixels.len();
    if n < 2 {
        return Err(Error::InsufficientLines { needed: 2, got: n });
    }

    let p_mean = pixels.iter().sum::<f64>() / n as f64;
    let w_mean = wavelengths.iter().sum::<f64>() / n as f64;
    let sxx: f64 = pixels.iter().map(|p| (p - p_mean).powi(2)).sum();
    if sxx == 0.0 {
        // every correspondence sits on one pixel
        return Err(Error::InsufficientLines { needed: 2, got: 1 });
    }
    let sxy: f64 = pixels
        .iter()
        .zip(wavelengths)
        .map(|(&p, &w)| (p - p_mean) * (w - w_mean))
        .sum();

    let cdelt = sxy / sxx;
    let crval = w_mean - cdelt * p_mean;
    Ok(DispersionModel::Linear {
        crval,
        cdelt,
        crpix: 1.0,
    })
}

fn fit_chebyshev(pixels: &[f64], wavelengths: &[f64], degree: usize) -> Result<DispersionModel> {
    if degree > MAX_DEGREE {
        return Err(Error::not_implemented(format!(
            "chebyshev fit of degree {degree} (maximum {MAX_DEGREE})"
        )));
    }
    let n = pixels.len();
    let terms = degree + 1;
    if n < terms {
        return Err(Error::InsufficientLines {
            needed: terms,
            got: n,
        });
    }

    let pmin = pixels.iter().copied().fold(f64::INFINITY, f64::min);
    let pmax = pixels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if pmin == pmax {
        return Err(Error::InsufficientLines {
            needed: terms,
            got: 1,
        });
    }

    // normal equations over the Chebyshev design matrix
    let mut ata = vec![vec![0.0; terms]; terms];
    let mut atw = vec![0.0; terms];
    let mut basis = vec![0.0; terms];
    for (&p, &w) in pixels.iter().zip(wavelengths) {
        let t = (2.0 * p - (pmin + pmax)) / (pmax - pmin);
        basis[0] = 1.0;
        if terms > 1 {
            basis[1] = t;
        }
        for k in 2..terms {
            basis[k] = 2.0 * t * basis[k - 1] - basis[k - 2];
        }
        for i in 0..terms {
            for j in 0..terms {
                ata[i][j] += basis[i] * basis[j];
            }
            atw[i] += basis[i] * w;
        }
    }

    let coeffs = solve(ata, atw).ok_or(Error::InsufficientLines {
        needed: terms,
        got: n,
    })?;

    Ok(DispersionModel::Chebyshev {
        degree,
        pmin,
        pmax,
        coeffs,
    })
}

/// Gaussian elimination with partial pivoting. `None` when the system is
/// singular (degenerate pixel geometry).
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in row + 1..n {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}
