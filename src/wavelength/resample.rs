use crate::error::{Error, Result};
use crate::spectrum::Spectrum;

use super::model::DispersionModel;
use super::wcs::write_linear;

/// Apply a dispersion model and resample onto an evenly spaced wavelength
/// grid with the same endpoints and sample count, by linear interpolation.
///
/// The model must be strictly monotonic over the spectrum (increasing or
/// decreasing); the resulting linear WCS is written into the output header,
/// which is how non-linear solutions end up in storable form.
pub fn linearize(spectrum: &Spectrum, model: &DispersionModel) -> Result<Spectrum> {
    let n = spectrum.len();
    if n < 2 {
        return Err(Error::NonMonotonic);
    }

    let wl: Vec<f64> = spectrum.x.iter().map(|&p| model.wavelength(p)).collect();
    let increasing = wl.windows(2).all(|w| w[1] > w[0]);
    let decreasing = wl.windows(2).all(|w| w[1] < w[0]);
    if !increasing && !decreasing {
        return Err(Error::NonMonotonic);
    }

    // interpolate over an ascending axis; flip back afterwards if needed
    let (axis, flux_in): (Vec<f64>, Vec<f64>) = if increasing {
        (wl.clone(), spectrum.y.clone())
    } else {
        (
            wl.iter().rev().copied().collect(),
            spectrum.y.iter().rev().copied().collect(),
        )
    };

    let start = wl[0];
    let step = (wl[n - 1] - wl[0]) / (n - 1) as f64;
    let grid: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
    let flux: Vec<f64> = grid.iter().map(|&w| interp(&axis, &flux_in, w)).collect();

    let mut header = spectrum.header.clone();
    write_linear(
        &mut header,
        &DispersionModel::Linear {
            crval: start,
            cdelt: step,
            crpix: 1.0,
        },
    )?;

    Spectrum::new(grid, flux, header)
}

/// Linear interpolation on an ascending axis, clamped at the ends.
fn interp(axis: &[f64], flux: &[f64], w: f64) -> f64 {
    let n = axis.len();
    let k = axis.partition_point(|&a| a < w);
    if k == 0 {
        return flux[0];
    }
    if k == n {
        return flux[n - 1];
    }
    let frac = (w - axis[k - 1]) / (axis[k] - axis[k - 1]);
    flux[k - 1] + frac * (flux[k] - flux[k - 1])
}
