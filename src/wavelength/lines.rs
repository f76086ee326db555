use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::spectrum::Spectrum;
use crate::stats;

// ---------------------------------------------------------------------------
// Emission-line detection
// ---------------------------------------------------------------------------

/// One detected emission peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineDetection {
    /// Sub-pixel line center, in the spectrum's pixel coordinates.
    pub pixel: f64,
    /// Flux at the peak sample.
    pub peak: f64,
}

/// Find emission peaks in a comparison-lamp spectrum: local maxima above
/// `median + threshold_sigma * stddev`, refined to sub-pixel centers by
/// three-point parabolic interpolation (flux-weighted centroid over ±2
/// samples when the parabola degenerates). Output is sorted by pixel.
///
/// This assists building a pixel/wavelength correspondence list by hand;
/// identification against a lamp atlas is up to the astronomer.
pub fn detect_lines(spectrum: &Spectrum, threshold_sigma: f64) -> Vec<LineDetection> {
    let y = &spectrum.y;
    if y.len() < 3 {
        return Vec::new();
    }

    let threshold = stats::median(y) + threshold_sigma * stats::sample_stddev(y);

    let mut lines = Vec::new();
    for i in 1..y.len() - 1 {
        // strict rise on the left, plateau allowed on the right, so a
        // two-sample plateau counts once
        if y[i] > threshold && y[i] > y[i - 1] && y[i] >= y[i + 1] {
            let center = refine(y, i);
            lines.push(LineDetection {
                pixel: spectrum.x[i] + (center - i as f64),
                peak: y[i],
            });
        }
    }
    lines
}

/// Sub-sample peak center around index `i`, in sample coordinates.
fn refine(y: &[f64], i: usize) -> f64 {
    let denom = y[i - 1] - 2.0 * y[i] + y[i + 1];
    if denom < 0.0 {
        let dx = 0.5 * (y[i - 1] - y[i + 1]) / denom;
        if dx.abs() <= 1.0 {
            return i as f64 + dx;
        }
    }

    let lo = i.saturating_sub(2);
    let hi = (i + 2).min(y.len() - 1);
    let mut weight = 0.0;
    let mut moment = 0.0;
    for (k, &v) in y.iter().enumerate().take(hi + 1).skip(lo) {
        let w = v.max(0.0);
        weight += w;
        moment += w * k as f64;
    }
    if weight > 0.0 {
        moment / weight
    } else {
        i as f64
    }
}

// ---------------------------------------------------------------------------
// Correspondence lists
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LineRow {
    pixel: f64,
    wavelength: f64,
}

/// Read a `pixel,wavelength` CSV correspondence list. Returns the two
/// columns separately, ready for fitting.
pub fn read_line_list(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut pixels = Vec::new();
    let mut wavelengths = Vec::new();
    for row in reader.deserialize() {
        let row: LineRow = row?;
        pixels.push(row.pixel);
        wavelengths.push(row.wavelength);
    }
    if pixels.is_empty() {
        return Err(Error::EmptyInput {
            what: format!("no correspondences in {}", path.display()),
        });
    }
    Ok((pixels, wavelengths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;

    fn lamp(centers: &[f64]) -> Spectrum {
        let flux: Vec<f64> = (0..200)
            .map(|p| {
                let p = p as f64;
                10.0 + centers
                    .iter()
                    .map(|c| 500.0 * (-((p - c) / 1.5).powi(2) / 2.0).exp())
                    .sum::<f64>()
            })
            .collect();
        Spectrum::from_flux(flux, Header::new()).unwrap()
    }

    #[test]
    fn lines_are_found_with_subpixel_centers() {
        let spectrum = lamp(&[50.3, 120.7]);
        let lines = detect_lines(&spectrum, 3.0);

        assert_eq!(lines.len(), 2);
        assert!((lines[0].pixel - 50.3).abs() < 0.05, "got {}", lines[0].pixel);
        assert!((lines[1].pixel - 120.7).abs() < 0.05, "got {}", lines[1].pixel);
        assert!(lines[0].peak > 400.0);
        // sorted by pixel
        assert!(lines[0].pixel < lines[1].pixel);
    }

    #[test]
    fn featureless_spectra_yield_nothing() {
        let flat = Spectrum::from_flux(vec![10.0; 100], Header::new()).unwrap();
        assert!(detect_lines(&flat, 3.0).is_empty());

        let tiny = Spectrum::from_flux(vec![1.0, 2.0], Header::new()).unwrap();
        assert!(detect_lines(&tiny, 3.0).is_empty());
    }

    #[test]
    fn a_flat_topped_peak_counts_once() {
        let mut flux = vec![1.0; 30];
        flux[14] = 80.0;
        flux[15] = 80.0;
        let spectrum = Spectrum::from_flux(flux, Header::new()).unwrap();
        let lines = detect_lines(&spectrum, 3.0);
        assert_eq!(lines.len(), 1);
        assert!((lines[0].pixel - 14.5).abs() < 0.6);
    }

    #[test]
    fn refine_falls_back_to_the_centroid() {
        // not a genuine maximum, the parabola is flat
        assert_eq!(refine(&[5.0, 5.0, 5.0], 1), 1.0);
    }

    #[test]
    fn line_lists_read_both_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.csv");
        std::fs::write(&path, "pixel,wavelength\n100.5,3650.15\n250.25,3948.98\n").unwrap();

        let (pixels, wavelengths) = read_line_list(&path).unwrap();
        assert_eq!(pixels, vec![100.5, 250.25]);
        assert_eq!(wavelengths, vec![3650.15, 3948.98]);

        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, "pixel,wavelength\n").unwrap();
        assert!(matches!(
            read_line_list(&empty),
            Err(Error::EmptyInput { .. })
        ));
    }
}
