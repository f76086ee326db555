//! Aperture extraction: collapse a reduced 2D frame into a 1D spectrum.
//!
//! The target is located on the spatial profile (the per-row median along
//! the dispersion axis), then rows around it are summed per column. A
//! comparison lamp illuminates the whole slit, so lamps are extracted with
//! the aperture found on the matching object frame.

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::spectrum::Spectrum;
use crate::stats;

/// Where the spatial profile puts the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetLocation {
    /// Row coordinate of the profile peak (half-max midpoint).
    pub center: f64,
    /// Full width at half maximum, in rows.
    pub fwhm: f64,
}

/// Median flux along the dispersion axis, one value per row.
pub fn spatial_profile(frame: &Frame) -> Vec<f64> {
    (0..frame.rows())
        .map(|y| {
            let row: Vec<f64> = frame.data.row(y).to_vec();
            stats::median(&row)
        })
        .collect()
}

/// Locate the brightest target on a spatial profile.
///
/// The peak must rise above the profile median by three standard
/// deviations; flat frames fail with [`Error::NoTarget`]. The center is the
/// midpoint of the half-maximum crossings, which is more stable than the
/// raw argmax for asymmetric profiles.
pub fn find_target(profile: &[f64]) -> Result<TargetLocation> {
    if profile.is_empty() {
        return Err(Error::EmptyInput {
            what: "spatial profile".to_string(),
        });
    }

    let background = stats::median(profile);
    let spread = stats::sample_stddev(profile);

    let (peak_row, peak) = profile
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, profile[0]));

    if peak < background + 3.0 * spread || spread == 0.0 {
        return Err(Error::NoTarget {
            message: format!(
                "profile peak {peak:.1} does not stand out of background {background:.1} (stddev {spread:.1})"
            ),
        });
    }

    let half = background + (peak - background) / 2.0;

    // walk out from the peak to the half-maximum crossings, interpolating
    // the fractional row; clamp at the frame edges
    let mut left = 0.0;
    for y in (0..peak_row).rev() {
        if profile[y] < half {
            let frac = (half - profile[y]) / (profile[y + 1] - profile[y]);
            left = y as f64 + frac;
            break;
        }
    }
    let mut right = (profile.len() - 1) as f64;
    for y in peak_row + 1..profile.len() {
        if profile[y] < half {
            let frac = (half - profile[y]) / (profile[y - 1] - profile[y]);
            right = y as f64 - frac;
            break;
        }
    }

    Ok(TargetLocation {
        center: 0.5 * (left + right),
        fwhm: right - left,
    })
}

/// Sum rows within `center ± half_width` into a 1D spectrum.
///
/// With `background_offset` set, two strips the size of the aperture are
/// sampled `offset` rows beyond each aperture edge; their per-column median,
/// scaled to the aperture height, is subtracted. Apertures and strips
/// falling off the frame are clipped to the rows that exist; `APWIDTH`
/// records the effective height. `half_width == 0` extracts a single row.
pub fn extract_aperture(
    frame: &Frame,
    center: f64,
    half_width: usize,
    background_offset: Option<usize>,
) -> Result<Spectrum> {
    let rows = frame.rows() as i64;
    let center_row = center.round() as i64;
    if center_row < 0 || center_row >= rows {
        return Err(Error::NoTarget {
            message: format!(
                "aperture center {center:.1} outside frame rows 0..{rows}"
            ),
        });
    }

    let hw = half_width as i64;
    let lo = (center_row - hw).max(0) as usize;
    let hi = (center_row + hw).min(rows - 1) as usize;
    let height = hi - lo + 1;

    let mut flux: Vec<f64> = (0..frame.cols())
        .map(|x| (lo..=hi).map(|y| frame.data[(y, x)]).sum())
        .collect();

    let mut background_used = false;
    if let Some(offset) = background_offset {
        let offset = offset as i64;
        let strip = |from: i64| -> Option<(usize, usize)> {
            let a = from.max(0);
            let b = (from + 2 * hw).min(rows - 1);
            (a <= b).then_some((a as usize, b as usize))
        };
        // strips sit `offset` rows beyond the aperture edges
        let lower = strip(center_row - hw - offset - 2 * hw - 1);
        let upper = strip(center_row + hw + offset + 1);

        if lower.is_none() && upper.is_none() {
            log::warn!(
                "{}: background strips fall outside the frame, skipping subtraction",
                frame.id()
            );
        } else {
            let mut sky = Vec::new();
            for (x, value) in flux.iter_mut().enumerate() {
                sky.clear();
                for &(a, b) in [lower, upper].iter().flatten() {
                    sky.extend((a..=b).map(|y| frame.data[(y, x)]));
                }
                *value -= stats::median(&sky) * height as f64;
            }
            background_used = true;
        }
    }

    let mut header = frame.header.clone();
    header.set_with_comment("XTRACTED", true, "aperture extracted");
    header.set_with_comment("APCENTER", center, "aperture center row");
    header.set_with_comment("APWIDTH", height, "effective aperture height in rows");
    header.add_history(if background_used {
        format!("extracted rows {lo}..{hi} with background strips")
    } else {
        format!("extracted rows {lo}..{hi}")
    });

    Spectrum::from_flux(flux, header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;
    use ndarray::Array2;

    /// 20 rows x 5 cols; sky at 1.0, target rows 8..=12 at 10.0.
    fn target_frame() -> Frame {
        let mut data = Array2::from_elem((20, 5), 1.0);
        for y in 8..=12 {
            for x in 0..5 {
                data[(y, x)] = 10.0;
            }
        }
        Frame::new(data, Header::new())
    }

    #[test]
    fn profile_is_per_row_median() {
        let profile = spatial_profile(&target_frame());
        assert_eq!(profile.len(), 20);
        assert_eq!(profile[0], 1.0);
        assert_eq!(profile[10], 10.0);
    }

    #[test]
    fn target_found_at_the_peak() {
        // gaussian bump (sigma 2) on row 40 of a 100-row slit
        let profile: Vec<f64> = (0..100)
            .map(|y| 1.0 + 50.0 * (-((y as f64 - 40.0) / 2.0).powi(2) / 2.0).exp())
            .collect();
        let target = find_target(&profile).unwrap();
        assert!((target.center - 40.0).abs() < 0.1);
        // gaussian fwhm = 2.355 sigma
        assert!((target.fwhm - 4.71).abs() < 0.5);
    }

    #[test]
    fn flat_profile_has_no_target() {
        assert!(matches!(
            find_target(&[5.0; 40]),
            Err(Error::NoTarget { .. })
        ));
        let noisy: Vec<f64> = (0..40).map(|i| 5.0 + 0.01 * (i % 3) as f64).collect();
        assert!(matches!(find_target(&noisy), Err(Error::NoTarget { .. })));
    }

    #[test]
    fn aperture_sums_rows_and_subtracts_background() {
        let frame = target_frame();

        let plain = extract_aperture(&frame, 10.0, 2, None).unwrap();
        assert_eq!(plain.len(), 5);
        assert_eq!(plain.y[0], 50.0); // five rows of 10
        assert_eq!(plain.x[4], 4.0);
        assert_eq!(plain.header.get_float("APCENTER"), Some(10.0));
        assert_eq!(plain.header.get_int("APWIDTH"), Some(5));

        let skysub = extract_aperture(&frame, 10.0, 2, Some(2)).unwrap();
        // sky of 1.0 scaled to the 5-row aperture
        assert_eq!(skysub.y[0], 45.0);
    }

    #[test]
    fn aperture_clips_at_the_edge() {
        let frame = target_frame();
        let spectrum = extract_aperture(&frame, 1.0, 3, None).unwrap();
        // rows 0..=4 exist
        assert_eq!(spectrum.header.get_int("APWIDTH"), Some(5));
        assert_eq!(spectrum.y[0], 5.0);
    }

    #[test]
    fn zero_half_width_takes_one_row() {
        let frame = target_frame();
        let spectrum = extract_aperture(&frame, 10.0, 0, None).unwrap();
        assert_eq!(spectrum.header.get_int("APWIDTH"), Some(1));
        assert_eq!(spectrum.y[2], 10.0);
    }

    #[test]
    fn center_off_frame_is_an_error() {
        let frame = target_frame();
        assert!(matches!(
            extract_aperture(&frame, 25.0, 2, None),
            Err(Error::NoTarget { .. })
        ));
    }
}
