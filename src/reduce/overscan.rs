use crate::error::{Error, Result};
use crate::frame::{Frame, Section};
use crate::stats;

/// Summary statistics of an overscan strip. The stddev doubles as a quick
/// read-noise estimate in ADU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverscanStats {
    pub mean: f64,
    pub median: f64,
    pub stddev: f64,
    pub npix: usize,
}

/// Measure the overscan strip without touching the frame.
pub fn overscan_stats(frame: &Frame, section: &Section) -> Result<OverscanStats> {
    let s = frame.section_stats(section)?;
    Ok(OverscanStats {
        mean: s.mean,
        median: s.median,
        stddev: s.stddev,
        npix: s.npix,
    })
}

/// Subtract the overscan level row by row: each row's correction is the
/// median of its overscan columns, so slow vertical bias drifts are removed
/// while read noise in the strip is suppressed by the median.
///
/// The section must span every row of the frame. Records the region under
/// the `OVERSCAN` keyword plus a HISTORY entry.
pub fn subtract_overscan(frame: &Frame, section: &Section) -> Result<Frame> {
    section.validate_within(frame.cols(), frame.rows())?;
    if section.height() != frame.rows() {
        return Err(Error::InvalidSection {
            section: section.to_string(),
            reason: "overscan region must span all rows".to_string(),
        });
    }

    let mut data = frame.data.clone();
    let mut levels = Vec::with_capacity(frame.rows());
    for (y, mut row) in data.rows_mut().into_iter().enumerate() {
        let strip: Vec<f64> = frame.data.row(y).slice(ndarray::s![section.x0..section.x1]).to_vec();
        let level = stats::median(&strip);
        levels.push(level);
        row.mapv_inplace(|v| v - level);
    }

    let night_level = stats::median(&levels);
    log::debug!(
        "{}: overscan {} level {night_level:.2}",
        frame.id(),
        section
    );

    let mut header = frame.header.clone();
    header.set_with_comment(
        "OVERSCAN",
        section.to_string(),
        "region used for overscan correction",
    );
    header.add_history(format!(
        "overscan corrected using {section}, median level {night_level:.2}"
    ));
    Ok(Frame::new(data, header))
}

/// Crop a frame to its trim section. The explicit argument wins; without
/// one the header's `TRIMSEC` is used. Sets `TRIMMED` plus a HISTORY entry.
pub fn trim(frame: &Frame, section: Option<&Section>) -> Result<Frame> {
    let section = match section {
        Some(s) => *s,
        None => Section::parse(frame.header.require_str("TRIMSEC")?)?,
    };

    let view = frame.view(&section)?;
    let mut header = frame.header.clone();
    header.set_with_comment("TRIMMED", true, "frame cropped to trim section");
    header.add_history(format!("trimmed to {section}"));
    Ok(Frame::new(view.to_owned(), header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;
    use ndarray::array;

    /// 3 rows x 5 cols; the last two columns are the overscan strip.
    fn sample() -> Frame {
        let data = array![
            [110.0, 112.0, 111.0, 10.0, 12.0],
            [120.0, 122.0, 121.0, 20.0, 22.0],
            [130.0, 132.0, 131.0, 30.0, 32.0],
        ];
        let mut h = Header::new();
        h.set("BIASSEC", "[4:5,1:3]");
        h.set("TRIMSEC", "[1:3,1:3]");
        Frame::new(data, h)
    }

    #[test]
    fn stats_measure_the_strip_only() {
        let frame = sample();
        let section = Section::parse("[4:5,1:3]").unwrap();
        let s = overscan_stats(&frame, &section).unwrap();
        assert_eq!(s.npix, 6);
        assert_eq!(s.median, 21.0);
        assert_eq!(s.mean, 21.0);
    }

    #[test]
    fn subtraction_is_per_row() {
        let frame = sample();
        let section = Section::parse("[4:5,1:3]").unwrap();
        let corrected = subtract_overscan(&frame, &section).unwrap();

        // row medians of the strip: 11, 21, 31
        assert_eq!(corrected.data[(0, 0)], 99.0);
        assert_eq!(corrected.data[(1, 0)], 99.0);
        assert_eq!(corrected.data[(2, 1)], 101.0);
        // the strip itself is corrected too
        assert_eq!(corrected.data[(0, 3)], -1.0);

        assert_eq!(
            corrected.header.get_str("OVERSCAN"),
            Some("[4:5,1:3]")
        );
        assert!(corrected.header.history()[0].contains("overscan corrected"));
        // input untouched
        assert_eq!(frame.data[(0, 0)], 110.0);
    }

    #[test]
    fn partial_row_coverage_is_rejected() {
        let frame = sample();
        let section = Section::parse("[4:5,1:2]").unwrap();
        assert!(matches!(
            subtract_overscan(&frame, &section),
            Err(Error::InvalidSection { .. })
        ));
    }

    #[test]
    fn trim_prefers_the_argument_over_the_header() {
        let frame = sample();

        let from_header = trim(&frame, None).unwrap();
        assert_eq!(from_header.shape(), (3, 3));
        assert_eq!(from_header.header.get("TRIMMED"), Some(&true.into()));
        assert_eq!(from_header.header.get_int("NAXIS1"), Some(3));

        let section = Section::parse("[1:2,1:3]").unwrap();
        let from_arg = trim(&frame, Some(&section)).unwrap();
        assert_eq!(from_arg.shape(), (3, 2));
    }

    #[test]
    fn trim_without_any_section_is_a_missing_keyword() {
        let frame = Frame::new(ndarray::Array2::zeros((2, 2)), Header::new());
        assert!(matches!(
            trim(&frame, None),
            Err(Error::MissingKeyword { .. })
        ));
    }
}
