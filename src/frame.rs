use std::fmt;

use ndarray::{s, Array2, ArrayView2};

use crate::error::{Error, Result};
use crate::header::Header;
use crate::stats;

// ---------------------------------------------------------------------------
// Section – FITS-notation rectangular region
// ---------------------------------------------------------------------------

/// A rectangular frame region parsed from FITS section notation, the form
/// used by `BIASSEC`/`TRIMSEC` keywords: `[c1:c2,r1:r2]`, 1-based, inclusive,
/// columns first.
///
/// Internally 0-based and half-open: columns `[x0, x1)`, rows `[y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

impl Section {
    /// Parse FITS section notation. Brackets are optional but must come as a
    /// pair; whitespace around numbers is tolerated.
    pub fn parse(text: &str) -> Result<Section> {
        let invalid = |reason: &str| Error::InvalidSection {
            section: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim();
        let inner = match (trimmed.starts_with('['), trimmed.ends_with(']')) {
            (true, true) => &trimmed[1..trimmed.len() - 1],
            (false, false) => trimmed,
            _ => return Err(invalid("unbalanced brackets")),
        };

        let mut axes = inner.split(',');
        let cols = axes.next().ok_or_else(|| invalid("missing column range"))?;
        let rows = axes.next().ok_or_else(|| invalid("missing row range"))?;
        if axes.next().is_some() {
            return Err(invalid("more than two axes"));
        }

        let parse_range = |axis: &str| -> Result<(usize, usize)> {
            let (a, b) = axis
                .split_once(':')
                .ok_or_else(|| invalid("range must be start:end"))?;
            let start: usize = a
                .trim()
                .parse()
                .map_err(|_| invalid("range bound is not a positive integer"))?;
            let end: usize = b
                .trim()
                .parse()
                .map_err(|_| invalid("range bound is not a positive integer"))?;
            if start == 0 || end == 0 {
                return Err(invalid("FITS sections are 1-based"));
            }
            if start > end {
                return Err(invalid("range start exceeds end"));
            }
            Ok((start, end))
        };

        let (c1, c2) = parse_range(cols)?;
        let (r1, r2) = parse_range(rows)?;

        Ok(Section {
            x0: c1 - 1,
            x1: c2,
            y0: r1 - 1,
            y1: r2,
        })
    }

    /// Build a section directly from 0-based half-open ranges.
    pub fn from_ranges(x0: usize, x1: usize, y0: usize, y1: usize) -> Result<Section> {
        if x0 >= x1 || y0 >= y1 {
            return Err(Error::InvalidSection {
                section: format!("cols {x0}..{x1}, rows {y0}..{y1}"),
                reason: "empty range".to_string(),
            });
        }
        Ok(Section { x0, x1, y0, y1 })
    }

    /// Columns covered.
    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    /// Rows covered.
    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }

    /// Error unless the section lies inside a `ncols` x `nrows` frame.
    pub fn validate_within(&self, ncols: usize, nrows: usize) -> Result<()> {
        if self.x1 > ncols || self.y1 > nrows {
            return Err(Error::SectionOutOfBounds {
                section: self.to_string(),
                ncols,
                nrows,
            });
        }
        Ok(())
    }

    /// The intersection with an `ncols` x `nrows` frame, or an error when the
    /// section lies entirely outside it.
    pub fn clip_to(&self, ncols: usize, nrows: usize) -> Result<Section> {
        let x1 = self.x1.min(ncols);
        let y1 = self.y1.min(nrows);
        if self.x0 >= x1 || self.y0 >= y1 {
            return Err(Error::SectionOutOfBounds {
                section: self.to_string(),
                ncols,
                nrows,
            });
        }
        Ok(Section {
            x0: self.x0,
            x1,
            y0: self.y0,
            y1,
        })
    }
}

impl fmt::Display for Section {
    /// Renders back to FITS notation (1-based, inclusive).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{},{}:{}]",
            self.x0 + 1,
            self.x1,
            self.y0 + 1,
            self.y1
        )
    }
}

// ---------------------------------------------------------------------------
// Frame – one 2D CCD exposure
// ---------------------------------------------------------------------------

/// A single CCD frame: pixel data plus its header.
///
/// Axis 0 is rows (spatial direction, `NAXIS2`), axis 1 is columns
/// (dispersion direction, `NAXIS1`).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub data: Array2<f64>,
    pub header: Header,
}

/// Summary pixel statistics over a frame or section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub mean: f64,
    pub median: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub npix: usize,
}

impl Frame {
    /// Wrap pixel data and a header; `NAXIS1`/`NAXIS2` are set from the
    /// array shape so the header never disagrees with the data.
    pub fn new(data: Array2<f64>, mut header: Header) -> Frame {
        let (rows, cols) = data.dim();
        header.set("NAXIS1", cols);
        header.set("NAXIS2", rows);
        Frame { data, header }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// A short identifier for log lines: the container filename when known,
    /// else the object name, else a placeholder.
    pub fn id(&self) -> &str {
        self.header
            .get_str("FILENAME")
            .or_else(|| self.header.get_str("OBJECT"))
            .unwrap_or("frame")
    }

    /// Borrow the pixels inside a section.
    pub fn view(&self, section: &Section) -> Result<ArrayView2<'_, f64>> {
        section.validate_within(self.cols(), self.rows())?;
        Ok(self
            .data
            .slice(s![section.y0..section.y1, section.x0..section.x1]))
    }

    /// A new frame holding only the section, with NAXIS keywords updated and
    /// the operation recorded in HISTORY.
    pub fn crop(&self, section: &Section) -> Result<Frame> {
        let view = self.view(section)?;
        let mut header = self.header.clone();
        header.add_history(format!("cropped to {section}"));
        Ok(Frame::new(view.to_owned(), header))
    }

    /// Statistics over the whole frame.
    pub fn stats(&self) -> FrameStats {
        collect_stats(self.data.iter().copied())
    }

    /// Statistics over a section only.
    pub fn section_stats(&self, section: &Section) -> Result<FrameStats> {
        let view = self.view(section)?;
        Ok(collect_stats(view.iter().copied()))
    }
}

fn collect_stats(values: impl Iterator<Item = f64>) -> FrameStats {
    let values: Vec<f64> = values.collect();
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in &values {
        min = min.min(v);
        max = max.max(v);
    }
    FrameStats {
        mean: stats::mean(&values),
        median: stats::median(&values),
        stddev: stats::sample_stddev(&values),
        min,
        max,
        npix: values.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn section_parse_and_display() {
        let s = Section::parse("[1:380,1:100]").unwrap();
        assert_eq!((s.x0, s.x1, s.y0, s.y1), (0, 380, 0, 100));
        assert_eq!(s.width(), 380);
        assert_eq!(s.height(), 100);
        assert_eq!(s.to_string(), "[1:380,1:100]");

        // brackets optional, whitespace tolerated
        let s2 = Section::parse(" 1:380 , 1:100 ").unwrap();
        assert_eq!(s, s2);
    }

    #[test]
    fn section_parse_rejects_malformed() {
        assert!(Section::parse("[1:380,1:100").is_err()); // unbalanced
        assert!(Section::parse("[0:380,1:100]").is_err()); // 1-based
        assert!(Section::parse("[380:1,1:100]").is_err()); // reversed
        assert!(Section::parse("[1:380]").is_err()); // one axis
        assert!(Section::parse("[1:380,1:100,1:2]").is_err()); // three axes
        assert!(Section::parse("[a:b,1:100]").is_err());
    }

    #[test]
    fn crop_takes_the_right_pixels() {
        let data = array![
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
        ];
        let frame = Frame::new(data, Header::new());
        assert_eq!(frame.header.get_int("NAXIS1"), Some(4));
        assert_eq!(frame.header.get_int("NAXIS2"), Some(3));

        // columns 2..3, rows 1..3 (FITS notation)
        let section = Section::parse("[2:3,1:3]").unwrap();
        let cropped = frame.crop(&section).unwrap();
        assert_eq!(cropped.shape(), (3, 2));
        assert_eq!(cropped.data[(0, 0)], 2.0);
        assert_eq!(cropped.data[(2, 1)], 11.0);
        assert_eq!(cropped.header.get_int("NAXIS1"), Some(2));
        assert!(cropped.header.history()[0].contains("[2:3,1:3]"));
    }

    #[test]
    fn out_of_bounds_section_is_an_error() {
        let frame = Frame::new(Array2::zeros((10, 20)), Header::new());
        let section = Section::parse("[1:21,1:10]").unwrap();
        assert!(matches!(
            frame.view(&section),
            Err(Error::SectionOutOfBounds { .. })
        ));
    }

    #[test]
    fn clip_to_intersects_with_frame_bounds() {
        let s = Section::parse("[10:30,1:5]").unwrap();
        let c = s.clip_to(20, 10).unwrap();
        assert_eq!((c.x0, c.x1, c.y0, c.y1), (9, 20, 0, 5));
        // entirely outside
        assert!(s.clip_to(5, 10).is_err());
    }

    #[test]
    fn stats_over_section() {
        let mut data = Array2::zeros((4, 4));
        data[(0, 0)] = 8.0;
        let frame = Frame::new(data, Header::new());

        let full = frame.stats();
        assert_eq!(full.npix, 16);
        assert_eq!(full.max, 8.0);
        assert_eq!(full.median, 0.0);

        // section avoiding the hot pixel
        let section = Section::parse("[2:4,2:4]").unwrap();
        let s = frame.section_stats(&section).unwrap();
        assert_eq!(s.npix, 9);
        assert_eq!(s.max, 0.0);
    }
}
