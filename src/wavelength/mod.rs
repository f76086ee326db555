//! Wavelength calibration: dispersion models, least-squares fitting over
//! pixel/wavelength correspondences, the linear FITS WCS header form, and
//! the helpers around them (resampling, emission-line detection).
//!
//! Headers only ever carry the linear form. Non-linear models live in
//! memory and reach storage by linearizing the spectrum first; headers
//! describing non-linear solutions (IRAF multispec and friends) are
//! recognized on read and refused rather than misread.

mod fit;
mod lines;
mod model;
mod resample;
mod wcs;

pub use fit::WavelengthSolution;
pub use lines::{detect_lines, read_line_list, LineDetection};
pub use model::{DispersionModel, ModelKind};
pub use resample::linearize;
pub use wcs::{read_solution, write_linear};
