//! CCD reduction and arc-lamp wavelength calibration for long-slit
//! spectroscopy.
//!
//! The crate covers the nightly workflow of a long-slit spectrograph:
//!
//! - [`reduce`]: overscan, trim, bias and flat corrections driven by frame
//!   headers, taking a night of raw frames to reduced object and
//!   comparison exposures.
//! - [`extract`]: locating the target along the slit and collapsing an
//!   aperture into a 1-D spectrum.
//! - [`wavelength`]: fitting dispersion models to pixel/wavelength
//!   correspondences, resampling onto a linear grid and reading/writing
//!   the linear WCS header form.
//! - [`lamps`]: the bundled comparison-lamp usability catalog.
//! - [`requests`]: scanning observer setup requests and tallying grating
//!   demand.
//!
//! Frames and spectra travel as Parquet or JSON containers (see [`io`])
//! with the full keyword header embedded, so every correction leaves a
//! HISTORY trail.

pub mod config;
pub mod error;
pub mod extract;
pub mod frame;
pub mod header;
pub mod io;
pub mod lamps;
pub mod reduce;
pub mod requests;
pub mod rng;
pub mod simulate;
pub mod spectrum;
pub mod stats;
pub mod wavelength;

pub use config::Config;
pub use error::{Error, Result};
pub use frame::{Frame, Section};
pub use header::{Header, Value};
pub use spectrum::Spectrum;
