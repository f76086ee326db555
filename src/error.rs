use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Library error type
// ---------------------------------------------------------------------------

/// Errors produced by the reduction and calibration library.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A required header keyword is absent.
    #[error("missing header keyword: {keyword}")]
    MissingKeyword { keyword: String },

    /// A header keyword exists but cannot be read as the requested type.
    #[error("header keyword {keyword} is not {expected}")]
    WrongType {
        keyword: String,
        expected: &'static str,
    },

    /// A FITS section string could not be parsed.
    #[error("invalid section '{section}': {reason}")]
    InvalidSection { section: String, reason: String },

    /// A section extends beyond the frame it was applied to.
    #[error("section '{section}' exceeds frame bounds ({ncols} x {nrows})")]
    SectionOutOfBounds {
        section: String,
        ncols: usize,
        nrows: usize,
    },

    /// Frames of different dimensions were mixed in one operation.
    #[error("frame shape mismatch: expected {expected_rows}x{expected_cols}, got {got_rows}x{got_cols}")]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        got_rows: usize,
        got_cols: usize,
    },

    /// An operation received no input where at least one item is required.
    #[error("empty input: {what}")]
    EmptyInput { what: String },

    /// Too few pixel/wavelength correspondences for the requested model.
    #[error("insufficient correspondences: the fit needs {needed}, got {got}")]
    InsufficientLines { needed: usize, got: usize },

    /// Pixel and wavelength correspondence lists differ in length.
    #[error("correspondence lists differ: {pixels} pixels vs {wavelengths} wavelengths")]
    LengthMismatch { pixels: usize, wavelengths: usize },

    /// Master-flat normalization produced an unusable divisor.
    #[error("flat normalization divisor {divisor} must be finite and positive")]
    FlatNormalization { divisor: f64 },

    /// Non-finite values where finite numbers are required.
    #[error("non-finite values in {what}")]
    NonFinite { what: String },

    /// The wavelength axis must be strictly monotonic for resampling.
    #[error("wavelength axis is not strictly monotonic")]
    NonMonotonic,

    /// A header carries WCS keywords that do not form a usable solution.
    #[error("invalid wavelength WCS: {message}")]
    InvalidWcs { message: String },

    /// Behavior the toolkit deliberately does not provide.
    #[error("not implemented: {feature}")]
    NotImplemented { feature: String },

    /// A file extension no loader or writer understands.
    #[error("unsupported file extension: .{extension}")]
    UnsupportedFormat { extension: String },

    /// A frame or spectrum container is structurally broken.
    #[error("container error: {message}")]
    Container { message: String },

    /// The lamp catalog markdown could not be interpreted.
    #[error("lamp catalog error: {message}")]
    Catalog { message: String },

    /// A setup request file could not be interpreted.
    #[error("request error: {message}")]
    Request { message: String },

    /// Configuration file or value problems.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The pipeline could not locate a spectral target on a frame.
    #[error("no target found: {message}")]
    NoTarget { message: String },

    /// File or directory not found where the pipeline expected input.
    #[error("no input at {path}")]
    NoInput { path: PathBuf },

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV (de)serialization failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet read/write failure.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow array construction failure.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// TOML configuration parse failure.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Timestamp or date parse failure.
    #[error("date parse error: {0}")]
    Date(#[from] chrono::ParseError),
}

/// Convenience `Result` alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Missing-keyword error for `keyword`.
    pub fn missing_keyword<S: Into<String>>(keyword: S) -> Self {
        Error::MissingKeyword {
            keyword: keyword.into(),
        }
    }

    /// Deliberately unsupported behavior (`feature` names what was asked for).
    pub fn not_implemented<S: Into<String>>(feature: S) -> Self {
        Error::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Structural problem in a frame/spectrum container.
    pub fn container<S: Into<String>>(message: S) -> Self {
        Error::Container {
            message: message.into(),
        }
    }

    /// Lamp catalog parse problem.
    pub fn catalog<S: Into<String>>(message: S) -> Self {
        Error::Catalog {
            message: message.into(),
        }
    }

    /// Setup request parse problem.
    pub fn request<S: Into<String>>(message: S) -> Self {
        Error::Request {
            message: message.into(),
        }
    }

    /// Configuration problem.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = Error::missing_keyword("CRVAL1");
        assert_eq!(err.to_string(), "missing header keyword: CRVAL1");

        let err = Error::not_implemented("non-linear wavelength solution");
        assert_eq!(
            err.to_string(),
            "not implemented: non-linear wavelength solution"
        );

        let err = Error::InsufficientLines { needed: 4, got: 2 };
        assert_eq!(
            err.to_string(),
            "insufficient correspondences: the fit needs 4, got 2"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
