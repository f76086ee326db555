//! Pipeline configuration, TOML-backed. Every field has a default so an
//! empty file, a partial file, and no file at all are all usable; CLI flags
//! override file values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reduce::{CombineMethod, Normalize};
use crate::wavelength::ModelKind;

// ---------------------------------------------------------------------------
// ReductionConfig
// ---------------------------------------------------------------------------

/// Combination strategy as named in configuration files. Sigma-clip
/// parameters live in their own keys, so this stays a plain selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineKind {
    Median,
    Mean,
    SigmaClip,
}

/// Settings for the CCD reduction flow (`redccd`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReductionConfig {
    pub combine: CombineKind,
    pub sigma_clip: f64,
    pub clip_iterations: u32,
    pub apply_overscan: bool,
    pub apply_trim: bool,
    /// Overrides for headers lacking BIASSEC/TRIMSEC, FITS section notation.
    pub overscan_section: Option<String>,
    pub trim_section: Option<String>,
    pub normalize: Normalize,
    pub min_flat_ratio: f64,
    pub saturation: f64,
    pub output_prefix: String,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        ReductionConfig {
            combine: CombineKind::Median,
            sigma_clip: 3.0,
            clip_iterations: 3,
            apply_overscan: true,
            apply_trim: true,
            overscan_section: None,
            trim_section: None,
            normalize: Normalize::Median,
            min_flat_ratio: 1e-3,
            saturation: 65535.0,
            output_prefix: "red_".to_string(),
        }
    }
}

impl ReductionConfig {
    /// The combination method with sigma-clip parameters filled in.
    pub fn combine_method(&self) -> CombineMethod {
        match self.combine {
            CombineKind::Median => CombineMethod::Median,
            CombineKind::Mean => CombineMethod::Mean,
            CombineKind::SigmaClip => CombineMethod::SigmaClip {
                sigma: self.sigma_clip,
                iterations: self.clip_iterations,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// SpectralConfig
// ---------------------------------------------------------------------------

/// Settings for extraction and wavelength calibration (`redspec`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpectralConfig {
    pub model: ModelKind,
    pub degree: usize,
    pub aperture_half_width: usize,
    pub background: bool,
    pub background_offset: usize,
    pub detect_threshold_sigma: f64,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        SpectralConfig {
            model: ModelKind::Chebyshev,
            degree: 3,
            aperture_half_width: 5,
            background: true,
            background_offset: 10,
            detect_threshold_sigma: 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Top-level configuration: `[reduction]` and `[spectral]` tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub reduction: ReductionConfig,
    pub spectral: SpectralConfig,
}

impl Config {
    /// Read and validate a TOML configuration file. IO and parse failures
    /// are wrapped with the path.
    pub fn from_file(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        Config::from_toml(&text).map_err(|e| Error::config(format!("{}: {e}", path.display())))
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// A file when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(p) => Config::from_file(p),
            None => Ok(Config::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.reduction.sigma_clip <= 0.0 {
            return Err(Error::config(format!(
                "sigma_clip must be positive, got {}",
                self.reduction.sigma_clip
            )));
        }
        if self.reduction.min_flat_ratio <= 0.0 {
            return Err(Error::config(format!(
                "min_flat_ratio must be positive, got {}",
                self.reduction.min_flat_ratio
            )));
        }
        if self.spectral.degree < 1 || self.spectral.degree > 16 {
            return Err(Error::config(format!(
                "degree must be between 1 and 16, got {}",
                self.spectral.degree
            )));
        }
        if self.spectral.detect_threshold_sigma <= 0.0 {
            return Err(Error::config(format!(
                "detect_threshold_sigma must be positive, got {}",
                self.spectral.detect_threshold_sigma
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.reduction.combine_method(), CombineMethod::Median);
        assert_eq!(config.reduction.output_prefix, "red_");
        assert_eq!(config.spectral.degree, 3);
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let config = Config::from_toml(
            r#"
            [reduction]
            combine = "sigma_clip"
            sigma_clip = 2.5
            trim_section = "[1:380,1:100]"

            [spectral]
            degree = 5
            "#,
        )
        .unwrap();

        assert_eq!(
            config.reduction.combine_method(),
            CombineMethod::SigmaClip {
                sigma: 2.5,
                iterations: 3,
            }
        );
        assert_eq!(config.reduction.trim_section.as_deref(), Some("[1:380,1:100]"));
        // untouched keys keep their defaults
        assert!(config.reduction.apply_overscan);
        assert_eq!(config.spectral.degree, 5);
        assert_eq!(config.spectral.aperture_half_width, 5);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml("[reduction]\ncombin = \"median\"\n").is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            Config::from_toml("[spectral]\ndegree = 0\n"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            Config::from_toml("[spectral]\ndegree = 17\n"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            Config::from_toml("[reduction]\nsigma_clip = -1.0\n"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn from_file_names_the_path_on_failure() {
        let err = Config::from_file(Path::new("/no/such/config.toml")).unwrap_err();
        assert!(err.to_string().contains("/no/such/config.toml"));
    }
}
