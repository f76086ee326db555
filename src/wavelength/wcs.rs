use crate::error::{Error, Result};
use crate::header::Header;

use super::model::DispersionModel;

// ---------------------------------------------------------------------------
// Header WCS, dispersion axis only
// ---------------------------------------------------------------------------

/// Read the wavelength solution a header carries.
///
/// Only the linear form is supported: `CRVAL1` plus one of `CDELT1`/`CD1_1`,
/// with `CRPIX1` defaulting to 1.0. Headers describing a non-linear solution
/// (IRAF multispec `CTYPE1`, a `WAT2_*` multispec description, a log-linear
/// `DC-FLAG`, or SIP coefficients) are recognized and refused with
/// [`Error::NotImplemented`] so callers never misread them as linear.
pub fn read_solution(header: &Header) -> Result<DispersionModel> {
    if let Some(marker) = nonlinear_marker(header) {
        return Err(Error::not_implemented(format!(
            "reading a non-linear wavelength solution ({marker})"
        )));
    }

    let crval = header.require_float("CRVAL1")?;
    let cdelt = match header.get_float("CDELT1").or_else(|| header.get_float("CD1_1")) {
        Some(v) => v,
        None => return Err(Error::missing_keyword("CDELT1")),
    };
    if cdelt == 0.0 {
        return Err(Error::InvalidWcs {
            message: "CDELT1 is zero".to_string(),
        });
    }
    let crpix = header.get_float("CRPIX1").unwrap_or(1.0);

    Ok(DispersionModel::Linear {
        crval,
        cdelt,
        crpix,
    })
}

/// What makes a header non-linear, if anything.
fn nonlinear_marker(header: &Header) -> Option<String> {
    if let Some(ctype) = header.get_str("CTYPE1") {
        if ctype.trim().to_ascii_uppercase().starts_with("MULTISPE") {
            return Some(format!("CTYPE1 = {ctype}"));
        }
    }
    for card in header.cards() {
        if card.keyword.starts_with("WAT2_") {
            if let Some(text) = card.value.as_str() {
                if text.contains("spec1") {
                    return Some(format!("{} multispec description", card.keyword));
                }
            }
        }
    }
    if let Some(flag) = header.get_int("DC-FLAG") {
        if flag != 0 {
            return Some(format!("DC-FLAG = {flag}"));
        }
    }
    if header.contains("A_ORDER") {
        return Some("A_ORDER distortion coefficients".to_string());
    }
    None
}

/// Write a linear solution into a header: `CTYPE1 = LINEAR`, the reference
/// keywords, `CUNIT1 = angstrom`, `DC-FLAG = 0`, plus a HISTORY entry.
///
/// Non-linear models are never written; linearize the spectrum first.
pub fn write_linear(header: &mut Header, model: &DispersionModel) -> Result<()> {
    let DispersionModel::Linear {
        crval,
        cdelt,
        crpix,
    } = model
    else {
        return Err(Error::not_implemented(
            "writing a non-linear wavelength solution",
        ));
    };

    header.set_with_comment("CTYPE1", "LINEAR", "dispersion axis type");
    header.set_with_comment("CRVAL1", *crval, "wavelength at the reference pixel");
    header.set_with_comment("CDELT1", *cdelt, "wavelength step per pixel");
    header.set_with_comment("CRPIX1", *crpix, "reference pixel (1-based)");
    header.set_with_comment("CUNIT1", "angstrom", "wavelength unit");
    header.set_with_comment("DC-FLAG", 0i64, "linear dispersion");
    header.add_history(format!(
        "wavelength solution: linear, crval {crval:.4}, cdelt {cdelt:.6}"
    ));
    Ok(())
}
