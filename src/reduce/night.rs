use crate::config::ReductionConfig;
use crate::error::Result;
use crate::frame::{Frame, Section};

use super::classify::classify;
use super::masters::{create_master_bias, create_master_flat, divide_flat, subtract_bias};
use super::overscan::{subtract_overscan, trim};

/// Run the full CCD reduction over a night of frames: classify, correct
/// overscan, trim, build and apply the master bias, then per instrument
/// setup build the master flat and correct objects and comparison lamps.
///
/// The returned frames are the masters followed by the reduced objects and
/// comps (which keep their original `OBSTYPE`). Individual biases and flats
/// are consumed into their masters. Frames with an unknown `OBSTYPE` are
/// skipped.
pub fn reduce_night(frames: &[Frame], config: &ReductionConfig) -> Result<Vec<Frame>> {
    let night = classify(frames);
    log::info!("night contents:\n{night}");

    let overscan_override = parse_override(config.overscan_section.as_deref())?;
    let trim_override = parse_override(config.trim_section.as_deref())?;
    let method = config.combine_method();

    let prepare = |frame: &Frame| -> Result<Frame> {
        prepare_frame(
            frame,
            config,
            overscan_override.as_ref(),
            trim_override.as_ref(),
        )
    };

    let mut outputs = Vec::new();

    let master_bias = if night.biases.is_empty() {
        log::warn!("no bias frames in the night, bias subtraction skipped");
        None
    } else {
        let biases: Vec<Frame> = night
            .biases
            .iter()
            .map(|&i| prepare(&frames[i]))
            .collect::<Result<_>>()?;
        Some(create_master_bias(&biases, method)?)
    };
    if let Some(ref master) = master_bias {
        outputs.push(master.clone());
    }

    for (setup, group) in &night.groups {
        let master_flat = if group.flats.is_empty() {
            if !group.objects.is_empty() || !group.comps.is_empty() {
                log::warn!("{setup}: no flats, flat correction skipped");
            }
            None
        } else {
            let mut flats = Vec::with_capacity(group.flats.len());
            for &i in &group.flats {
                let mut flat = prepare(&frames[i])?;
                if let Some(ref master) = master_bias {
                    flat = subtract_bias(&flat, master)?;
                }
                flats.push(flat);
            }
            let mut master = create_master_flat(&flats, method, config.normalize)?;
            master
                .header
                .set("FILENAME", format!("master_flat_{}", setup.slug()));
            Some(master)
        };
        if let Some(ref master) = master_flat {
            outputs.push(master.clone());
        }

        for &i in group.objects.iter().chain(&group.comps) {
            let mut frame = prepare(&frames[i])?;
            if let Some(ref master) = master_bias {
                frame = subtract_bias(&frame, master)?;
            }
            if let Some(ref master) = master_flat {
                frame = divide_flat(&frame, master, config.min_flat_ratio)?;
            }
            outputs.push(frame);
        }
    }

    Ok(outputs)
}

fn parse_override(section: Option<&str>) -> Result<Option<Section>> {
    section.map(Section::parse).transpose()
}

/// Per-frame preparation: count saturated pixels, subtract the overscan,
/// trim. Corrections already recorded in the header are not applied again.
fn prepare_frame(
    frame: &Frame,
    config: &ReductionConfig,
    overscan_override: Option<&Section>,
    trim_override: Option<&Section>,
) -> Result<Frame> {
    let saturated = frame
        .data
        .iter()
        .filter(|&&v| v >= config.saturation)
        .count();
    if saturated > 0 {
        log::warn!("{}: {saturated} saturated pixels", frame.id());
    }

    let mut current = frame.clone();
    current
        .header
        .set_with_comment("SATPIX", saturated, "pixels at or above saturation level");

    if config.apply_overscan && !current.header.contains("OVERSCAN") {
        let section = match overscan_override {
            Some(s) => Some(*s),
            None => current
                .header
                .get_str("BIASSEC")
                .map(Section::parse)
                .transpose()?,
        };
        match section {
            Some(section) => current = subtract_overscan(&current, &section)?,
            None => log::warn!("{}: no overscan section, correction skipped", current.id()),
        }
    }

    if config.apply_trim && !current.header.contains("TRIMMED") {
        if trim_override.is_some() || current.header.contains("TRIMSEC") {
            current = trim(&current, trim_override)?;
        } else {
            log::warn!("{}: no trim section, trim skipped", current.id());
        }
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;
    use ndarray::Array2;

    const BIAS_LEVEL: f64 = 100.0;

    /// 4 rows x 6 cols; columns 1..4 are science at `signal` + bias,
    /// columns 5..6 are the overscan strip at the bias level.
    fn raw(obstype: &str, name: &str, signal: f64) -> Frame {
        let mut data = Array2::from_elem((4, 6), BIAS_LEVEL);
        for y in 0..4 {
            for x in 0..4 {
                data[(y, x)] = signal + BIAS_LEVEL;
            }
        }
        let mut h = Header::new();
        h.set("OBSTYPE", obstype);
        h.set("GRATING", "400");
        h.set("WAVMODE", "M1");
        h.set("BIASSEC", "[5:6,1:4]");
        h.set("TRIMSEC", "[1:4,1:4]");
        h.set("FILENAME", name);
        Frame::new(data, h)
    }

    fn night() -> Vec<Frame> {
        vec![
            raw("BIAS", "b1", 0.0),
            raw("BIAS", "b2", 0.0),
            raw("FLAT", "f1", 1000.0),
            raw("FLAT", "f2", 1000.0),
            raw("OBJECT", "obj", 500.0),
            raw("COMP", "lamp", 300.0),
        ]
    }

    #[test]
    fn full_flow_reduces_objects_and_comps() {
        let outputs = reduce_night(&night(), &ReductionConfig::default()).unwrap();
        assert_eq!(outputs.len(), 4);

        let mbias = &outputs[0];
        assert_eq!(mbias.header.get_str("OBSTYPE"), Some("MBIAS"));
        assert_eq!(mbias.shape(), (4, 4));
        assert_eq!(mbias.data[(0, 0)], 0.0);

        let mflat = &outputs[1];
        assert_eq!(mflat.header.get_str("OBSTYPE"), Some("MFLAT"));
        assert_eq!(mflat.id(), "master_flat_400_M1_NONE");
        assert_eq!(mflat.header.get_float("FLATNORM"), Some(1000.0));
        assert!((mflat.data[(2, 2)] - 1.0).abs() < 1e-12);

        let object = &outputs[2];
        assert_eq!(object.header.get_str("OBSTYPE"), Some("OBJECT"));
        assert_eq!(object.shape(), (4, 4));
        assert!((object.data[(1, 1)] - 500.0).abs() < 1e-9);
        assert_eq!(object.header.get_str("BIASSUB"), Some("master_bias"));
        assert_eq!(
            object.header.get_str("FLATCOR"),
            Some("master_flat_400_M1_NONE")
        );
        assert_eq!(object.header.get_str("OVERSCAN"), Some("[5:6,1:4]"));
        assert_eq!(object.header.get("TRIMMED"), Some(&true.into()));
        assert_eq!(object.header.get_int("SATPIX"), Some(0));

        let comp = &outputs[3];
        assert_eq!(comp.header.get_str("OBSTYPE"), Some("COMP"));
        assert!((comp.data[(3, 3)] - 300.0).abs() < 1e-9);
    }

    #[test]
    fn missing_biases_and_flats_are_skipped_not_fatal() {
        let frames = vec![raw("OBJECT", "obj", 500.0)];
        let outputs = reduce_night(&frames, &ReductionConfig::default()).unwrap();

        assert_eq!(outputs.len(), 1);
        let object = &outputs[0];
        assert!((object.data[(0, 0)] - 500.0).abs() < 1e-9);
        assert!(!object.header.contains("BIASSUB"));
        assert!(!object.header.contains("FLATCOR"));
        // overscan and trim still ran
        assert!(object.header.contains("OVERSCAN"));
        assert_eq!(object.shape(), (4, 4));
    }

    #[test]
    fn saturated_pixels_are_counted_not_masked() {
        let mut config = ReductionConfig::default();
        config.saturation = 1000.0;

        let frames = vec![raw("OBJECT", "obj", 1500.0)];
        let outputs = reduce_night(&frames, &config).unwrap();

        let object = &outputs[0];
        assert_eq!(object.header.get_int("SATPIX"), Some(16));
        // values stay as reduced, no masking
        assert!((object.data[(0, 0)] - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn config_sections_override_headers() {
        let mut config = ReductionConfig::default();
        config.trim_section = Some("[1:2,1:4]".to_string());

        let frames = vec![raw("OBJECT", "obj", 500.0)];
        let outputs = reduce_night(&frames, &config).unwrap();
        assert_eq!(outputs[0].shape(), (4, 2));
    }

    #[test]
    fn disabled_steps_leave_the_frame_alone() {
        let mut config = ReductionConfig::default();
        config.apply_overscan = false;
        config.apply_trim = false;

        let frames = vec![raw("OBJECT", "obj", 500.0)];
        let outputs = reduce_night(&frames, &config).unwrap();

        let object = &outputs[0];
        assert_eq!(object.shape(), (4, 6));
        assert!(!object.header.contains("OVERSCAN"));
        // raw counts survive untouched
        assert!((object.data[(0, 0)] - 600.0).abs() < 1e-12);
    }
}
