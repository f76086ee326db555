use std::collections::BTreeMap;
use std::fmt;

use crate::frame::Frame;
use crate::header::Header;

// ---------------------------------------------------------------------------
// ObsType – frame classification from the OBSTYPE keyword
// ---------------------------------------------------------------------------

/// Frame kinds the reduction flow distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ObsType {
    Bias,
    Flat,
    Object,
    Comp,
}

impl ObsType {
    /// Parse an `OBSTYPE` keyword value, case-insensitively. `ZERO` counts
    /// as bias, `LAMPFLAT` as flat, and `ARC` as comparison lamp; anything
    /// else is unknown.
    pub fn from_keyword(text: &str) -> Option<ObsType> {
        match text.trim().to_ascii_uppercase().as_str() {
            "BIAS" | "ZERO" => Some(ObsType::Bias),
            "FLAT" | "LAMPFLAT" => Some(ObsType::Flat),
            "OBJECT" => Some(ObsType::Object),
            "COMP" | "ARC" => Some(ObsType::Comp),
            _ => None,
        }
    }

    /// The canonical keyword value.
    pub fn keyword(&self) -> &'static str {
        match self {
            ObsType::Bias => "BIAS",
            ObsType::Flat => "FLAT",
            ObsType::Object => "OBJECT",
            ObsType::Comp => "COMP",
        }
    }
}

impl fmt::Display for ObsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

// ---------------------------------------------------------------------------
// InstrumentSetup – grouping key for flats/objects/comps
// ---------------------------------------------------------------------------

/// The instrument configuration a frame was taken with. Frames are only
/// flat-corrected against masters of the same setup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrumentSetup {
    pub grating: String,
    pub mode: String,
    pub filter: String,
}

impl InstrumentSetup {
    /// Read `GRATING`/`WAVMODE`/`FILTER` from a header. Missing or empty
    /// keywords default to `NONE`; values are trimmed and uppercased so
    /// inconsistent observer input still groups together.
    pub fn from_header(header: &Header) -> InstrumentSetup {
        let read = |keyword: &str| {
            header
                .get(keyword)
                .map(|v| v.to_string().trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "NONE".to_string())
        };
        InstrumentSetup {
            grating: read("GRATING"),
            mode: read("WAVMODE"),
            filter: read("FILTER"),
        }
    }

    /// A filesystem-friendly form, used to name per-setup master flats.
    pub fn slug(&self) -> String {
        format!("{}_{}_{}", self.grating, self.mode, self.filter).replace([' ', '/'], "-")
    }
}

impl fmt::Display for InstrumentSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.grating, self.mode, self.filter)
    }
}

// ---------------------------------------------------------------------------
// NightLog – classification result
// ---------------------------------------------------------------------------

/// Frame indices of one setup, into the slice given to [`classify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupGroup {
    pub flats: Vec<usize>,
    pub objects: Vec<usize>,
    pub comps: Vec<usize>,
}

/// What a night of frames contains: biases (setup-independent) plus
/// flats/objects/comps grouped per instrument setup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightLog {
    pub biases: Vec<usize>,
    pub groups: BTreeMap<InstrumentSetup, SetupGroup>,
    pub unknown: Vec<usize>,
}

impl NightLog {
    /// Frames that were classified (unknown obstypes excluded).
    pub fn classified(&self) -> usize {
        self.biases.len()
            + self
                .groups
                .values()
                .map(|g| g.flats.len() + g.objects.len() + g.comps.len())
                .sum::<usize>()
    }
}

impl fmt::Display for NightLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "biases: {}", self.biases.len())?;
        for (setup, group) in &self.groups {
            writeln!(
                f,
                "{setup}: {} flats, {} objects, {} comps",
                group.flats.len(),
                group.objects.len(),
                group.comps.len()
            )?;
        }
        if !self.unknown.is_empty() {
            writeln!(f, "unknown obstype: {} frames", self.unknown.len())?;
        }
        Ok(())
    }
}

/// Sort a night of frames by obstype and instrument setup.
///
/// Frames without a recognizable `OBSTYPE` are reported and collected under
/// `unknown`; the reduction flow skips them.
pub fn classify(frames: &[Frame]) -> NightLog {
    let mut log = NightLog::default();

    for (i, frame) in frames.iter().enumerate() {
        let obstype = frame
            .header
            .get("OBSTYPE")
            .map(|v| v.to_string())
            .unwrap_or_default();

        let Some(obstype) = ObsType::from_keyword(&obstype) else {
            log::warn!(
                "{}: unrecognized OBSTYPE '{obstype}', frame skipped",
                frame.id()
            );
            log.unknown.push(i);
            continue;
        };

        if obstype == ObsType::Bias {
            log.biases.push(i);
            continue;
        }

        let setup = InstrumentSetup::from_header(&frame.header);
        let group = log.groups.entry(setup).or_default();
        match obstype {
            ObsType::Flat => group.flats.push(i),
            ObsType::Object => group.objects.push(i),
            ObsType::Comp => group.comps.push(i),
            ObsType::Bias => unreachable!(),
        }
    }

    log
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn frame_with(obstype: &str, grating: &str) -> Frame {
        let mut h = Header::new();
        h.set("OBSTYPE", obstype);
        h.set("GRATING", grating);
        h.set("WAVMODE", "M1");
        Frame::new(Array2::zeros((2, 2)), h)
    }

    #[test]
    fn obstype_aliases() {
        assert_eq!(ObsType::from_keyword("bias"), Some(ObsType::Bias));
        assert_eq!(ObsType::from_keyword("ZERO"), Some(ObsType::Bias));
        assert_eq!(ObsType::from_keyword(" arc "), Some(ObsType::Comp));
        assert_eq!(ObsType::from_keyword("LAMPFLAT"), Some(ObsType::Flat));
        assert_eq!(ObsType::from_keyword("DARK"), None);
    }

    #[test]
    fn setup_defaults_and_normalization() {
        let mut h = Header::new();
        h.set("GRATING", " 400 ");
        h.set("WAVMODE", "m1");
        let setup = InstrumentSetup::from_header(&h);
        assert_eq!(setup.grating, "400");
        assert_eq!(setup.mode, "M1");
        assert_eq!(setup.filter, "NONE");
        assert_eq!(setup.to_string(), "400/M1/NONE");
        assert_eq!(setup.slug(), "400_M1_NONE");
    }

    #[test]
    fn integer_grating_keyword_reads_as_text() {
        let mut h = Header::new();
        h.set("GRATING", 400usize);
        assert_eq!(InstrumentSetup::from_header(&h).grating, "400");
    }

    #[test]
    fn classify_groups_by_setup() {
        let frames = vec![
            frame_with("BIAS", "400"),
            frame_with("FLAT", "400"),
            frame_with("FLAT", "600"),
            frame_with("OBJECT", "400"),
            frame_with("ARC", "400"),
            frame_with("FOCUS", "400"),
        ];

        let log = classify(&frames);
        assert_eq!(log.biases, vec![0]);
        assert_eq!(log.unknown, vec![5]);
        assert_eq!(log.groups.len(), 2);
        assert_eq!(log.classified(), 5);

        let g400 = &log.groups[&InstrumentSetup {
            grating: "400".into(),
            mode: "M1".into(),
            filter: "NONE".into(),
        }];
        assert_eq!(g400.flats, vec![1]);
        assert_eq!(g400.objects, vec![3]);
        assert_eq!(g400.comps, vec![4]);
    }
}
