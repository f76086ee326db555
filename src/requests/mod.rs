//! Instrument setup-request scanning.
//!
//! Every observing night has a directory named after its date holding the
//! setup files observers submitted, newest revision last. A setup file is a
//! plain-text `KEYWORD: value` listing; the fields of interest here are
//! SUBMIT (revision timestamp), SEMESTER, STARTDATE and the free-form
//! GRATINGS line. Scanning a tree of such directories yields one record per
//! requested grating, which feeds the per-semester demand tally.

mod normalize;

pub use normalize::normalize_gratings;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Line densities a request may legitimately name. 300 l/mm appears in old
/// requests even though it was never offered, so it stays parseable.
pub const ACCEPTED_GRATINGS: [u16; 8] = [300, 400, 600, 930, 1200, 1800, 2100, 2400];

/// Line densities on the tally axis. Every grating actually offered.
pub const OFFERED_GRATINGS: [u16; 7] = [400, 600, 930, 1200, 1800, 2100, 2400];

const SUBMIT_FORMAT: &str = "%Y-%m-%d.%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Request files
// ---------------------------------------------------------------------------

/// The fields read out of one setup file.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFile {
    /// When this revision was submitted.
    pub submitted: NaiveDateTime,
    /// Semester label, e.g. `2019A`. Empty when the file omits it.
    pub semester: String,
    /// First night of the run.
    pub start_date: NaiveDate,
    /// The GRATINGS value verbatim, before normalization.
    pub gratings_raw: String,
}

impl RequestFile {
    /// One record per grating the request names.
    pub fn records(&self) -> Vec<RequestRecord> {
        normalize_gratings(&self.gratings_raw)
            .into_iter()
            .map(|grating| RequestRecord {
                date: self.start_date,
                grating,
                semester: self.semester.clone(),
            })
            .collect()
    }
}

/// One requested grating on one night.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub date: NaiveDate,
    pub grating: u16,
    pub semester: String,
}

/// Reads the SUBMIT/SEMESTER/STARTDATE/GRATINGS fields of one setup file.
///
/// The first STARTDATE wins; observers occasionally paste the block twice and
/// only the leading one is authoritative. A file without SUBMIT or STARTDATE
/// cannot be placed in time and is an error.
pub fn parse_request(path: &Path) -> Result<RequestFile> {
    let text = fs::read_to_string(path)?;

    let mut submitted: Option<NaiveDateTime> = None;
    let mut semester: Option<String> = None;
    let mut start_date: Option<NaiveDate> = None;
    let mut gratings_raw: Option<String> = None;

    for line in text.lines() {
        let Some((keyword, value)) = line.split_once(':') else {
            continue;
        };
        match keyword.trim() {
            "SUBMIT" if submitted.is_none() => {
                let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
                submitted = Some(NaiveDateTime::parse_from_str(&compact, SUBMIT_FORMAT)?);
            }
            "SEMESTER" if semester.is_none() => {
                semester = Some(value.split_whitespace().collect());
            }
            "STARTDATE" if start_date.is_none() => {
                let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
                start_date = Some(NaiveDate::parse_from_str(&compact, DATE_FORMAT)?);
            }
            "GRATINGS" if gratings_raw.is_none() => {
                gratings_raw = Some(value.trim().to_string());
            }
            _ => {}
        }
    }

    let submitted = submitted
        .ok_or_else(|| Error::request(format!("no SUBMIT timestamp in {}", path.display())))?;
    let start_date = start_date
        .ok_or_else(|| Error::request(format!("no STARTDATE in {}", path.display())))?;

    Ok(RequestFile {
        submitted,
        semester: semester.unwrap_or_default(),
        start_date,
        gratings_raw: gratings_raw.unwrap_or_default(),
    })
}

/// Picks the file with the newest SUBMIT timestamp in a night directory.
/// Files that fail to parse are skipped with a warning; ties keep the
/// name-sorted first.
pub fn select_latest(dir: &Path) -> Result<PathBuf> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut best: Option<(NaiveDateTime, PathBuf)> = None;
    for path in paths {
        let request = match parse_request(&path) {
            Ok(request) => request,
            Err(err) => {
                log::warn!("ignoring {}: {}", path.display(), err);
                continue;
            }
        };
        match &best {
            Some((when, _)) if *when >= request.submitted => {}
            _ => best = Some((request.submitted, path)),
        }
    }

    best.map(|(_, path)| path)
        .ok_or_else(|| Error::request(format!("no usable request file in {}", dir.display())))
}

fn night_dir_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("hardcoded pattern"))
}

/// Walks a tree of night directories (named `YYYY-MM-DD`, optionally
/// suffixed) and collects the grating records of each night's latest
/// request. Nights that cannot be read are skipped with a warning, so one
/// malformed submission does not sink a multi-year scan.
pub fn scan_requests(root: &Path) -> Result<Vec<RequestRecord>> {
    if !root.is_dir() {
        return Err(Error::NoInput {
            path: root.to_path_buf(),
        });
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| night_dir_name().is_match(n))
        })
        .collect();
    dirs.sort();

    let mut records = Vec::new();
    for dir in &dirs {
        let request = match select_latest(dir).and_then(|path| parse_request(&path)) {
            Ok(request) => request,
            Err(err) => {
                log::warn!("skipping {}: {}", dir.display(), err);
                continue;
            }
        };
        let night = request.records();
        log::debug!(
            "{}: {} grating record(s) from '{}'",
            dir.display(),
            night.len(),
            request.gratings_raw
        );
        records.extend(night);
    }

    log::info!(
        "scanned {} night director{} into {} record(s)",
        dirs.len(),
        if dirs.len() == 1 { "y" } else { "ies" },
        records.len()
    );
    Ok(records)
}

// ---------------------------------------------------------------------------
// Tallying
// ---------------------------------------------------------------------------

/// Demand per offered grating.
#[derive(Debug, Clone, PartialEq)]
pub struct GratingTally {
    counts: BTreeMap<u16, usize>,
    total: usize,
}

impl GratingTally {
    pub fn count(&self, grating: u16) -> usize {
        self.counts.get(&grating).copied().unwrap_or(0)
    }

    /// `(grating, count)` pairs over the offered gratings, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (u16, usize)> + '_ {
        self.counts.iter().map(|(&grating, &count)| (grating, count))
    }

    /// Every record tallied, off-axis ones included.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Records whose grating is not on the axis (the historical 300 l/mm).
    pub fn off_axis(&self) -> usize {
        self.total - self.counts.values().sum::<usize>()
    }
}

/// Counts records per offered grating. Records for gratings outside
/// [`OFFERED_GRATINGS`] (the historical 300 l/mm) get no bar of their own
/// but still count toward the total.
pub fn tally(records: &[RequestRecord]) -> GratingTally {
    let mut counts: BTreeMap<u16, usize> =
        OFFERED_GRATINGS.iter().map(|&grating| (grating, 0)).collect();
    for record in records {
        if let Some(count) = counts.get_mut(&record.grating) {
            *count += 1;
        }
    }
    GratingTally {
        counts,
        total: records.len(),
    }
}

/// Text histogram of a tally, one grating per line.
pub fn render_tally(tally: &GratingTally) -> String {
    const WIDTH: usize = 50;
    let max = tally.iter().map(|(_, count)| count).max().unwrap_or(0);
    let mut out = String::new();
    for (grating, count) in tally.iter() {
        let bar = if max == 0 { 0 } else { count * WIDTH / max };
        let line = format!("{grating:>5} {count:>6} {}", "#".repeat(bar));
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// CSV output
// ---------------------------------------------------------------------------

/// Writes records as `date,grating,semester` rows.
pub fn write_records_csv(path: &Path, records: &[RequestRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads records written by [`write_records_csv`].
pub fn read_records_csv(path: &Path) -> Result<Vec<RequestRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Writes a tally as `grating,count` rows.
pub fn write_tally_csv(path: &Path, tally: &GratingTally) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["grating", "count"])?;
    for (grating, count) in tally.iter() {
        writer.write_record([grating.to_string(), count.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_request(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    const FULL: &str = "\
TITLE: NGC 300 spectroscopy
SEMESTER: 2019A
SUBMIT: 2019-02-20.14:33:12
STARTDATE: 2019-03-01
STARTDATE: 2019-12-31
GRATINGS: 400 l/mm and 600 l/mm (Blue)
";

    #[test]
    fn parses_a_full_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_request(dir.path(), "setup.txt", FULL);

        let request = parse_request(&path).unwrap();
        assert_eq!(
            request.submitted,
            NaiveDate::from_ymd_opt(2019, 2, 20)
                .unwrap()
                .and_hms_opt(14, 33, 12)
                .unwrap()
        );
        assert_eq!(request.semester, "2019A");
        // the first STARTDATE wins
        assert_eq!(
            request.start_date,
            NaiveDate::from_ymd_opt(2019, 3, 1).unwrap()
        );
        assert_eq!(request.gratings_raw, "400 l/mm and 600 l/mm (Blue)");

        let records = request.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].grating, 400);
        assert_eq!(records[1].grating, 600);
        assert_eq!(records[0].semester, "2019A");
    }

    #[test]
    fn missing_submit_or_startdate_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let no_submit = write_request(
            dir.path(),
            "a.txt",
            "SEMESTER: 2019A\nSTARTDATE: 2019-03-01\nGRATINGS: 400\n",
        );
        let err = parse_request(&no_submit).unwrap_err();
        assert!(err.to_string().contains("SUBMIT"));

        let no_start = write_request(
            dir.path(),
            "b.txt",
            "SUBMIT: 2019-02-20.14:33:12\nGRATINGS: 400\n",
        );
        let err = parse_request(&no_start).unwrap_err();
        assert!(err.to_string().contains("STARTDATE"));
    }

    #[test]
    fn not_applicable_gratings_yield_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_request(
            dir.path(),
            "na.txt",
            "SUBMIT: 2019-02-20.14:33:12\nSTARTDATE: 2019-03-01\nGRATINGS: N/A\n",
        );
        let request = parse_request(&path).unwrap();
        assert!(request.records().is_empty());
    }

    #[test]
    fn latest_submission_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_request(
            dir.path(),
            "first.txt",
            "SUBMIT: 2019-02-18.09:00:00\nSTARTDATE: 2019-03-01\nGRATINGS: 400\n",
        );
        write_request(
            dir.path(),
            "revised.txt",
            "SUBMIT: 2019-02-20.14:33:12\nSTARTDATE: 2019-03-01\nGRATINGS: 600\n",
        );
        write_request(dir.path(), "broken.txt", "no keywords here\n");

        let latest = select_latest(dir.path()).unwrap();
        assert_eq!(latest.file_name().unwrap(), "revised.txt");
    }

    #[test]
    fn empty_night_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(select_latest(dir.path()).is_err());
    }

    #[test]
    fn scan_walks_night_directories() {
        let root = tempfile::tempdir().unwrap();

        let night1 = root.path().join("2019-03-01");
        fs::create_dir(&night1).unwrap();
        write_request(
            &night1,
            "setup.txt",
            "SUBMIT: 2019-02-20.14:33:12\nSTARTDATE: 2019-03-01\nSEMESTER: 2019A\nGRATINGS: 400600\n",
        );

        // two revisions, only the newer counts
        let night2 = root.path().join("2019-03-02_run2");
        fs::create_dir(&night2).unwrap();
        write_request(
            &night2,
            "old.txt",
            "SUBMIT: 2019-02-10.08:00:00\nSTARTDATE: 2019-03-02\nSEMESTER: 2019A\nGRATINGS: 930\n",
        );
        write_request(
            &night2,
            "new.txt",
            "SUBMIT: 2019-02-25.08:00:00\nSTARTDATE: 2019-03-02\nSEMESTER: 2019A\nGRATINGS: 1200\n",
        );

        // ignored: not a date-named directory, an empty night, a stray file
        let other = root.path().join("calibration_plans");
        fs::create_dir(&other).unwrap();
        write_request(
            &other,
            "setup.txt",
            "SUBMIT: 2019-02-01.00:00:00\nSTARTDATE: 2019-03-09\nGRATINGS: 2400\n",
        );
        fs::create_dir(root.path().join("2019-03-05")).unwrap();
        write_request(root.path(), "2019-03-06", "stray file, not a directory\n");

        let records = scan_requests(root.path()).unwrap();
        let gratings: Vec<u16> = records.iter().map(|r| r.grating).collect();
        assert_eq!(gratings, vec![400, 600, 1200]);
        assert!(records.iter().all(|r| r.semester == "2019A"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let gone = root.path().join("nowhere");
        assert!(matches!(
            scan_requests(&gone),
            Err(Error::NoInput { .. })
        ));
    }

    #[test]
    fn tally_counts_offered_gratings_only() {
        let semester = "2019A".to_string();
        let date = NaiveDate::from_ymd_opt(2019, 3, 1).unwrap();
        let records: Vec<RequestRecord> = [400, 600, 400, 300, 1200, 400]
            .into_iter()
            .map(|grating| RequestRecord {
                date,
                grating,
                semester: semester.clone(),
            })
            .collect();

        let tally = tally(&records);
        assert_eq!(tally.count(400), 3);
        assert_eq!(tally.count(600), 1);
        assert_eq!(tally.count(1200), 1);
        assert_eq!(tally.count(2400), 0);
        // 300 l/mm is accepted in records but not on the tally axis
        assert_eq!(tally.count(300), 0);
        assert_eq!(tally.total(), 6);
        assert_eq!(tally.off_axis(), 1);
        assert_eq!(tally.iter().count(), OFFERED_GRATINGS.len());
    }

    #[test]
    fn rendered_tally_scales_bars() {
        let date = NaiveDate::from_ymd_opt(2019, 3, 1).unwrap();
        let records: Vec<RequestRecord> = [400, 400, 600]
            .into_iter()
            .map(|grating| RequestRecord {
                date,
                grating,
                semester: String::new(),
            })
            .collect();

        let text = render_tally(&tally(&records));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), OFFERED_GRATINGS.len());
        assert!(lines[0].contains("400") && lines[0].ends_with(&"#".repeat(50)));
        assert!(lines[1].contains("600") && lines[1].ends_with(&"#".repeat(25)));
    }

    #[test]
    fn records_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        let records = vec![
            RequestRecord {
                date: NaiveDate::from_ymd_opt(2019, 3, 1).unwrap(),
                grating: 400,
                semester: "2019A".to_string(),
            },
            RequestRecord {
                date: NaiveDate::from_ymd_opt(2019, 8, 15).unwrap(),
                grating: 2100,
                semester: "2019B".to_string(),
            },
        ];

        write_records_csv(&path, &records).unwrap();
        let back = read_records_csv(&path).unwrap();
        assert_eq!(back, records);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("date,grating,semester"));
    }

    #[test]
    fn tally_csv_lists_every_offered_grating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.csv");
        write_tally_csv(&path, &tally(&[])).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "grating,count");
        assert_eq!(lines.len(), 1 + OFFERED_GRATINGS.len());
        assert_eq!(lines[1], "400,0");
    }
}
