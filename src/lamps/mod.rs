//! Which comparison lamp to use for a given grating and wavelength mode.
//!
//! The catalog ships inside the binary: `data/lamps.md` holds one markdown
//! table per grating and is parsed on first use. Ratings use a four-step
//! scale from `rec` down to `no`; a dash or an empty cell means the
//! combination was never characterized and counts as unusable.

mod parse;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Ratings
// ---------------------------------------------------------------------------

/// How well a lamp serves one grating and mode. Ordered so that a better
/// rating compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rating {
    Unusable,
    Poor,
    Usable,
    Recommended,
}

impl Rating {
    /// Vocabulary used by the catalog tables. Unknown text is a parse error
    /// at the call site, not a silent `Unusable`.
    fn from_cell(cell: &str) -> Option<Rating> {
        match cell.trim().to_ascii_lowercase().as_str() {
            "rec" => Some(Rating::Recommended),
            "ok" => Some(Rating::Usable),
            "poor" => Some(Rating::Poor),
            "no" | "-" | "" => Some(Rating::Unusable),
            _ => None,
        }
    }

    /// Short form as written in the tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Recommended => "rec",
            Rating::Usable => "ok",
            Rating::Poor => "poor",
            Rating::Unusable => "no",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One catalog row: a wavelength mode with the rating of every lamp.
#[derive(Debug)]
pub struct ModeRow {
    mode: String,
    range: String,
    ratings: Vec<(String, Rating)>,
}

impl ModeRow {
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Covered wavelength range, verbatim from the table.
    pub fn range(&self) -> &str {
        &self.range
    }

    /// Lamp/rating pairs in table column order.
    pub fn ratings(&self) -> impl Iterator<Item = (&str, Rating)> + '_ {
        self.ratings
            .iter()
            .map(|(lamp, rating)| (lamp.as_str(), *rating))
    }

    fn rating_of(&self, lamp: &str) -> Option<Rating> {
        self.ratings
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(lamp))
            .map(|(_, rating)| *rating)
    }
}

/// Lamp usability per grating and wavelength mode.
///
/// Mode and lamp lookups are case-insensitive; a grating or mode the catalog
/// does not know yields `None` (or an empty list), never an error.
#[derive(Debug)]
pub struct LampCatalog {
    lamps: Vec<String>,
    gratings: BTreeMap<u16, Vec<ModeRow>>,
}

static EMBEDDED: OnceLock<LampCatalog> = OnceLock::new();

impl LampCatalog {
    /// The catalog bundled with the binary, parsed once on first use.
    pub fn embedded() -> &'static LampCatalog {
        EMBEDDED.get_or_init(|| {
            LampCatalog::from_markdown(include_str!("../../data/lamps.md"))
                .expect("bundled lamp catalog is well formed")
        })
    }

    /// Builds a catalog from markdown text. See `data/lamps.md` for the
    /// expected layout.
    pub fn from_markdown(text: &str) -> Result<LampCatalog> {
        let mut lamps: Vec<String> = Vec::new();
        let mut gratings: BTreeMap<u16, Vec<ModeRow>> = BTreeMap::new();

        for table in parse::parse_tables(text)? {
            let header = &table.header;
            if !header[0].eq_ignore_ascii_case("mode")
                || !header[1].to_ascii_lowercase().starts_with("range")
            {
                return Err(Error::catalog(format!(
                    "grating {} table must start with Mode and Range columns, got '{}' and '{}'",
                    table.grating, header[0], header[1]
                )));
            }
            if gratings.contains_key(&table.grating) {
                return Err(Error::catalog(format!(
                    "grating {} has more than one table",
                    table.grating
                )));
            }

            for lamp in &header[2..] {
                if !lamps.iter().any(|known| known.eq_ignore_ascii_case(lamp)) {
                    lamps.push(lamp.clone());
                }
            }

            let mut rows: Vec<ModeRow> = Vec::with_capacity(table.rows.len());
            for row in &table.rows {
                let mode = row[0].clone();
                if mode.is_empty() {
                    return Err(Error::catalog(format!(
                        "grating {} table has a row with an empty mode",
                        table.grating
                    )));
                }
                if rows.iter().any(|r| r.mode.eq_ignore_ascii_case(&mode)) {
                    return Err(Error::catalog(format!(
                        "grating {} lists mode {} twice",
                        table.grating, mode
                    )));
                }
                let mut ratings = Vec::with_capacity(header.len() - 2);
                for (lamp, cell) in header[2..].iter().zip(&row[2..]) {
                    let rating = Rating::from_cell(cell).ok_or_else(|| {
                        Error::catalog(format!(
                            "grating {} mode {}: unrecognized rating '{}' for lamp {}",
                            table.grating, mode, cell, lamp
                        ))
                    })?;
                    ratings.push((lamp.clone(), rating));
                }
                rows.push(ModeRow {
                    mode,
                    range: row[1].clone(),
                    ratings,
                });
            }
            gratings.insert(table.grating, rows);
        }

        Ok(LampCatalog { lamps, gratings })
    }

    /// Line densities with a table, ascending.
    pub fn gratings(&self) -> Vec<u16> {
        self.gratings.keys().copied().collect()
    }

    /// Every lamp named by any table, in first-appearance order.
    pub fn lamps(&self) -> &[String] {
        &self.lamps
    }

    /// Wavelength modes of one grating, in table order.
    pub fn modes(&self, grating: u16) -> Vec<&str> {
        self.gratings
            .get(&grating)
            .map(|rows| rows.iter().map(|row| row.mode.as_str()).collect())
            .unwrap_or_default()
    }

    /// Full table of one grating, or `None` for a grating without one.
    pub fn table(&self, grating: u16) -> Option<&[ModeRow]> {
        self.gratings.get(&grating).map(|rows| rows.as_slice())
    }

    /// Rating of one lamp for one setup.
    pub fn rating(&self, grating: u16, mode: &str, lamp: &str) -> Option<Rating> {
        self.row(grating, mode)?.rating_of(lamp)
    }

    /// Lamps rated `rec` for the given setup, in column order.
    pub fn recommended(&self, grating: u16, mode: &str) -> Vec<&str> {
        self.row(grating, mode)
            .map(|row| {
                row.ratings
                    .iter()
                    .filter(|(_, rating)| *rating == Rating::Recommended)
                    .map(|(lamp, _)| lamp.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The lamp to reach for: the first `rec`, failing that the first `ok`.
    pub fn best_for(&self, grating: u16, mode: &str) -> Option<&str> {
        let row = self.row(grating, mode)?;
        row.ratings
            .iter()
            .find(|(_, rating)| *rating == Rating::Recommended)
            .or_else(|| {
                row.ratings
                    .iter()
                    .find(|(_, rating)| *rating == Rating::Usable)
            })
            .map(|(lamp, _)| lamp.as_str())
    }

    fn row(&self, grating: u16, mode: &str) -> Option<&ModeRow> {
        self.gratings
            .get(&grating)?
            .iter()
            .find(|row| row.mode.eq_ignore_ascii_case(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Lamps

## 400 l/mm

| Mode | Range (A) | HgAr | Ne  |
|------|-----------|------|-----|
| M1   | 3000-7050 | rec  | no  |
| M2   | 5000-9050 | poor | ok  |

## 600 l/mm

| Mode | Range (A) | HgAr | Ne  |
|------|-----------|------|-----|
| Blue | 3500-4960 | ok   | -   |
";

    #[test]
    fn parses_gratings_modes_and_ratings() {
        let catalog = LampCatalog::from_markdown(SAMPLE).unwrap();
        assert_eq!(catalog.gratings(), vec![400, 600]);
        assert_eq!(catalog.modes(400), vec!["M1", "M2"]);
        assert_eq!(catalog.lamps(), ["HgAr", "Ne"]);
        assert_eq!(catalog.rating(400, "M1", "HgAr"), Some(Rating::Recommended));
        assert_eq!(catalog.rating(600, "Blue", "Ne"), Some(Rating::Unusable));
    }

    #[test]
    fn lookups_ignore_case() {
        let catalog = LampCatalog::from_markdown(SAMPLE).unwrap();
        assert_eq!(catalog.rating(400, "m1", "hgar"), Some(Rating::Recommended));
        assert_eq!(catalog.rating(600, "BLUE", "ne"), Some(Rating::Unusable));
    }

    #[test]
    fn unknown_lookups_return_none() {
        let catalog = LampCatalog::from_markdown(SAMPLE).unwrap();
        assert!(catalog.modes(930).is_empty());
        assert!(catalog.table(930).is_none());
        assert_eq!(catalog.rating(400, "M9", "HgAr"), None);
        assert_eq!(catalog.rating(400, "M1", "ThAr"), None);
        assert_eq!(catalog.best_for(930, "M1"), None);
    }

    #[test]
    fn best_for_prefers_recommended_then_usable() {
        let catalog = LampCatalog::from_markdown(SAMPLE).unwrap();
        assert_eq!(catalog.best_for(400, "M1"), Some("HgAr"));
        assert_eq!(catalog.best_for(400, "M2"), Some("Ne"));
        assert_eq!(catalog.best_for(600, "Blue"), Some("HgAr"));
    }

    #[test]
    fn recommended_lists_only_top_rated() {
        let catalog = LampCatalog::from_markdown(SAMPLE).unwrap();
        assert_eq!(catalog.recommended(400, "M1"), vec!["HgAr"]);
        assert!(catalog.recommended(400, "M2").is_empty());
    }

    #[test]
    fn unknown_rating_text_is_rejected() {
        let text = "\
## 400 l/mm

| Mode | Range | HgAr      |
|------|-------|-----------|
| M1   | x     | sometimes |
";
        let err = LampCatalog::from_markdown(text).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("sometimes"));
        assert!(message.contains("HgAr"));
    }

    #[test]
    fn duplicate_mode_is_rejected() {
        let text = "\
## 400 l/mm

| Mode | Range | HgAr |
|------|-------|------|
| M1   | x     | rec  |
| m1   | y     | ok   |
";
        let err = LampCatalog::from_markdown(text).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn embedded_catalog_is_complete() {
        let catalog = LampCatalog::embedded();
        assert_eq!(
            catalog.gratings(),
            vec![400, 600, 930, 1200, 1800, 2100, 2400]
        );
        assert_eq!(catalog.lamps().len(), 6);
        assert_eq!(catalog.rating(930, "M1", "CuHeAr"), Some(Rating::Recommended));
        assert_eq!(catalog.best_for(2400, "Custom"), Some("Ar"));
        // Every characterized mode has at least one workable lamp.
        for grating in catalog.gratings() {
            for mode in catalog.modes(grating) {
                assert!(
                    catalog.best_for(grating, mode).is_some(),
                    "no usable lamp for grating {grating} mode {mode}"
                );
            }
        }
    }
}
