//! Markdown table extraction for the lamp catalog.
//!
//! The catalog source is a markdown document with one `## <lines> l/mm`
//! heading per grating, each followed by a pipe table. Parsing uses
//! `pulldown-cmark` with the tables extension; prose between sections is
//! ignored.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use crate::error::{Error, Result};

/// One pipe table together with the grating its section heading names.
#[derive(Debug)]
pub(super) struct RawTable {
    pub grating: u16,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Pulls every grating table out of `text`.
///
/// A table that appears before any `## <lines> l/mm` heading has no grating
/// to belong to and is rejected, as is a document without a single table.
pub(super) fn parse_tables(text: &str) -> Result<Vec<RawTable>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(text, options);

    let mut tables = Vec::new();
    let mut grating: Option<u16> = None;

    let mut heading: Option<String> = None;
    let mut table: Option<RawTable> = None;
    let mut in_head = false;
    let mut row: Vec<String> = Vec::new();
    let mut cell: Option<String> = None;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                heading = Some(String::new());
            }
            Event::End(TagEnd::Heading(_)) => {
                // A heading that names no line density closes the current
                // section, so stray tables after it are caught below.
                if let Some(text) = heading.take() {
                    grating = grating_heading(&text);
                }
            }
            Event::Start(Tag::Table(_)) => {
                let Some(grating) = grating else {
                    return Err(Error::catalog(
                        "found a lamp table outside any grating section",
                    ));
                };
                table = Some(RawTable {
                    grating,
                    header: Vec::new(),
                    rows: Vec::new(),
                });
            }
            Event::End(TagEnd::Table) => {
                if let Some(table) = table.take() {
                    check_shape(&table)?;
                    tables.push(table);
                }
            }
            Event::Start(Tag::TableHead) => in_head = true,
            Event::End(TagEnd::TableHead) => in_head = false,
            Event::Start(Tag::TableRow) => row.clear(),
            Event::End(TagEnd::TableRow) => {
                if let Some(table) = table.as_mut() {
                    table.rows.push(std::mem::take(&mut row));
                }
            }
            Event::Start(Tag::TableCell) => cell = Some(String::new()),
            Event::End(TagEnd::TableCell) => {
                if let (Some(text), Some(table)) = (cell.take(), table.as_mut()) {
                    let text = text.trim().to_string();
                    if in_head {
                        table.header.push(text);
                    } else {
                        row.push(text);
                    }
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(buf) = cell.as_mut() {
                    buf.push_str(&text);
                } else if let Some(buf) = heading.as_mut() {
                    buf.push_str(&text);
                }
            }
            _ => {}
        }
    }

    if tables.is_empty() {
        return Err(Error::catalog("no grating tables found"));
    }
    Ok(tables)
}

/// Reads the line density out of a `400 l/mm` style heading. Returns `None`
/// for headings that name no grating.
fn grating_heading(text: &str) -> Option<u16> {
    let text = text.trim();
    let end = text.find(|c: char| !c.is_ascii_digit())?;
    let (digits, rest) = text.split_at(end);
    if digits.is_empty() || !rest.trim_start().starts_with("l/mm") {
        return None;
    }
    digits.parse().ok()
}

/// Every row must line up with the header, and the header must hold the mode
/// column, the range column and at least one lamp.
fn check_shape(table: &RawTable) -> Result<()> {
    if table.header.len() < 3 {
        return Err(Error::catalog(format!(
            "grating {} table needs Mode, Range and at least one lamp column",
            table.grating
        )));
    }
    for (i, row) in table.rows.iter().enumerate() {
        if row.len() != table.header.len() {
            return Err(Error::catalog(format!(
                "grating {} table: row {} has {} cells, expected {}",
                table.grating,
                i + 1,
                row.len(),
                table.header.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_recognition() {
        assert_eq!(grating_heading("400 l/mm"), Some(400));
        assert_eq!(grating_heading("  2400 l/mm  "), Some(2400));
        assert_eq!(grating_heading("400"), None);
        assert_eq!(grating_heading("Notes"), None);
        assert_eq!(grating_heading("l/mm"), None);
    }

    #[test]
    fn tables_attach_to_their_section() {
        let text = "\
# Catalog

## 400 l/mm

| Mode | Range (A) | HgAr |
|------|-----------|------|
| M1   | 3000-7050 | rec  |

## 600 l/mm

Some prose between heading and table.

| Mode | Range (A) | HgAr |
|------|-----------|------|
| Blue | 3500-4960 | ok   |
";
        let tables = parse_tables(text).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].grating, 400);
        assert_eq!(tables[0].header, ["Mode", "Range (A)", "HgAr"]);
        assert_eq!(tables[0].rows, [["M1", "3000-7050", "rec"]]);
        assert_eq!(tables[1].grating, 600);
        assert_eq!(tables[1].rows, [["Blue", "3500-4960", "ok"]]);
    }

    #[test]
    fn table_without_a_section_is_rejected() {
        let text = "| Mode | Range | HgAr |\n|---|---|---|\n| M1 | x | rec |\n";
        let err = parse_tables(text).unwrap_err();
        assert!(err.to_string().contains("outside any grating section"));
    }

    #[test]
    fn non_grating_heading_closes_the_section() {
        let text = "\
## 400 l/mm

| Mode | Range | HgAr |
|---|---|---|
| M1 | x | rec |

## Notes

| Mode | Range | HgAr |
|---|---|---|
| M2 | x | ok |
";
        let err = parse_tables(text).unwrap_err();
        assert!(err.to_string().contains("outside any grating section"));
    }

    #[test]
    fn narrow_table_is_rejected() {
        let text = "## 400 l/mm\n\n| Mode | Range |\n|---|---|\n| M1 | x |\n";
        let err = parse_tables(text).unwrap_err();
        assert!(err.to_string().contains("at least one lamp column"));
    }

    #[test]
    fn document_without_tables_is_rejected() {
        let err = parse_tables("# Nothing here\n\nJust prose.\n").unwrap_err();
        assert!(err.to_string().contains("no grating tables"));
    }
}
