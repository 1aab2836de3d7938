//! Flat-file writers: the finalized spreadsheet and identifier lists.

use crate::error::Result;
use crate::record::{CitationRecord, Pmid};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// One spreadsheet row per record
#[derive(Debug, Serialize)]
struct SpreadsheetRow<'a> {
    cite_key: &'a str,
    pmid: &'a str,
    title: &'a str,
    authors: String,
    journal: &'a str,
    year: Option<i32>,
    volume: &'a str,
    issue: &'a str,
    pages: &'a str,
    doi: &'a str,
    citation_count: Option<u32>,
}

impl<'a> SpreadsheetRow<'a> {
    fn new(cite_key: &'a str, record: &'a CitationRecord) -> Self {
        Self {
            cite_key,
            pmid: record.pmid.as_str(),
            title: &record.title,
            authors: record
                .authors
                .iter()
                .map(|a| a.display_name())
                .collect::<Vec<_>>()
                .join("; "),
            journal: &record.journal,
            year: record.year,
            volume: &record.volume,
            issue: &record.issue,
            pages: &record.pages,
            doi: record.doi.as_deref().unwrap_or_default(),
            citation_count: record.citation_count,
        }
    }
}

const HEADER: [&str; 11] = [
    "cite_key",
    "pmid",
    "title",
    "authors",
    "journal",
    "year",
    "volume",
    "issue",
    "pages",
    "doi",
    "citation_count",
];

/// Write `(cite key, record)` rows as CSV with a header row, even when there
/// are no rows.
///
/// The cite key is taken as given so the sheet matches the keys of the
/// bibliography written alongside it.
pub fn write_spreadsheet<'a, I>(path: &Path, rows: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a CitationRecord)>,
{
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;

    wtr.write_record(HEADER)?;
    let mut written = 0usize;
    for (cite_key, record) in rows {
        wtr.serialize(SpreadsheetRow::new(cite_key, record))?;
        written += 1;
    }

    wtr.flush()?;
    debug!(path = %path.display(), rows = written, "Spreadsheet written");
    Ok(())
}

/// One PMID per line
pub fn write_identifiers(path: &Path, pmids: &[Pmid]) -> Result<()> {
    write_lines(path, pmids.iter().map(Pmid::as_str))
}

pub fn write_lines<'a, I>(path: &Path, lines: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    file.flush()?;
    Ok(())
}
