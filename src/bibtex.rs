//! BibTeX rendering for citation records.
//!
//! Records become `@article` entries; the cite key is derived from the first
//! author, year and first significant title word.

use crate::error::Result;
use crate::record::CitationRecord;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Title words skipped when building a cite key
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "on", "of", "in", "for", "and", "to", "with", "from", "at", "by",
];

/// A single BibTeX entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub entry_type: String,
    pub cite_key: String,
    pub fields: Vec<(String, String)>,
}

impl BibEntry {
    /// Build an `@article` entry from a record, omitting empty fields
    pub fn from_record(record: &CitationRecord) -> Self {
        let authors = record
            .authors
            .iter()
            .map(|a| a.display_name())
            .collect::<Vec<_>>()
            .join(" and ");
        let year = record.year.map(|y| y.to_string()).unwrap_or_default();

        let candidates = [
            ("author", authors),
            ("title", record.title.clone()),
            ("journal", record.journal.clone()),
            ("year", year),
            ("volume", record.volume.clone()),
            ("number", record.issue.clone()),
            ("pages", record.pages.clone()),
            ("doi", record.doi.clone().unwrap_or_default()),
            ("pmid", record.pmid.to_string()),
        ];

        let fields = candidates
            .into_iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        Self {
            entry_type: "article".to_string(),
            cite_key: cite_key(record),
            fields,
        }
    }

    /// Get a field value by key (case-insensitive)
    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value by its ASCII approximation
    pub fn into_ascii(mut self) -> Self {
        for (_, value) in &mut self.fields {
            *value = to_ascii(value);
        }
        self
    }

    /// Render as BibTeX text
    pub fn format(&self) -> String {
        let mut result = String::new();
        result.push('@');
        result.push_str(&self.entry_type);
        result.push('{');
        result.push_str(&self.cite_key);
        result.push_str(",\n");

        for (key, value) in &self.fields {
            result.push_str("    ");
            result.push_str(key);
            result.push_str(" = ");
            result.push_str(&format_field_value(value));
            result.push_str(",\n");
        }

        result.push('}');
        result
    }
}

/// Numeric values are written bare; everything else is braced.
///
/// Braces inside a value are dropped so that an unbalanced brace in a title
/// cannot swallow the rest of the file.
fn format_field_value(value: &str) -> String {
    if value.chars().all(|c| c.is_ascii_digit()) {
        return value.to_string();
    }
    let inner: String = value.chars().filter(|c| *c != '{' && *c != '}').collect();
    format!("{{{}}}", inner)
}

/// `<family><year><word>`, lower-case ASCII; `pmid<PMID>` when nothing usable
pub fn cite_key(record: &CitationRecord) -> String {
    let family = record
        .authors
        .first()
        .map(|a| key_fragment(&a.family))
        .unwrap_or_default();
    let word = record
        .title
        .split_whitespace()
        .map(key_fragment)
        .find(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
        .unwrap_or_default();

    if family.is_empty() && word.is_empty() {
        return format!("pmid{}", record.pmid);
    }

    let year = record.year.map(|y| y.to_string()).unwrap_or_default();
    format!("{}{}{}", family, year, word)
}

fn key_fragment(s: &str) -> String {
    s.nfkd()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// NFKD-decompose and drop everything outside ASCII
pub fn to_ascii(s: &str) -> String {
    s.nfkd().filter(|c| c.is_ascii()).collect()
}

/// Make cite keys unique by suffixing repeats with `a`, `b`, ...
pub fn disambiguate_keys(entries: &mut [BibEntry]) {
    let mut used = HashSet::new();
    for entry in entries.iter_mut() {
        if used.insert(entry.cite_key.clone()) {
            continue;
        }
        let mut n = 0u32;
        let key = loop {
            n += 1;
            let candidate = match char::from_digit(n + 9, 36) {
                Some(letter) if n <= 26 => format!("{}{}", entry.cite_key, letter),
                _ => format!("{}_{}", entry.cite_key, n),
            };
            if !used.contains(&candidate) {
                break candidate;
            }
        };
        used.insert(key.clone());
        entry.cite_key = key;
    }
}

/// Format multiple entries separated by blank lines
pub fn format_entries(entries: &[BibEntry]) -> String {
    entries
        .iter()
        .map(BibEntry::format)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Write entries to a `.bib` file, replacing any existing file
pub fn write_bib_file(path: &Path, entries: &[BibEntry]) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    let body = format_entries(entries);
    file.write_all(body.as_bytes())?;
    if !body.is_empty() {
        file.write_all(b"\n")?;
    }
    file.flush()?;
    Ok(())
}
