//! Cross-batch duplicate removal.
//!
//! Two records describe the same work when they share a PMID, or when their
//! normalized titles match and their DOIs do not disagree (a record without a
//! DOI falls back to title-only matching). The first record seen is kept.
//!
//! ## Usage
//!
//! ```rust
//! use refgen::dedupe::deduplicate;
//! use refgen::record::{CitationRecord, Pmid};
//!
//! let records = vec![
//!     CitationRecord { pmid: Pmid::new("1"), title: "Same Title.".into(), ..Default::default() },
//!     CitationRecord { pmid: Pmid::new("2"), title: "same title".into(), ..Default::default() },
//! ];
//! let outcome = deduplicate(records);
//! assert_eq!(outcome.unique.len(), 1);
//! assert_eq!(outcome.removed(), 1);
//! ```

use crate::record::{CitationRecord, Pmid};
use std::collections::HashMap;
use tracing::debug;

/// A record dropped because an earlier one describes the same work
#[derive(Debug, Clone, PartialEq)]
pub struct Duplicate {
    pub record: CitationRecord,
    /// PMID of the record that was kept in its place
    pub kept: Pmid,
}

/// Output of one deduplication pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupeOutcome {
    pub unique: Vec<CitationRecord>,
    pub duplicates: Vec<Duplicate>,
}

impl DedupeOutcome {
    /// Number of records dropped
    pub fn removed(&self) -> usize {
        self.duplicates.len()
    }
}

/// Single-pass deduplicator with first-seen-wins policy
#[derive(Debug, Default)]
pub struct Deduplicator {
    by_pmid: HashMap<Pmid, usize>,
    by_title: HashMap<String, Vec<(Option<String>, usize)>>,
    unique: Vec<CitationRecord>,
    duplicates: Vec<Duplicate>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a record; returns `true` if it was kept
    pub fn push(&mut self, record: CitationRecord) -> bool {
        let title = record.title_key();
        let doi = record.doi_key();

        if let Some(idx) = self.find_match(&record.pmid, &title, doi.as_deref()) {
            let kept = self.unique[idx].pmid.clone();
            debug!(pmid = %record.pmid, kept = %kept, "Dropping duplicate record");
            self.duplicates.push(Duplicate { record, kept });
            return false;
        }

        let idx = self.unique.len();
        self.by_pmid.insert(record.pmid.clone(), idx);
        if !title.is_empty() {
            self.by_title.entry(title).or_default().push((doi, idx));
        }
        self.unique.push(record);
        true
    }

    fn find_match(&self, pmid: &Pmid, title: &str, doi: Option<&str>) -> Option<usize> {
        if let Some(&idx) = self.by_pmid.get(pmid) {
            return Some(idx);
        }
        if title.is_empty() {
            return None;
        }
        self.by_title.get(title)?.iter().find_map(|(kept_doi, idx)| {
            match (kept_doi.as_deref(), doi) {
                (Some(a), Some(b)) if a != b => None,
                _ => Some(*idx),
            }
        })
    }

    pub fn finish(self) -> DedupeOutcome {
        DedupeOutcome {
            unique: self.unique,
            duplicates: self.duplicates,
        }
    }
}

/// Deduplicate records in order, keeping the first of each work
pub fn deduplicate<I>(records: I) -> DedupeOutcome
where
    I: IntoIterator<Item = CitationRecord>,
{
    let mut deduplicator = Deduplicator::new();
    for record in records {
        deduplicator.push(record);
    }
    deduplicator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pmid: &str, title: &str, doi: Option<&str>) -> CitationRecord {
        CitationRecord {
            pmid: Pmid::new(pmid),
            title: title.to_string(),
            doi: doi.map(str::to_string),
            ..Default::default()
        }
    }

    fn pmids(records: &[CitationRecord]) -> Vec<&str> {
        records.iter().map(|r| r.pmid.as_str()).collect()
    }

    #[test]
    fn test_same_title_different_pmid_collapses() {
        let outcome = deduplicate(vec![
            record("100", "Gut Microbiota and   Depression.", None),
            record("200", "gut microbiota and depression", None),
        ]);
        assert_eq!(pmids(&outcome.unique), vec!["100"]);
        assert_eq!(outcome.removed(), 1);
        assert_eq!(outcome.duplicates[0].kept, Pmid::new("100"));
    }

    #[test]
    fn test_same_title_conflicting_doi_kept() {
        let outcome = deduplicate(vec![
            record("1", "Erratum", Some("10.1/a")),
            record("2", "Erratum", Some("10.1/b")),
        ]);
        assert_eq!(pmids(&outcome.unique), vec!["1", "2"]);
        assert_eq!(outcome.removed(), 0);
    }

    #[test]
    fn test_same_title_same_doi_collapses() {
        let outcome = deduplicate(vec![
            record("1", "A study", Some("https://doi.org/10.1/A")),
            record("2", "A Study.", Some("10.1/a")),
        ]);
        assert_eq!(pmids(&outcome.unique), vec!["1"]);
    }

    #[test]
    fn test_missing_doi_falls_back_to_title() {
        let outcome = deduplicate(vec![
            record("1", "A study", Some("10.1/a")),
            record("2", "A study", None),
            record("3", "A study", Some("10.1/b")),
        ]);
        // 2 matches 1 by title alone; 3 conflicts with 1 on DOI
        assert_eq!(pmids(&outcome.unique), vec!["1", "3"]);
    }

    #[test]
    fn test_repeated_pmid_across_batches() {
        let outcome = deduplicate(vec![
            record("7", "First", None),
            record("8", "Second", None),
            record("7", "First", None),
        ]);
        assert_eq!(pmids(&outcome.unique), vec!["7", "8"]);
        assert_eq!(outcome.removed(), 1);
    }

    #[test]
    fn test_empty_titles_do_not_match() {
        let outcome = deduplicate(vec![record("1", "", None), record("2", "  ", None)]);
        assert_eq!(outcome.unique.len(), 2);
    }

    #[test]
    fn test_idempotent() {
        let input = vec![
            record("1", "Alpha", Some("10.1/a")),
            record("2", "alpha", None),
            record("3", "Beta", None),
            record("4", "Alpha", Some("10.1/b")),
            record("5", "beta.", Some("10.1/c")),
            record("3", "Beta", None),
        ];
        let once = deduplicate(input);
        let twice = deduplicate(once.unique.clone());
        assert_eq!(twice.unique, once.unique);
        assert_eq!(twice.removed(), 0);
    }

    #[test]
    fn test_size_invariant() {
        let input = vec![
            record("1", "Alpha", None),
            record("2", "Alpha", None),
            record("3", "Gamma", None),
        ];
        let total = input.len();
        let outcome = deduplicate(input);
        assert_eq!(outcome.unique.len(), total - outcome.removed());
    }
}
