//! Identifiers and citation records.
//!
//! A [`CitationRecord`] is identified by its PMID. The normalized title and DOI
//! produced here are the secondary keys used by [`crate::dedupe`] to detect two
//! identifiers that resolve to the same work.

use caseless::default_case_fold_str;
use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// PubMed identifier as read from an input list
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pmid(String);

impl Pmid {
    /// Wrap a raw identifier, trimming surrounding whitespace
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// PMIDs are non-empty runs of ASCII digits
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c.is_ascii_digit())
    }
}

impl fmt::Display for Pmid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Pmid {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Author name split the way PubMed lists it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Family name, or the collective name for group authors
    pub family: String,
    /// Given names / initials (empty for group authors)
    pub given: String,
}

impl Author {
    pub fn new(family: impl Into<String>, given: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            given: given.into(),
        }
    }

    /// `Family, Given` (BibTeX order), or just the family name
    pub fn display_name(&self) -> String {
        if self.given.is_empty() {
            self.family.clone()
        } else {
            format!("{}, {}", self.family, self.given)
        }
    }
}

/// Metadata for one work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationRecord {
    pub pmid: Pmid,
    pub title: String,
    pub authors: Vec<Author>,
    pub journal: String,
    pub year: Option<i32>,
    pub volume: String,
    pub issue: String,
    pub pages: String,
    /// Bare DOI (`10.xxxx/...`), without resolver prefix
    pub doi: Option<String>,
    /// Number of PubMed articles citing this one, when known
    pub citation_count: Option<u32>,
}

impl CitationRecord {
    /// Title normalized for duplicate matching
    pub fn title_key(&self) -> String {
        normalize_title(&self.title)
    }

    /// DOI normalized for duplicate matching
    pub fn doi_key(&self) -> Option<String> {
        self.doi.as_deref().and_then(normalize_doi)
    }
}

/// Unicode case-fold, collapse whitespace and drop a trailing period.
///
/// Compatibility forms are composed first (NFKC) so ligatures and full-width
/// letters fold like their plain spellings. PubMed titles end with `.` while
/// Crossref titles do not, so the period is not significant.
pub fn normalize_title(title: &str) -> String {
    let composed: String = title.nfkc().collect();
    let folded = default_case_fold_str(&composed);
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches('.').trim_end().to_string()
}

/// Lower-case a DOI and strip any resolver prefix.
///
/// Returns `None` when the string does not contain a `10.` prefix.
pub fn normalize_doi(doi: &str) -> Option<String> {
    let doi: String = doi
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    let start = doi.find("10.")?;
    let bare = doi[start..].trim_end_matches('.');
    if bare.len() <= 3 {
        return None;
    }
    Some(bare.to_string())
}
