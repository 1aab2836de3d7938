//! Run reporting: the duplicate audit and the PRISMA-style run summary.

use crate::bibtex::BibEntry;
use crate::error::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// Number of entries lacking each audited field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingFields {
    pub journal: usize,
    pub volume: usize,
    pub pages: usize,
    pub pmid: usize,
    pub doi: usize,
}

impl MissingFields {
    fn count(entries: &[&BibEntry]) -> Self {
        let missing = |field: &str| {
            entries
                .iter()
                .filter(|e| e.get_field(field).is_none_or(|v| v.trim().is_empty()))
                .count()
        };
        Self {
            journal: missing("journal"),
            volume: missing("volume"),
            pages: missing("pages"),
            pmid: missing("pmid"),
            doi: missing("doi"),
        }
    }

    fn rows(&self) -> [(&'static str, usize); 5] {
        [
            ("journal", self.journal),
            ("volume", self.volume),
            ("pages", self.pages),
            ("pmid", self.pmid),
            ("doi", self.doi),
        ]
    }
}

/// Consistency check over a bibliography.
///
/// Three first-seen passes drop repeats by cite key, then PMID, then DOI.
/// Entries without the key in question always survive a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub original_total: usize,
    pub remaining: usize,
    pub duplicate_keys: BTreeSet<String>,
    pub duplicate_pmids: BTreeSet<String>,
    pub duplicate_dois: BTreeSet<String>,
    pub missing: MissingFields,
    pub first_key: Option<String>,
    pub first_pmids: Vec<String>,
    pub first_dois: Vec<String>,
}

impl AuditReport {
    pub fn inspect(entries: &[BibEntry]) -> Self {
        let all: Vec<&BibEntry> = entries.iter().collect();

        let (after_keys, duplicate_keys) = remove_repeats(all, |e| Some(e.cite_key.as_str()));
        let (after_pmids, duplicate_pmids) = remove_repeats(after_keys, |e| e.get_field("pmid"));
        let (remaining, duplicate_dois) = remove_repeats(after_pmids, |e| e.get_field("doi"));

        let firsts = |field: &str| {
            remaining
                .iter()
                .take(3)
                .map(|e| e.get_field(field).unwrap_or_default().to_string())
                .collect::<Vec<_>>()
        };

        Self {
            original_total: entries.len(),
            remaining: remaining.len(),
            duplicate_keys,
            duplicate_pmids,
            duplicate_dois,
            missing: MissingFields::count(&remaining),
            first_key: remaining.first().map(|e| e.cite_key.clone()),
            first_pmids: firsts("pmid"),
            first_dois: firsts("doi"),
        }
    }

    pub fn has_duplicates(&self) -> bool {
        !self.duplicate_keys.is_empty()
            || !self.duplicate_pmids.is_empty()
            || !self.duplicate_dois.is_empty()
    }

    /// Entries the three passes dropped
    pub fn removed(&self) -> usize {
        self.original_total - self.remaining
    }

    /// Human-readable report
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if self.has_duplicates() {
            lines.push("WARNING: DUPLICATES DETECTED\n".to_string());
        } else {
            lines.push("No duplicates present in input list\n".to_string());
        }

        lines.push("Summary Info:".to_string());
        lines.push(format!("Original total entries: {}", self.original_total));
        lines.push(format!(
            "Remaining entries after deduplication: {}",
            self.remaining
        ));
        lines.push(format!(
            "First ID: {}",
            self.first_key.as_deref().unwrap_or("N/A")
        ));
        lines.push(format!("First few PMIDs: {:?}", self.first_pmids));
        lines.push(format!("First few DOIs: {:?}\n", self.first_dois));

        lines.push("Missing Fields Counts:".to_string());
        for (field, count) in self.missing.rows() {
            lines.push(format!("  {}: {}", field, count));
        }

        let sections = [
            ("IDs", &self.duplicate_keys),
            ("PMIDs", &self.duplicate_pmids),
            ("DOIs", &self.duplicate_dois),
        ];
        for (label, keys) in sections {
            lines.push("\n---------------".to_string());
            lines.push(format!("Duplicate {} removed ({}):", label, keys.len()));
            lines.extend(keys.iter().map(|k| format!("  {}", k)));
        }

        lines.push(format!("\nTotal unique entries removed: {}", self.removed()));
        lines.join("\n")
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render() + "\n")?;
        Ok(())
    }
}

fn remove_repeats<'a, F>(entries: Vec<&'a BibEntry>, key: F) -> (Vec<&'a BibEntry>, BTreeSet<String>)
where
    F: Fn(&BibEntry) -> Option<&str>,
{
    let mut seen = HashSet::new();
    let mut repeated = BTreeSet::new();
    let mut kept = Vec::with_capacity(entries.len());

    for entry in entries {
        match key(entry).map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) if !seen.insert(k.to_string()) => {
                repeated.insert(k.to_string());
            }
            _ => kept.push(entry),
        }
    }
    (kept, repeated)
}

/// Per-batch outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub name: String,
    pub identifiers: usize,
    pub above_threshold: usize,
    pub below_threshold: usize,
    pub count_failures: usize,
    pub records: usize,
    pub record_failures: usize,
}

/// PRISMA-style flow counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrismaCounts {
    /// Identifiers read from all batches
    pub initial: usize,
    pub excluded_by_threshold: usize,
    pub count_failures: usize,
    pub record_failures: usize,
    /// Records written to the merged bibliography
    pub combined: usize,
    pub duplicates_removed: usize,
    #[serde(rename = "final")]
    pub final_count: usize,
}

/// Contents of `run_summary.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Local>,
    pub threshold: u32,
    pub batches: Vec<BatchSummary>,
    pub counts: PrismaCounts,
}

impl RunSummary {
    pub fn new(threshold: u32, batches: Vec<BatchSummary>, counts: PrismaCounts) -> Self {
        Self {
            generated_at: Local::now(),
            threshold,
            batches,
            counts,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, pmid: &str, doi: Option<&str>) -> BibEntry {
        let mut fields = vec![
            ("title".to_string(), format!("Title of {}", key)),
            ("journal".to_string(), "J Test".to_string()),
            ("pmid".to_string(), pmid.to_string()),
        ];
        if let Some(doi) = doi {
            fields.push(("doi".to_string(), doi.to_string()));
        }
        BibEntry {
            entry_type: "article".to_string(),
            cite_key: key.to_string(),
            fields,
        }
    }

    #[test]
    fn test_clean_bibliography() {
        let entries = vec![entry("a2020x", "1", Some("10.1/a")), entry("b2021y", "2", None)];
        let report = AuditReport::inspect(&entries);

        assert!(!report.has_duplicates());
        assert_eq!(report.removed(), 0);
        assert_eq!(report.missing.doi, 1);
        assert_eq!(report.missing.volume, 2);
        assert_eq!(report.missing.journal, 0);
        assert_eq!(report.first_key.as_deref(), Some("a2020x"));
        assert_eq!(report.first_dois, vec!["10.1/a".to_string(), String::new()]);
        assert!(report.render().starts_with("No duplicates"));
    }

    #[test]
    fn test_passes_run_in_order() {
        let entries = vec![
            entry("a2020x", "1", Some("10.1/a")),
            entry("a2020x", "9", None),
            entry("c2020z", "1", None),
            entry("d2020w", "4", Some("10.1/a")),
            entry("e2020v", "5", None),
        ];
        let report = AuditReport::inspect(&entries);

        assert!(report.has_duplicates());
        assert_eq!(report.original_total, 5);
        assert_eq!(report.remaining, 2);
        assert_eq!(report.duplicate_keys.iter().collect::<Vec<_>>(), vec!["a2020x"]);
        assert_eq!(report.duplicate_pmids.iter().collect::<Vec<_>>(), vec!["1"]);
        assert_eq!(report.duplicate_dois.iter().collect::<Vec<_>>(), vec!["10.1/a"]);

        let text = report.render();
        assert!(text.contains("Duplicate PMIDs removed (1):\n  1"));
        assert!(text.contains("Total unique entries removed: 3"));
    }

    #[test]
    fn test_empty_bibliography() {
        let report = AuditReport::inspect(&[]);
        assert_eq!(report.remaining, 0);
        assert!(report.render().contains("First ID: N/A"));
    }

    #[test]
    fn test_summary_json_uses_final_key() -> Result<()> {
        let counts = PrismaCounts {
            initial: 4,
            excluded_by_threshold: 1,
            combined: 3,
            duplicates_removed: 1,
            final_count: 2,
            ..Default::default()
        };
        let summary = RunSummary::new(5, Vec::new(), counts);
        let value = serde_json::to_value(&summary)?;

        assert_eq!(value["counts"]["final"], 2);
        assert_eq!(value["threshold"], 5);
        assert!(value["counts"].get("final_count").is_none());
        Ok(())
    }
}
