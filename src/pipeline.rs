//! The two-stage literature pipeline.
//!
//! Stage 1 splits every batch by citation count. Stage 2 fetches records for
//! the identifiers above the threshold, merges all batches, removes duplicates
//! and exports the result. All files are written to a staging directory and
//! moved into the output directory once the run has succeeded.

use crate::batch::{discover_batches, Batch};
use crate::bibtex::{disambiguate_keys, write_bib_file, BibEntry};
use crate::config::Config;
use crate::dedupe::deduplicate;
use crate::error::{RefgenError, Result};
use crate::export::{write_identifiers, write_lines, write_spreadsheet};
use crate::output::{reset_output_dir, Staging};
use crate::record::{CitationRecord, Pmid};
use crate::report::{AuditReport, BatchSummary, PrismaCounts, RunSummary};
use crate::source::MetadataSource;
use crate::threshold::ThresholdSplit;
use std::collections::HashMap;
use tracing::{info, warn};

pub const COMBINED_BIB: &str = "combined_bib_file.bib";
pub const FINALIZED_BIB: &str = "finalized.bib";
pub const DUPLICATE_REPORT: &str = "duplicate_check_summary.txt";
pub const SPREADSHEET: &str = "finalized_entries.csv";
pub const RUN_SUMMARY: &str = "run_summary.json";

/// A batch after the threshold split
struct SplitBatch<'b> {
    batch: &'b Batch,
    split: ThresholdSplit,
    counts: HashMap<Pmid, u32>,
    errors: Vec<String>,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    source: &'a dyn MetadataSource,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, source: &'a dyn MetadataSource) -> Self {
        Self { config, source }
    }

    /// Execute a full run and return its summary.
    ///
    /// Per-identifier failures are counted and skipped. Missing input and
    /// output I/O errors abort the run, leaving the output directory empty.
    pub async fn run(&self) -> Result<RunSummary> {
        let batches = discover_batches(&self.config.input_dir)?;
        if batches.is_empty() {
            return Err(RefgenError::Config(format!(
                "No .txt identifier lists found in {}",
                self.config.input_dir.display()
            )));
        }

        self.config.check_output_dir()?;
        reset_output_dir(&self.config.output_dir)?;
        let staging = Staging::create(&self.config.output_dir)?;

        // ===========================================
        // STAGE 1: Citation Threshold
        // ===========================================
        println!(
            "\n--- Stage 1: Citation Threshold (>= {}) ---",
            self.config.threshold
        );
        let mut split_batches = Vec::with_capacity(batches.len());
        for batch in &batches {
            let split = self.split_batch(batch, &staging).await?;
            split_batches.push(split);
        }

        // ===========================================
        // STAGE 2: Aggregation & Export
        // ===========================================
        println!("\n--- Stage 2: Aggregation & Export ---");
        let mut summaries = Vec::with_capacity(split_batches.len());
        let mut combined = Vec::new();
        for split_batch in split_batches {
            let (summary, records) = self.collect_records(split_batch, &staging).await?;
            summaries.push(summary);
            combined.extend(records);
        }

        let combined_entries = self.entries(&combined);
        write_bib_file(&staging.file(COMBINED_BIB), &combined_entries)?;
        println!("Combined bibliography: {} entries", combined_entries.len());

        let audit = AuditReport::inspect(&combined_entries);
        audit.write(&staging.file(DUPLICATE_REPORT))?;
        if audit.has_duplicates() {
            warn!(
                repeated = audit.removed(),
                "Combined bibliography contains repeated keys"
            );
        }

        let combined_count = combined.len();
        let outcome = deduplicate(combined);
        for duplicate in &outcome.duplicates {
            info!(
                pmid = %duplicate.record.pmid,
                kept = %duplicate.kept,
                "Duplicate removed"
            );
        }
        println!(
            "Removed {} duplicates, {} unique records",
            outcome.removed(),
            outcome.unique.len()
        );

        let mut final_entries = self.entries(&outcome.unique);
        disambiguate_keys(&mut final_entries);
        write_bib_file(&staging.file(FINALIZED_BIB), &final_entries)?;

        let recheck = AuditReport::inspect(&final_entries);
        if recheck.has_duplicates() {
            warn!(
                pmids = recheck.duplicate_pmids.len(),
                dois = recheck.duplicate_dois.len(),
                "Finalized bibliography still has repeated identifiers"
            );
        } else {
            info!(entries = recheck.remaining, "Finalized bibliography passed duplicate check");
        }

        write_spreadsheet(
            &staging.file(SPREADSHEET),
            final_entries
                .iter()
                .map(|e| e.cite_key.as_str())
                .zip(&outcome.unique),
        )?;

        let counts = prisma_counts(&summaries, combined_count, outcome.removed());
        let summary = RunSummary::new(self.config.threshold, summaries, counts);
        summary.write(&staging.file(RUN_SUMMARY))?;

        let files = staging.commit()?;
        info!(
            dir = %self.config.output_dir.display(),
            files = files.len(),
            "Run complete"
        );
        Ok(summary)
    }

    /// Fetch counts for one batch and write its threshold lists
    async fn split_batch<'b>(&self, batch: &'b Batch, staging: &Staging) -> Result<SplitBatch<'b>> {
        println!(
            "[{}] Fetching citation counts for {} identifiers...",
            batch.name,
            batch.identifiers.len()
        );

        let mut counts = HashMap::new();
        let mut pairs = Vec::with_capacity(batch.identifiers.len());
        let mut errors = Vec::new();
        for pmid in &batch.identifiers {
            match self.source.citation_count(pmid).await {
                Ok(count) => {
                    counts.insert(pmid.clone(), count);
                    pairs.push((pmid.clone(), Some(count)));
                }
                Err(e) => {
                    warn!(batch = %batch.name, pmid = %pmid, error = %e, "Citation count failed");
                    errors.push(format!("{}\tcitation_count\t{}", pmid, e));
                    pairs.push((pmid.clone(), None));
                }
            }
        }

        let split = ThresholdSplit::partition(self.config.threshold, pairs);
        write_identifiers(
            &staging.file(&format!("{}_in_threshold.txt", batch.name)),
            &split.above,
        )?;
        write_identifiers(
            &staging.file(&format!("{}_sub_threshold.txt", batch.name)),
            &split.below,
        )?;
        info!(
            batch = %batch.name,
            above = split.above.len(),
            below = split.below.len(),
            unknown = split.unknown,
            "Threshold split"
        );

        Ok(SplitBatch {
            batch,
            split,
            counts,
            errors,
        })
    }

    /// Fetch records for the above-threshold identifiers of one batch
    async fn collect_records(
        &self,
        split_batch: SplitBatch<'_>,
        staging: &Staging,
    ) -> Result<(BatchSummary, Vec<CitationRecord>)> {
        let SplitBatch {
            batch,
            split,
            counts,
            mut errors,
        } = split_batch;
        println!(
            "[{}] Fetching {} records...",
            batch.name,
            split.above.len()
        );

        let mut records = Vec::with_capacity(split.above.len());
        let mut record_failures = 0;
        for pmid in &split.above {
            match self.source.fetch_record(pmid).await {
                Ok(mut record) => {
                    record.citation_count = counts.get(pmid).copied();
                    records.push(record);
                }
                Err(e) => {
                    warn!(batch = %batch.name, pmid = %pmid, error = %e, "Record fetch failed");
                    errors.push(format!("{}\tfetch_record\t{}", pmid, e));
                    record_failures += 1;
                }
            }
        }

        write_bib_file(
            &staging.file(&format!("{}_thresh.bib", batch.name)),
            &self.entries(&records),
        )?;
        if !errors.is_empty() {
            write_lines(
                &staging.file(&format!("{}_error.txt", batch.name)),
                errors.iter().map(String::as_str),
            )?;
        }

        let summary = BatchSummary {
            name: batch.name.clone(),
            identifiers: batch.identifiers.len(),
            above_threshold: split.above.len(),
            below_threshold: split.below.len(),
            count_failures: split.unknown,
            records: records.len(),
            record_failures,
        };
        Ok((summary, records))
    }

    fn entries(&self, records: &[CitationRecord]) -> Vec<BibEntry> {
        records
            .iter()
            .map(|r| {
                let entry = BibEntry::from_record(r);
                if self.config.ascii {
                    entry.into_ascii()
                } else {
                    entry
                }
            })
            .collect()
    }
}

fn prisma_counts(batches: &[BatchSummary], combined: usize, removed: usize) -> PrismaCounts {
    let total = |f: fn(&BatchSummary) -> usize| batches.iter().map(f).sum::<usize>();

    PrismaCounts {
        initial: total(|b| b.identifiers),
        excluded_by_threshold: total(|b| b.below_threshold - b.count_failures),
        count_failures: total(|b| b.count_failures),
        record_failures: total(|b| b.record_failures),
        combined,
        duplicates_removed: removed,
        final_count: combined - removed,
    }
}
