//! # refgen
//!
//! PubMed literature-review pipeline: citation threshold, cross-list
//! deduplication, BibTeX and spreadsheet export.
//!
//! ## Modules
//!
//! - [`batch`] - Identifier lists from the input directory
//! - [`entrez`] - NCBI E-utilities client (citation counts, records)
//! - [`crossref`] - Crossref API client for DOI recovery
//! - [`source`] - The [`source::MetadataSource`] seam used by the pipeline
//! - [`threshold`] - Citation-count split
//! - [`dedupe`] - Duplicate removal across lists
//! - [`bibtex`] - BibTeX rendering
//! - [`report`] - Duplicate audit and run summary
//! - [`export`] - Spreadsheet and identifier files
//! - [`output`] - Output reset and staging
//! - [`pipeline`] - The two-stage run
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use refgen::config::{Config, Credentials};
//! use refgen::pipeline::Pipeline;
//! use refgen::source::PubMedSource;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let credentials = Credentials::new("you@example.org", "your-ncbi-key");
//!     let config = Config::new(credentials, "lists", "output").with_threshold(10);
//!     config.validate()?;
//!
//!     let source = PubMedSource::from_config(&config)?;
//!     let summary = Pipeline::new(&config, &source).run().await?;
//!     println!("{} records in the final set", summary.counts.final_count);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod bibtex;
pub mod config;
pub mod crossref;
pub mod dedupe;
pub mod entrez;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod source;
pub mod threshold;

pub use error::{RefgenError, Result};
