//! Identifier batches.
//!
//! Each `.txt` file in the input directory is one batch, e.g. a "PMID list"
//! exported from a PubMed search. The batch name is the file stem.

use crate::error::{RefgenError, Result};
use crate::record::Pmid;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One input list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub name: String,
    pub path: PathBuf,
    pub identifiers: Vec<Pmid>,
}

impl Batch {
    /// Read a batch from a newline-delimited file
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| RefgenError::Config(format!("Not a file: {}", path.display())))?;
        let content = std::fs::read_to_string(path)?;
        let identifiers = parse_identifiers(&content);
        debug!(batch = %name, count = identifiers.len(), "Loaded identifiers");

        Ok(Self {
            name,
            path: path.to_path_buf(),
            identifiers,
        })
    }
}

/// Trimmed, non-empty lines with repeats removed (first occurrence kept)
pub fn parse_identifiers(content: &str) -> Vec<Pmid> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(Pmid::new)
        .filter(|p| !p.as_str().is_empty())
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Load every `.txt` file in `dir`, ordered by file name
pub fn discover_batches(dir: &Path) -> Result<Vec<Batch>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        RefgenError::Config(format!("Cannot read input directory {}: {}", dir.display(), e))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_txt = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if path.is_file() && is_txt {
            paths.push(path);
        }
    }
    paths.sort();

    let batches = paths
        .iter()
        .map(|p| Batch::load(p))
        .collect::<Result<Vec<_>>>()?;

    // Batch names become output file prefixes and must be unique
    let mut names: HashMap<&str, &Path> = HashMap::new();
    for batch in &batches {
        if let Some(previous) = names.insert(&batch.name, &batch.path) {
            return Err(RefgenError::Config(format!(
                "Batch name {:?} is used by both {} and {}",
                batch.name,
                previous.display(),
                batch.path.display()
            )));
        }
    }

    info!(dir = %dir.display(), count = batches.len(), "Discovered identifier lists");
    Ok(batches)
}
