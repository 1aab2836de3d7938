//! Output directory lifecycle.
//!
//! [`reset_output_dir`] clears the directory before a run and is idempotent.
//! A run writes into a [`Staging`] directory inside the output directory; its
//! files are moved into place by [`Staging::commit`], and the staging directory
//! is removed on every exit path, including errors and panics.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{info, warn};

/// Name prefix of staging directories
pub const STAGING_PREFIX: &str = ".refgen-staging-";

/// Remove everything inside `dir`, creating it if missing.
///
/// Returns the number of entries removed.
pub fn reset_output_dir(dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir)?;

    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        info!(path = %path.display(), "Deleted");
        removed += 1;
    }

    Ok(removed)
}

/// Scratch directory holding a run's files until the run completes
pub struct Staging {
    dir: Option<TempDir>,
    path: PathBuf,
    target: PathBuf,
}

impl Staging {
    /// Create a staging directory inside `target`
    pub fn create(target: &Path) -> Result<Self> {
        std::fs::create_dir_all(target)?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(target)?;
        let path = dir.path().to_path_buf();

        Ok(Self {
            dir: Some(dir),
            path,
            target: target.to_path_buf(),
        })
    }

    /// Directory the run should write into
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the staging directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Move every staged file into the target directory.
    ///
    /// Returns the final paths, sorted.
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let mut moved = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            let destination = self.target.join(entry.file_name());
            std::fs::rename(entry.path(), &destination)?;
            moved.push(destination);
        }
        moved.sort();

        if let Some(dir) = self.dir.take() {
            dir.close()?;
        }
        Ok(moved)
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            warn!(path = %self.path.display(), "Run did not complete, discarding partial output");
            drop(dir);
        }
    }
}
