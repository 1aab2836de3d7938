//! Run configuration.
//!
//! Credentials, the citation threshold and the directories are collected into
//! one [`Config`] that is validated before any request is made.

use crate::error::{RefgenError, Result};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Default minimum citation count
pub const DEFAULT_THRESHOLD: u32 = 10;

/// Default spacing between E-utilities requests
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(350);

/// Values shipped in example configurations that must be replaced
const PLACEHOLDER_EMAILS: &[&str] = &["placeholder@change.com", "your_email@example.com"];
const PLACEHOLDER_KEYS: &[&str] = &["8e7f2a9b4c1d6e3f9g2h5i8j1k4l7m0n9p2q", "your_api_key_here"];

/// NCBI account details sent with every E-utilities request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            api_key: api_key.into(),
        }
    }

    /// Reject empty values and the placeholders from the example setup
    pub fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        let api_key = self.api_key.trim();

        if email.is_empty() || api_key.is_empty() {
            return Err(RefgenError::Config(
                "NCBI email and API key are both required (https://www.ncbi.nlm.nih.gov/account/)"
                    .to_string(),
            ));
        }
        if PLACEHOLDER_EMAILS.contains(&email) || PLACEHOLDER_KEYS.contains(&api_key) {
            return Err(RefgenError::Config(
                "Replace the placeholder NCBI email and API key with your own".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(RefgenError::Config(format!("Invalid email address: {}", email)));
        }
        Ok(())
    }
}

/// Everything a pipeline run needs
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// Minimum citation count for inclusion
    pub threshold: u32,
    /// Directory of `.txt` identifier lists
    pub input_dir: PathBuf,
    /// Directory receiving all outputs; cleared before each run
    pub output_dir: PathBuf,
    pub request_interval: Duration,
    /// Recover missing DOIs from Crossref
    pub crossref: bool,
    /// Write bibliographies as plain ASCII
    pub ascii: bool,
}

impl Config {
    pub fn new(
        credentials: Credentials,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            credentials,
            threshold: DEFAULT_THRESHOLD,
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            request_interval: DEFAULT_REQUEST_INTERVAL,
            crossref: true,
            ascii: false,
        }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Fatal checks, run before anything touches the network or the output
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        self.check_output_dir()
    }

    /// The input directory must exist and must survive an output reset
    pub fn check_output_dir(&self) -> Result<()> {
        if !self.input_dir.is_dir() {
            return Err(RefgenError::Config(format!(
                "Input directory not found: {}",
                self.input_dir.display()
            )));
        }

        let input = self.input_dir.canonicalize()?;
        let output = resolve(&self.output_dir)?;
        if input.starts_with(&output) {
            return Err(RefgenError::Config(format!(
                "Output directory {} would clear the input directory {}",
                self.output_dir.display(),
                self.input_dir.display()
            )));
        }

        Ok(())
    }
}

/// Where `path` points once created.
///
/// Existing prefixes are canonicalized as the path is walked, so `..` after a
/// missing component and symlinks both resolve to the directory a reset would
/// actually clear.
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => {
                resolved.push(other);
                if resolved.exists() {
                    resolved = resolved.canonicalize()?;
                }
            }
        }
    }
    Ok(resolved)
}
