//! Crossref API client for DOI recovery.
//!
//! PubMed records occasionally lack a DOI. The title is looked up in Crossref's
//! works index and the best hit is accepted only when its title normalizes to
//! the same key as the query.

use crate::error::{RefgenError, Result};
use crate::record::normalize_title;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

/// Crossref API base URL
pub const CROSSREF_API_URL: &str = "https://api.crossref.org";

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("HTML tag pattern is valid"));

/// The fields of a Crossref work needed to verify a hit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossrefWork {
    pub doi: String,
    /// Title with inline markup removed
    pub title: String,
    pub journal: String,
    pub year: Option<i32>,
}

pub struct CrossrefClient {
    client: reqwest::Client,
    base_url: String,
    mailto: String,
}

impl CrossrefClient {
    /// Create a client in Crossref's polite pool
    ///
    /// # Arguments
    ///
    /// * `mailto` - Contact address sent with every request
    pub fn new(mailto: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("refgen/{} (mailto:{})", env!("CARGO_PKG_VERSION"), mailto))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| RefgenError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: CROSSREF_API_URL.to_string(),
            mailto: mailto.to_string(),
        })
    }

    /// Point the client at another Crossref host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Best-matching work for a title, if Crossref returns any
    pub async fn lookup_by_title(&self, title: &str) -> Result<Option<CrossrefWork>> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }

        let url = format!("{}/works", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("query.title", title),
                ("rows", "1"),
                ("select", "DOI,title,container-title,published"),
                ("mailto", self.mailto.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefgenError::Api {
                code: status.as_u16(),
                message: format!("Crossref returned {}", status),
            });
        }

        let data: WorksResponse = response.json().await?;
        Ok(data.message.items.into_iter().next().map(CrossrefWork::from))
    }

    /// DOI for `title`, only when Crossref's best hit has the same normalized title
    pub async fn find_doi(&self, title: &str) -> Result<Option<String>> {
        let Some(work) = self.lookup_by_title(title).await? else {
            return Ok(None);
        };

        if !work.matches_title(title) {
            debug!(
                query = %title.chars().take(40).collect::<String>(),
                found = %work.title,
                "Crossref hit does not match title"
            );
            return Ok(None);
        }

        info!(doi = %work.doi, journal = %work.journal, "DOI recovered from Crossref");
        Ok(Some(work.doi))
    }
}

impl CrossrefWork {
    /// True when this work carries a DOI and its title equals `title` after normalization
    pub fn matches_title(&self, title: &str) -> bool {
        !self.doi.trim().is_empty()
            && !self.title.is_empty()
            && normalize_title(&self.title) == normalize_title(title)
    }
}

// === Crossref API response types ===

#[derive(Debug, Deserialize)]
struct WorksResponse {
    message: WorksMessage,
}

#[derive(Debug, Deserialize)]
struct WorksMessage {
    #[serde(default)]
    items: Vec<WorkItem>,
}

#[derive(Debug, Deserialize)]
struct WorkItem {
    #[serde(rename = "DOI", default)]
    doi: String,
    #[serde(default)]
    title: Vec<String>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(default)]
    published: Option<DateParts>,
}

#[derive(Debug, Deserialize)]
struct DateParts {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl From<WorkItem> for CrossrefWork {
    fn from(item: WorkItem) -> Self {
        let year = item
            .published
            .and_then(|p| p.date_parts.into_iter().next())
            .and_then(|parts| parts.into_iter().next().flatten());

        Self {
            doi: item.doi.trim().to_string(),
            title: item
                .title
                .first()
                .map(|t| strip_html_tags(t))
                .unwrap_or_default(),
            journal: item.container_title.into_iter().next().unwrap_or_default(),
            year,
        }
    }
}

/// Remove inline markup such as `<i>` from Crossref titles
fn strip_html_tags(text: &str) -> String {
    HTML_TAG.replace_all(text, "").trim().to_string()
}
