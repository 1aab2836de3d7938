//! NCBI E-utilities client.
//!
//! Endpoints used:
//!   elink:  citation counts via the `pubmed_pubmed_citedin` link set
//!   efetch: article metadata as PubMed XML
//!
//! Every request is attempted once. Requests are spaced by a minimum interval
//! (NCBI allows 10 requests/second with an API key, 3 without).

use crate::error::{RefgenError, Result};
use crate::record::{Author, CitationRecord, Pmid};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// E-utilities base URL
pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Tool name reported to NCBI
const TOOL: &str = "refgen";

/// Link set holding the PubMed articles that cite a given PMID
const CITED_IN_LINK: &str = "pubmed_pubmed_citedin";

/// Minimum spacing between consecutive requests
struct Throttle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let delay = match self.last.lock() {
            Ok(mut last) => {
                let now = Instant::now();
                let delay = last
                    .map(|t| (t + self.interval).saturating_duration_since(now))
                    .unwrap_or_default();
                *last = Some(now + delay);
                delay
            }
            Err(_) => Duration::ZERO,
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// E-utilities client for citation counts and article metadata
pub struct EntrezClient {
    client: reqwest::Client,
    base_url: String,
    email: String,
    api_key: String,
    throttle: Throttle,
}

impl EntrezClient {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `email` - Contact address sent with every request
    /// * `api_key` - NCBI API key
    /// * `interval` - Minimum delay between requests
    pub fn new(email: &str, api_key: &str, interval: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("{}/{} (mailto:{})", TOOL, env!("CARGO_PKG_VERSION"), email))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RefgenError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: EUTILS_BASE_URL.to_string(),
            email: email.to_string(),
            api_key: api_key.to_string(),
            throttle: Throttle::new(interval),
        })
    }

    /// Point the client at another E-utilities host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn credentials(&self) -> [(&'static str, &str); 3] {
        [
            ("api_key", self.api_key.as_str()),
            ("email", self.email.as_str()),
            ("tool", TOOL),
        ]
    }

    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String> {
        self.throttle.wait().await;

        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&self.credentials())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = endpoint, status = %status, "E-utilities request failed");
            return Err(RefgenError::Api {
                code: status.as_u16(),
                message: format!("{} returned {}", endpoint, status),
            });
        }

        Ok(response.text().await?)
    }

    /// Number of PubMed articles citing `pmid`
    #[instrument(skip_all, fields(pmid = %pmid))]
    pub async fn citation_count(&self, pmid: &Pmid) -> Result<u32> {
        if !pmid.is_valid() {
            return Err(RefgenError::InvalidPmid(pmid.to_string()));
        }

        let body = self
            .get(
                "elink.fcgi",
                &[
                    ("dbfrom", "pubmed"),
                    ("db", "pubmed"),
                    ("linkname", CITED_IN_LINK),
                    ("id", pmid.as_str()),
                    ("retmode", "json"),
                ],
            )
            .await?;

        let count = parse_elink_count(&body)?;
        debug!(count = count, "Citation count retrieved");
        Ok(count)
    }

    /// Fetch and parse the PubMed record for `pmid`
    #[instrument(skip_all, fields(pmid = %pmid))]
    pub async fn fetch_article(&self, pmid: &Pmid) -> Result<CitationRecord> {
        if !pmid.is_valid() {
            return Err(RefgenError::InvalidPmid(pmid.to_string()));
        }

        let body = self
            .get(
                "efetch.fcgi",
                &[("db", "pubmed"), ("id", pmid.as_str()), ("retmode", "xml")],
            )
            .await?;

        let mut records = parse_efetch(&body)?;
        let position = records.iter().position(|r| r.pmid == *pmid);
        let record = match position {
            Some(idx) => records.swap_remove(idx),
            None => return Err(RefgenError::NotFound(pmid.to_string())),
        };

        if record.title.is_empty() {
            warn!("Article has no title, duplicates will only be matched by PMID");
        }

        debug!(title = %record.title, doi = ?record.doi, "Article fetched");
        Ok(record)
    }
}

// === ELink response types ===

#[derive(Debug, Deserialize)]
struct ELinkResponse {
    #[serde(default)]
    linksets: Vec<ELinkSet>,
    #[serde(rename = "ERROR", default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ELinkSet {
    #[serde(default)]
    linksetdbs: Vec<ELinkSetDb>,
}

#[derive(Debug, Deserialize)]
struct ELinkSetDb {
    #[serde(default)]
    linkname: String,
    #[serde(default)]
    links: Vec<serde_json::Value>,
}

/// Count links in the cited-in link set; a missing link set means zero
fn parse_elink_count(body: &str) -> Result<u32> {
    let response: ELinkResponse = serde_json::from_str(body)?;

    if let Some(message) = response.error {
        return Err(RefgenError::Api { code: 200, message });
    }

    let links = response
        .linksets
        .iter()
        .flat_map(|set| set.linksetdbs.iter())
        .filter(|db| db.linkname == CITED_IN_LINK)
        .map(|db| db.links.len())
        .sum::<usize>();

    u32::try_from(links).map_err(|_| RefgenError::Parse(format!("link count {} overflows", links)))
}

// === EFetch XML parsing ===

/// Accumulates one `<PubmedArticle>` while its events stream past
#[derive(Default)]
struct ArticleBuilder {
    record: CitationRecord,
    pmid: String,
    title: String,
    journal: String,
    year: String,
    medline_date: String,
    family: String,
    given: String,
    collective: String,
    article_id_doi: Option<String>,
    elocation_doi: Option<String>,
    capture_article_id: bool,
    capture_elocation: bool,
}

impl ArticleBuilder {
    fn text(&mut self, path: &[String], text: &str) {
        if ends_with(path, &["MedlineCitation", "PMID"]) && self.pmid.is_empty() {
            self.pmid.push_str(text);
        } else if within(path, "ArticleTitle") {
            self.title.push_str(text);
        } else if ends_with(path, &["Journal", "Title"]) {
            self.journal.push_str(text);
        } else if ends_with(path, &["JournalIssue", "Volume"]) {
            self.record.volume.push_str(text);
        } else if ends_with(path, &["JournalIssue", "Issue"]) {
            self.record.issue.push_str(text);
        } else if ends_with(path, &["JournalIssue", "PubDate", "Year"]) {
            self.year.push_str(text);
        } else if ends_with(path, &["JournalIssue", "PubDate", "MedlineDate"]) {
            self.medline_date.push_str(text);
        } else if ends_with(path, &["Pagination", "MedlinePgn"]) {
            self.record.pages.push_str(text);
        } else if ends_with(path, &["AuthorList", "Author", "LastName"]) {
            self.family.push_str(text);
        } else if ends_with(path, &["AuthorList", "Author", "ForeName"]) {
            self.given.push_str(text);
        } else if within(path, "CollectiveName") && within(path, "AuthorList") {
            self.collective.push_str(text);
        } else if self.capture_article_id && ends_with(path, &["ArticleId"]) {
            self.article_id_doi.get_or_insert_with(String::new).push_str(text);
        } else if self.capture_elocation && ends_with(path, &["ELocationID"]) {
            self.elocation_doi.get_or_insert_with(String::new).push_str(text);
        }
    }

    fn finish_author(&mut self) {
        let family = collapse(&std::mem::take(&mut self.family));
        let given = collapse(&std::mem::take(&mut self.given));
        let collective = collapse(&std::mem::take(&mut self.collective));

        if !family.is_empty() {
            self.record.authors.push(Author::new(family, given));
        } else if !collective.is_empty() {
            self.record.authors.push(Author::new(collective, ""));
        }
    }

    fn build(self) -> CitationRecord {
        let mut record = self.record;
        record.pmid = Pmid::new(&self.pmid);
        record.title = collapse(&self.title);
        record.journal = collapse(&self.journal);
        record.volume = collapse(&record.volume);
        record.issue = collapse(&record.issue);
        record.pages = collapse(&record.pages);
        record.year = parse_year(&self.year).or_else(|| parse_year(&self.medline_date));
        record.doi = self
            .article_id_doi
            .or(self.elocation_doi)
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        record
    }
}

/// Parse an EFetch `PubmedArticleSet` into records.
///
/// DOIs are taken from `PubmedData/ArticleIdList`, falling back to the
/// article's `ELocationID`; identifiers inside reference lists are ignored.
pub fn parse_efetch(xml: &str) -> Result<Vec<CitationRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<ArticleBuilder> = None;
    let mut records = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = element_name(&e);
                match name.as_str() {
                    "PubmedArticle" => current = Some(ArticleBuilder::default()),
                    "ArticleId" => {
                        if let Some(article) = current.as_mut() {
                            article.capture_article_id = within(&path, "PubmedData")
                                && !within(&path, "ReferenceList")
                                && article.article_id_doi.is_none()
                                && attribute(&e, b"IdType").as_deref() == Some("doi");
                        }
                    }
                    "ELocationID" => {
                        if let Some(article) = current.as_mut() {
                            article.capture_elocation = article.elocation_doi.is_none()
                                && attribute(&e, b"EIdType").as_deref() == Some("doi");
                        }
                    }
                    _ => {}
                }
                path.push(name);
            }
            Event::Text(e) => {
                if let Some(article) = current.as_mut() {
                    let text = e
                        .unescape()
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    article.text(&path, &text);
                }
            }
            Event::CData(e) => {
                if let Some(article) = current.as_mut() {
                    article.text(&path, &String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                if let Some(article) = current.as_mut() {
                    match name.as_str() {
                        "Author" if within(&path, "AuthorList") => article.finish_author(),
                        "ArticleId" => article.capture_article_id = false,
                        "ELocationID" => article.capture_elocation = false,
                        _ => {}
                    }
                }
                if name == "PubmedArticle" {
                    if let Some(article) = current.take() {
                        let record = article.build();
                        if record.pmid.is_valid() {
                            records.push(record);
                        } else {
                            warn!("Skipping PubmedArticle without PMID");
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn within(path: &[String], name: &str) -> bool {
    path.iter().any(|p| p == name)
}

fn ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First run of four digits, e.g. `2019` from `2019 Nov-Dec`
fn parse_year(s: &str) -> Option<i32> {
    s.as_bytes()
        .windows(4)
        .find(|w| w.iter().all(u8::is_ascii_digit))
        .and_then(|w| std::str::from_utf8(w).ok())
        .and_then(|y| y.parse().ok())
}
