//! Where citation counts and records come from.
//!
//! The pipeline only sees the [`MetadataSource`] trait. [`PubMedSource`] is the
//! production implementation backed by E-utilities, with optional Crossref DOI
//! recovery.

use crate::config::Config;
use crate::crossref::CrossrefClient;
use crate::entrez::EntrezClient;
use crate::error::Result;
use crate::record::{CitationRecord, Pmid};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Lookup of citation counts and bibliographic records by PMID
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Number of articles citing `pmid`
    async fn citation_count(&self, pmid: &Pmid) -> Result<u32>;

    /// Full record for `pmid`
    async fn fetch_record(&self, pmid: &Pmid) -> Result<CitationRecord>;
}

/// NCBI PubMed, with Crossref filling in missing DOIs
pub struct PubMedSource {
    entrez: EntrezClient,
    crossref: Option<CrossrefClient>,
}

impl PubMedSource {
    pub fn new(entrez: EntrezClient, crossref: Option<CrossrefClient>) -> Self {
        Self { entrez, crossref }
    }

    /// Build the production clients from a validated config
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials = &config.credentials;
        let entrez = EntrezClient::new(
            credentials.email.trim(),
            credentials.api_key.trim(),
            config.request_interval,
        )?;
        let crossref = if config.crossref {
            Some(CrossrefClient::new(credentials.email.trim())?)
        } else {
            None
        };
        Ok(Self::new(entrez, crossref))
    }
}

#[async_trait]
impl MetadataSource for PubMedSource {
    async fn citation_count(&self, pmid: &Pmid) -> Result<u32> {
        self.entrez.citation_count(pmid).await
    }

    async fn fetch_record(&self, pmid: &Pmid) -> Result<CitationRecord> {
        let mut record = self.entrez.fetch_article(pmid).await?;

        if record.doi.is_none() {
            if let Some(crossref) = &self.crossref {
                match crossref.find_doi(&record.title).await {
                    Ok(Some(doi)) => record.doi = Some(doi),
                    Ok(None) => debug!(pmid = %pmid, "No DOI found in Crossref"),
                    Err(e) => warn!(pmid = %pmid, error = %e, "Crossref lookup failed"),
                }
            }
        }

        Ok(record)
    }
}
