//! End-to-end tests against mocked E-utilities and Crossref endpoints.
//!
//! No real API calls are made; wiremock serves ELink JSON, EFetch XML and
//! Crossref works responses.

use refgen::config::{Config, Credentials};
use refgen::crossref::CrossrefClient;
use refgen::entrez::EntrezClient;
use refgen::pipeline::{Pipeline, FINALIZED_BIB, RUN_SUMMARY, SPREADSHEET};
use refgen::record::Pmid;
use refgen::source::{MetadataSource, PubMedSource};
use refgen::RefgenError;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMAIL: &str = "reviewer@example.org";
const API_KEY: &str = "0123456789abcdef";

fn elink_body(pmid: &str, links: usize) -> String {
    let links: Vec<String> = (0..links).map(|i| format!("\"{}\"", 900 + i)).collect();
    let linksetdbs = if links.is_empty() {
        String::new()
    } else {
        format!(
            r#","linksetdbs":[{{"dbto":"pubmed","linkname":"pubmed_pubmed_citedin","links":[{}]}}]"#,
            links.join(",")
        )
    };
    format!(
        r#"{{"header":{{"type":"elink","version":"0.3"}},"linksets":[{{"dbfrom":"pubmed","ids":["{}"]{}}}]}}"#,
        pmid, linksetdbs
    )
}

fn efetch_body(pmid: &str, title: &str, family: &str) -> String {
    format!(
        r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">{pmid}</PMID>
      <Article>
        <Journal>
          <JournalIssue><Volume>12</Volume><Issue>3</Issue><PubDate><Year>2021</Year></PubDate></JournalIssue>
          <Title>Journal of Sleep Research</Title>
        </Journal>
        <ArticleTitle>{title}</ArticleTitle>
        <Pagination><MedlinePgn>e13210</MedlinePgn></Pagination>
        <AuthorList>
          <Author><LastName>{family}</LastName><ForeName>Maria</ForeName></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList><ArticleId IdType="pubmed">{pmid}</ArticleId></ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#
    )
}

async fn mount_count(server: &MockServer, pmid: &str, links: usize) {
    Mock::given(method("GET"))
        .and(path("/elink.fcgi"))
        .and(query_param("id", pmid))
        .and(query_param("linkname", "pubmed_pubmed_citedin"))
        .and(query_param("api_key", API_KEY))
        .and(query_param("tool", "refgen"))
        .respond_with(ResponseTemplate::new(200).set_body_string(elink_body(pmid, links)))
        .mount(server)
        .await;
}

async fn mount_record(server: &MockServer, pmid: &str, title: &str, family: &str) {
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .and(query_param("id", pmid))
        .and(query_param("retmode", "xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(efetch_body(pmid, title, family))
                .insert_header("content-type", "text/xml"),
        )
        .mount(server)
        .await;
}

async fn mount_crossref(server: &MockServer, title: &str, doi: &str) {
    let body = serde_json::json!({
        "status": "ok",
        "message": {
            "items": [{
                "DOI": doi,
                "title": [title],
                "author": [{"given": "Maria", "family": "Garcia"}],
                "container-title": ["Journal of Sleep Research"],
                "published": {"date-parts": [[2021, 3]]}
            }]
        }
    });
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn source(server: &MockServer, crossref: bool) -> PubMedSource {
    let entrez = EntrezClient::new(EMAIL, API_KEY, Duration::ZERO)
        .expect("client builds")
        .with_base_url(server.uri());
    let crossref = crossref.then(|| {
        CrossrefClient::new(EMAIL)
            .expect("client builds")
            .with_base_url(server.uri())
    });
    PubMedSource::new(entrez, crossref)
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

#[tokio::test]
async fn test_citation_count_from_elink() {
    let server = MockServer::start().await;
    mount_count(&server, "111", 3).await;
    mount_count(&server, "222", 0).await;

    let source = source(&server, false);
    assert_eq!(source.citation_count(&Pmid::new("111")).await.ok(), Some(3));
    assert_eq!(source.citation_count(&Pmid::new("222")).await.ok(), Some(0));
}

#[tokio::test]
async fn test_http_error_is_reported_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/elink.fcgi"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let source = source(&server, false);
    let result = source.citation_count(&Pmid::new("333")).await;
    assert!(matches!(result, Err(RefgenError::Api { code: 500, .. })));
}

#[tokio::test]
async fn test_invalid_pmid_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let source = source(&server, false);
    let result = source.fetch_record(&Pmid::new("PMC7092803")).await;
    assert!(matches!(result, Err(RefgenError::InvalidPmid(_))));
}

#[tokio::test]
async fn test_doi_recovered_only_on_title_match() {
    let server = MockServer::start().await;
    mount_record(&server, "111", "Sleep loss and memory consolidation.", "García").await;
    mount_record(&server, "222", "An unrelated study", "Okafor").await;
    mount_crossref(&server, "Sleep Loss and Memory Consolidation", "10.5555/jsr.2021.001").await;

    let source = source(&server, true);

    let matched = source
        .fetch_record(&Pmid::new("111"))
        .await
        .expect("record fetched");
    assert_eq!(matched.doi.as_deref(), Some("10.5555/jsr.2021.001"));
    assert_eq!(matched.journal, "Journal of Sleep Research");
    assert_eq!(matched.year, Some(2021));

    let unmatched = source
        .fetch_record(&Pmid::new("222"))
        .await
        .expect("record fetched");
    assert_eq!(unmatched.doi, None);
}

#[tokio::test]
async fn test_untitled_article_is_kept() {
    let server = MockServer::start().await;
    mount_record(&server, "555", "", "Okafor").await;

    let record = source(&server, true)
        .fetch_record(&Pmid::new("555"))
        .await
        .expect("untitled record is returned");
    assert_eq!(record.pmid, Pmid::new("555"));
    assert!(record.title.is_empty());
    assert_eq!(record.authors.len(), 1);
}

#[tokio::test]
async fn test_crossref_failure_keeps_record() {
    let server = MockServer::start().await;
    mount_record(&server, "111", "Sleep loss and memory consolidation.", "García").await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let record = source(&server, true)
        .fetch_record(&Pmid::new("111"))
        .await
        .expect("record survives enrichment failure");
    assert_eq!(record.doi, None);
}

#[tokio::test]
async fn test_full_run_against_mocked_apis() {
    let server = MockServer::start().await;
    mount_count(&server, "111", 3).await;
    mount_count(&server, "222", 0).await;
    Mock::given(method("GET"))
        .and(path("/elink.fcgi"))
        .and(query_param("id", "333"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_count(&server, "444", 5).await;

    mount_record(&server, "111", "Sleep loss and memory consolidation.", "García").await;
    mount_record(&server, "444", "Sleep Loss and Memory  Consolidation", "Lee").await;
    mount_crossref(&server, "Sleep loss and memory consolidation", "10.5555/jsr.2021.001").await;

    let root = tempfile::tempdir().expect("tempdir");
    let config = Config::new(
        Credentials::new(EMAIL, API_KEY),
        root.path().join("input"),
        root.path().join("output"),
    )
    .with_threshold(2);
    std::fs::create_dir(&config.input_dir).expect("input dir");
    std::fs::write(config.input_dir.join("general.txt"), "111\n222\n333\n").expect("batch");
    std::fs::write(config.input_dir.join("needs.txt"), "444\n").expect("batch");
    config.validate().expect("valid config");

    let source = source(&server, true);
    let summary = Pipeline::new(&config, &source)
        .run()
        .await
        .expect("pipeline runs");

    let out = &config.output_dir;
    assert_eq!(read(&out.join("general_in_threshold.txt")), "111\n");
    assert_eq!(read(&out.join("general_sub_threshold.txt")), "222\n333\n");
    assert!(read(&out.join("general_error.txt")).starts_with("333\tcitation_count\t"));
    assert_eq!(read(&out.join("needs_in_threshold.txt")), "444\n");

    let counts = &summary.counts;
    assert_eq!(counts.initial, 4);
    assert_eq!(counts.excluded_by_threshold, 1);
    assert_eq!(counts.count_failures, 1);
    assert_eq!(counts.combined, 2);
    assert_eq!(counts.duplicates_removed, 1);
    assert_eq!(counts.final_count, 1);

    let finalized = read(&out.join(FINALIZED_BIB));
    assert_eq!(finalized.matches("@article").count(), 1);
    assert!(finalized.contains("doi = {10.5555/jsr.2021.001}"));
    assert!(finalized.contains("pmid = 111"));

    let csv = read(&out.join(SPREADSHEET));
    assert_eq!(csv.lines().count(), 2);

    let json: serde_json::Value =
        serde_json::from_str(&read(&out.join(RUN_SUMMARY))).expect("summary json");
    assert_eq!(json["counts"]["final"], 1);

    let leftovers: Vec<_> = std::fs::read_dir(out)
        .expect("output dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".refgen-staging-"))
        .collect();
    assert!(leftovers.is_empty());
}
