//! Adapters against a local mock of the upstream APIs.

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    extract::Query,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use evidence_harness::adapters::{
    http_client, AdapterRegistry, ArxivAdapter, PubmedAdapter, SemanticScholarAdapter,
};
use evidence_harness::config::{ArxivConfig, PubmedConfig, SemanticScholarConfig};
use evidence_harness::router::Router;
use evidence_harness_core::{
    AdapterError, AttemptStatus, DomainLabel, FailureKind, RoutingTable, SourceAdapter,
};

const UNSET_KEY_ENV: &str = "EVH_TEST_API_KEY_NEVER_SET";

const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/2403.00001v1</id>
    <published>2024-03-01T00:00:00Z</published>
    <title>Mixture of Experts Transformers</title>
    <summary>Sparse experts scale transformers.</summary>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2310.00002v3</id>
    <published>2023-10-02T00:00:00Z</published>
    <title>State Space Models as Transformer Alternatives</title>
    <summary>Linear-time sequence modelling.</summary>
  </entry>
</feed>"#;

const EFETCH_XML: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">38000002</PMID>
      <Article>
        <Journal><Title>JAMA Oncology</Title>
          <JournalIssue><PubDate><Year>2024</Year></PubDate></JournalIssue>
        </Journal>
        <ArticleTitle>Neoadjuvant immunotherapy trial results.</ArticleTitle>
        <Abstract><AbstractText>Pathologic response improved.</AbstractText></Abstract>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">38000001</PMID>
      <Article>
        <Journal><Title>The Lancet</Title>
          <JournalIssue><PubDate><Year>2025</Year></PubDate></JournalIssue>
        </Journal>
        <ArticleTitle>CAR-T therapy in solid tumours.</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

async fn arxiv_query(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let expected = "all:mixture AND all:experts";
    if params.get("search_query").map(String::as_str) != Some(expected)
        || params.get("max_results").map(String::as_str) != Some("5")
    {
        return (StatusCode::BAD_REQUEST, "unexpected query").into_response();
    }
    ([(header::CONTENT_TYPE, "application/atom+xml")], ATOM_FEED).into_response()
}

async fn arxiv_physics(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    match params.get("search_query").map(String::as_str) {
        Some("all:dark AND all:matter AND cat:physics*") => {
            ([(header::CONTENT_TYPE, "application/atom+xml")], ATOM_FEED).into_response()
        }
        _ => (StatusCode::BAD_REQUEST, "unexpected category").into_response(),
    }
}

async fn esearch(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    if params.get("db").map(String::as_str) != Some("pubmed")
        || params.get("retmode").map(String::as_str) != Some("json")
    {
        return (StatusCode::BAD_REQUEST, "unexpected query").into_response();
    }
    Json(json!({
        "header": {"type": "esearch", "version": "0.3"},
        "esearchresult": {"count": "2", "retmax": "2", "idlist": ["38000001", "38000002"]}
    }))
    .into_response()
}

async fn efetch(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    if params.get("id").map(String::as_str) != Some("38000001,38000002") {
        return (StatusCode::BAD_REQUEST, "unexpected ids").into_response();
    }
    ([(header::CONTENT_TYPE, "text/xml")], EFETCH_XML).into_response()
}

async fn s2_search(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    if params.get("fields").map(String::as_str) != Some("title,abstract,year,venue,url") {
        return (StatusCode::BAD_REQUEST, "unexpected fields").into_response();
    }
    Json(json!({
        "total": 1,
        "offset": 0,
        "data": [{
            "paperId": "f00d",
            "title": "A Survey of Retrieval-Augmented Generation",
            "abstract": "We survey RAG.",
            "year": 2024,
            "venue": "ACL",
            "url": "https://www.semanticscholar.org/paper/f00d"
        }]
    }))
    .into_response()
}

async fn rate_limited() -> impl IntoResponse {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, "7")],
        "Too Many Requests",
    )
}

async fn unavailable() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "upstream down")
}

async fn not_json() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], "<html>oops</html>")
}

async fn empty_search() -> impl IntoResponse {
    Json(json!({"total": 0, "offset": 0, "data": []}))
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "too late"
}

async fn spawn_mock() -> String {
    let app = axum::Router::new()
        .route("/arxiv/api/query", get(arxiv_query))
        .route("/arxiv-slow/api/query", get(slow))
        .route("/arxiv-physics/api/query", get(arxiv_physics))
        .route("/eutils/esearch.fcgi", get(esearch))
        .route("/eutils/efetch.fcgi", get(efetch))
        .route("/s2/paper/search", get(s2_search))
        .route("/limited/paper/search", get(rate_limited))
        .route("/down/paper/search", get(unavailable))
        .route("/broken/paper/search", get(not_json))
        .route("/empty/paper/search", get(empty_search));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn arxiv(base: &str, path: &str) -> ArxivAdapter {
    ArxivAdapter::new(
        http_client().unwrap(),
        &ArxivConfig {
            base_url: format!("{}{}", base, path),
            ..Default::default()
        },
    )
}

fn s2(base: &str, prefix: &str) -> SemanticScholarAdapter {
    SemanticScholarAdapter::new(
        http_client().unwrap(),
        &SemanticScholarConfig {
            base_url: format!("{}{}", base, prefix),
            api_key_env: UNSET_KEY_ENV.to_string(),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_arxiv_fetch() {
    let base = spawn_mock().await;
    let items = arxiv(&base, "/arxiv/api/query")
        .fetch("mixture experts", 5)
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].paper_id, "arxiv:2403.00001v1");
    assert_eq!(items[0].title, "Mixture of Experts Transformers");
    assert_eq!(items[0].year, Some(2024));
    assert_eq!(items[0].source_name, "arxiv");
    assert!(items[0].relevance > items[1].relevance);
}

#[tokio::test]
async fn test_arxiv_category_follows_routed_domain() {
    let base = spawn_mock().await;
    let adapter = ArxivAdapter::new(
        http_client().unwrap(),
        &ArxivConfig {
            base_url: format!("{}/arxiv-physics/api/query", base),
            category: Some("cs".to_string()),
            ..Default::default()
        },
    );
    let registry = AdapterRegistry::new()
        .with(std::sync::Arc::new(adapter))
        .unwrap();
    let router = Router::new(RoutingTable::builtin(), registry, Duration::from_secs(2), 5);
    let query = evidence_harness_core::Query::at_year("dark matter", 2025);

    let outcome = router
        .route(DomainLabel::PhysicalScience, &query, &CancellationToken::new())
        .await;
    assert_eq!(outcome.served_by.as_deref(), Some("arxiv"));
    assert_eq!(outcome.results.len(), 2);

    // The same query routed as technical asks for cat:cs* and is rejected.
    let outcome = router
        .route(DomainLabel::Technical, &query, &CancellationToken::new())
        .await;
    assert_eq!(outcome.served_by, None);
    assert_eq!(outcome.attempts[0].failure, Some(FailureKind::Status));
}

#[tokio::test]
async fn test_pubmed_two_step_fetch() {
    let base = spawn_mock().await;
    let adapter = PubmedAdapter::new(
        http_client().unwrap(),
        &PubmedConfig {
            base_url: format!("{}/eutils", base),
            api_key_env: UNSET_KEY_ENV.to_string(),
            ..Default::default()
        },
    );

    let items = adapter.fetch("immunotherapy trials", 10).await.unwrap();
    assert_eq!(items.len(), 2);
    // esearch order wins over efetch document order.
    assert_eq!(items[0].paper_id, "pmid:38000001");
    assert_eq!(items[0].title, "CAR-T therapy in solid tumours.");
    assert_eq!(items[0].snippet, "The Lancet");
    assert_eq!(items[1].paper_id, "pmid:38000002");
    assert_eq!(items[1].snippet, "Pathologic response improved.");
    assert_eq!(items[1].year, Some(2024));
}

#[tokio::test]
async fn test_semantic_scholar_fetch() {
    let base = spawn_mock().await;
    let items = s2(&base, "/s2").fetch("retrieval augmented", 10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].paper_id, "s2:f00d");
    assert_eq!(items[0].snippet, "We survey RAG.");
    assert_eq!(
        items[0].url.as_deref(),
        Some("https://www.semanticscholar.org/paper/f00d")
    );
}

#[tokio::test]
async fn test_error_mapping() {
    let base = spawn_mock().await;

    let err = s2(&base, "/limited").fetch("q", 5).await.unwrap_err();
    assert_eq!(
        err,
        AdapterError::RateLimited {
            retry_after_secs: Some(7)
        }
    );

    let err = s2(&base, "/down").fetch("q", 5).await.unwrap_err();
    assert!(matches!(err, AdapterError::Status { status: 503, ref body } if body == "upstream down"));

    let err = s2(&base, "/broken").fetch("q", 5).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Malformed);

    let err = s2(&base, "/empty").fetch("q", 5).await.unwrap_err();
    assert_eq!(err, AdapterError::Empty);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Grab a free port, then close it.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = s2(&format!("http://{}", addr), "")
        .fetch("q", 5)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Network);
}

#[tokio::test]
async fn test_router_falls_back_over_http() {
    let base = spawn_mock().await;
    let registry = AdapterRegistry::new()
        .with(std::sync::Arc::new(arxiv(&base, "/arxiv-slow/api/query")))
        .and_then(|r| r.with(std::sync::Arc::new(s2(&base, "/s2"))))
        .unwrap();
    let router = Router::new(
        RoutingTable::builtin(),
        registry,
        Duration::from_millis(200),
        10,
    );

    let query = evidence_harness_core::Query::at_year("transformer retrieval", 2025);
    let outcome = router
        .route(DomainLabel::Technical, &query, &CancellationToken::new())
        .await;

    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.attempts[0].adapter, "arxiv");
    assert_eq!(outcome.attempts[0].status, AttemptStatus::TimedOut);
    assert_eq!(outcome.attempts[1].status, AttemptStatus::Success);
    assert_eq!(outcome.served_by.as_deref(), Some("semantic_scholar"));
    assert_eq!(outcome.results.len(), 1);
}
