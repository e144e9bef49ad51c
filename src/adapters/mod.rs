//! External source adapters and the registry the router draws from.
//!
//! | Name | Provider | Transport |
//! |------|----------|-----------|
//! | `arxiv` | arXiv API | Atom XML |
//! | `pubmed` | NCBI E-utilities | esearch JSON + efetch XML |
//! | `semantic_scholar` | Semantic Scholar Graph API | JSON |
//!
//! All adapters share one `reqwest::Client` and the same error mapping:
//! HTTP 429 becomes [`AdapterError::RateLimited`], any other non-success
//! status becomes [`AdapterError::Status`], transport failures become
//! [`AdapterError::Network`], and undecodable bodies become
//! [`AdapterError::Malformed`]. Adapters never retry; fallback is the
//! router's job.

pub mod arxiv;
pub mod pubmed;
pub mod semantic_scholar;

use anyhow::{bail, Result};
use std::sync::Arc;

use evidence_harness_core::{AdapterError, SourceAdapter};

use crate::config::Config;

pub use arxiv::ArxivAdapter;
pub use pubmed::PubmedAdapter;
pub use semantic_scholar::SemanticScholarAdapter;

const SNIPPET_CHARS: usize = 300;

/// Registered adapters, in registration order, keyed by [`SourceAdapter::name`].
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter. Fails if one with the same name is already present.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> Result<()> {
        if self.get(adapter.name()).is_some() {
            bail!("adapter '{}' is already registered", adapter.name());
        }
        self.adapters.push(adapter);
        Ok(())
    }

    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>) -> Result<Self> {
        self.register(adapter)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Build the registry of every adapter enabled in `config`.
pub fn build_registry(config: &Config) -> Result<AdapterRegistry> {
    let client = http_client()?;
    let mut registry = AdapterRegistry::new();
    let adapters = &config.adapters;

    if adapters.arxiv.enabled {
        registry.register(Arc::new(ArxivAdapter::new(client.clone(), &adapters.arxiv)))?;
    }
    if adapters.pubmed.enabled {
        registry.register(Arc::new(PubmedAdapter::new(client.clone(), &adapters.pubmed)))?;
    }
    if adapters.semantic_scholar.enabled {
        registry.register(Arc::new(SemanticScholarAdapter::new(
            client,
            &adapters.semantic_scholar,
        )))?;
    }

    Ok(registry)
}

/// Shared HTTP client. Per-call deadlines are enforced by the router.
pub fn http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("evidence-harness/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Read an API key from the named environment variable, ignoring blanks.
pub(crate) fn api_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}

/// Pass a successful response through; map anything else to an [`AdapterError`].
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 429 {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        return Err(AdapterError::RateLimited { retry_after_secs });
    }

    let body = response.text().await.unwrap_or_default();
    Err(AdapterError::Status {
        status: status.as_u16(),
        body: truncate(&body, 200),
    })
}

pub(crate) fn map_reqwest(err: reqwest::Error) -> AdapterError {
    if err.is_decode() {
        AdapterError::Malformed(err.to_string())
    } else {
        AdapterError::Network(err.to_string())
    }
}

/// Rank-based relevance: the first of `n` items scores 1.0, decreasing
/// linearly.
pub(crate) fn rank_relevance(index: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    1.0 - index as f64 / n as f64
}

pub(crate) fn snippet(text: &str) -> String {
    truncate(
        &evidence_harness_core::text::collapse_whitespace(text),
        SNIPPET_CHARS,
    )
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Leading four-digit year in a date-ish string (`"2019-03-01"`, `"2019 Nov-Dec"`).
pub(crate) fn leading_year(s: &str) -> Option<i32> {
    let digits: String = s.trim().chars().take(4).collect();
    if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}
