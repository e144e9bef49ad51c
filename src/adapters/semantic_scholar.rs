//! Semantic Scholar adapter over the Graph API paper search.

use async_trait::async_trait;
use serde::Deserialize;

use evidence_harness_core::text::collapse_whitespace;
use evidence_harness_core::{AdapterError, ExternalResultItem, SourceAdapter};

use super::{api_key_from_env, check_status, map_reqwest, rank_relevance, snippet};
use crate::config::SemanticScholarConfig;

/// The API rejects larger page sizes.
const MAX_LIMIT: usize = 100;
const FIELDS: &str = "title,abstract,year,venue,url";

pub struct SemanticScholarAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarAdapter {
    pub fn new(client: reqwest::Client, config: &SemanticScholarConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key_from_env(&config.api_key_env),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct S2Paper {
    pub paper_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

pub(crate) fn to_items(papers: Vec<S2Paper>) -> Vec<ExternalResultItem> {
    let n = papers.len();
    papers
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let snippet = match (&p.abstract_text, &p.venue) {
                (Some(a), _) if !a.trim().is_empty() => snippet(a),
                (_, Some(v)) => collapse_whitespace(v),
                _ => String::new(),
            };
            ExternalResultItem {
                paper_id: format!("s2:{}", p.paper_id),
                title: collapse_whitespace(p.title.as_deref().unwrap_or_default()),
                year: p.year,
                relevance: rank_relevance(i, n),
                snippet,
                source_name: "semantic_scholar".to_string(),
                url: p.url,
            }
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for SemanticScholarAdapter {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    fn description(&self) -> &str {
        "Semantic Scholar cross-disciplinary paper search"
    }

    async fn fetch(
        &self,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<ExternalResultItem>, AdapterError> {
        if query_text.trim().is_empty() {
            return Err(AdapterError::Empty);
        }

        let limit = limit.clamp(1, MAX_LIMIT).to_string();
        let mut request = self
            .client
            .get(format!("{}/paper/search", self.base_url))
            .query(&[
                ("query", query_text),
                ("limit", limit.as_str()),
                ("fields", FIELDS),
            ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(map_reqwest)?;
        let parsed: SearchResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(map_reqwest)?;

        let items = to_items(parsed.data);
        if items.is_empty() {
            return Err(AdapterError::Empty);
        }
        Ok(items)
    }
}
