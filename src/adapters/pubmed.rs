//! PubMed adapter over NCBI E-utilities.
//!
//! Two requests per search:
//!
//! 1. `esearch.fcgi` (`retmode=json`, `sort=relevance`) returns PMIDs.
//! 2. `efetch.fcgi` (`retmode=xml`) returns the article records, which are
//!    parsed for PMID, title, abstract sections, journal, and year.
//!
//! Results keep the esearch ranking. An optional API key (from the
//! environment) and contact email are forwarded as NCBI recommends.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use evidence_harness_core::text::collapse_whitespace;
use evidence_harness_core::{AdapterError, ExternalResultItem, SourceAdapter};

use super::{api_key_from_env, check_status, leading_year, map_reqwest, rank_relevance, snippet};
use crate::config::PubmedConfig;

pub struct PubmedAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    email: Option<String>,
}

impl PubmedAdapter {
    pub fn new(client: reqwest::Client, config: &PubmedConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key_from_env(&config.api_key_env),
            email: config.email.clone(),
        }
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("db", "pubmed".to_string())];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
            params.push(("tool", "evidence-harness".to_string()));
        }
        params
    }

    async fn search_ids(&self, query_text: &str, limit: usize) -> Result<Vec<String>, AdapterError> {
        let mut params = self.common_params();
        params.push(("term", query_text.to_string()));
        params.push(("retmax", limit.to_string()));
        params.push(("retmode", "json".to_string()));
        params.push(("sort", "relevance".to_string()));

        let response = self
            .client
            .get(format!("{}/esearch.fcgi", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(map_reqwest)?;
        let parsed: EsearchResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(map_reqwest)?;

        Ok(parsed.esearchresult.idlist)
    }

    async fn fetch_articles(&self, ids: &[String]) -> Result<Vec<PubmedArticle>, AdapterError> {
        let mut params = self.common_params();
        params.push(("id", ids.join(",")));
        params.push(("retmode", "xml".to_string()));

        let response = self
            .client
            .get(format!("{}/efetch.fcgi", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(map_reqwest)?;
        let body = check_status(response)
            .await?
            .text()
            .await
            .map_err(map_reqwest)?;

        parse_articles(&body)
    }
}

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct PubmedArticle {
    pub pmid: String,
    pub title: String,
    pub abstract_text: String,
    pub journal: String,
    pub year: Option<i32>,
}

fn xml_err(e: impl std::fmt::Display) -> AdapterError {
    AdapterError::Malformed(format!("invalid efetch XML: {}", e))
}

fn append(slot: &mut String, text: &str) {
    if !slot.is_empty() {
        slot.push(' ');
    }
    slot.push_str(text);
}

/// Parse an efetch `PubmedArticleSet` document.
///
/// Inline markup inside titles and abstracts (`<i>`, `<sup>`, ...) is
/// flattened to text. Labelled abstract sections are prefixed with their
/// label.
pub(crate) fn parse_articles(xml: &str) -> Result<Vec<PubmedArticle>, AdapterError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut articles = Vec::new();
    let mut current: Option<PubmedArticle> = None;
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "PubmedArticle" => current = Some(PubmedArticle::default()),
                    "AbstractText" => {
                        if let Some(article) = current.as_mut() {
                            if let Some(label) = e.try_get_attribute("Label").map_err(xml_err)? {
                                let label = label.unescape_value().map_err(xml_err)?;
                                append(&mut article.abstract_text, &format!("{}:", label));
                            }
                        }
                    }
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Text(t)) => {
                let Some(article) = current.as_mut() else {
                    buf.clear();
                    continue;
                };
                let text = t.unescape().map_err(xml_err)?;
                let within = |name: &str| path.iter().any(|p| p == name);
                let leaf = path.last().map(String::as_str);
                let parent = path.len().checked_sub(2).map(|i| path[i].as_str());

                if within("ArticleTitle") {
                    append(&mut article.title, &text);
                } else if within("AbstractText") {
                    append(&mut article.abstract_text, &text);
                } else if leaf == Some("PMID")
                    && parent == Some("MedlineCitation")
                    && article.pmid.is_empty()
                {
                    article.pmid = text.trim().to_string();
                } else if leaf == Some("Title") && parent == Some("Journal") {
                    append(&mut article.journal, &text);
                } else if within("PubDate") && article.year.is_none() {
                    if leaf == Some("Year") {
                        article.year = text.trim().parse().ok();
                    } else if leaf == Some("MedlineDate") {
                        article.year = leading_year(&text);
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"PubmedArticle" {
                    if let Some(article) = current.take() {
                        if !article.pmid.is_empty() {
                            articles.push(article);
                        }
                    }
                }
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(articles)
}

/// Order `articles` by their position in `ids` and convert them.
pub(crate) fn to_items(ids: &[String], articles: Vec<PubmedArticle>) -> Vec<ExternalResultItem> {
    let mut ranked: Vec<(usize, PubmedArticle)> = articles
        .into_iter()
        .map(|a| {
            let pos = ids.iter().position(|id| *id == a.pmid).unwrap_or(usize::MAX);
            (pos, a)
        })
        .collect();
    ranked.sort_by_key(|(pos, _)| *pos);

    let n = ranked.len();
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (_, a))| ExternalResultItem {
            paper_id: format!("pmid:{}", a.pmid),
            title: collapse_whitespace(&a.title),
            year: a.year,
            relevance: rank_relevance(i, n),
            snippet: if a.abstract_text.is_empty() {
                collapse_whitespace(&a.journal)
            } else {
                snippet(&a.abstract_text)
            },
            source_name: "pubmed".to_string(),
            url: Some(format!("https://pubmed.ncbi.nlm.nih.gov/{}/", a.pmid)),
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for PubmedAdapter {
    fn name(&self) -> &str {
        "pubmed"
    }

    fn description(&self) -> &str {
        "PubMed biomedical literature (NCBI E-utilities)"
    }

    async fn fetch(
        &self,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<ExternalResultItem>, AdapterError> {
        if query_text.trim().is_empty() {
            return Err(AdapterError::Empty);
        }

        let ids = self.search_ids(query_text, limit).await?;
        if ids.is_empty() {
            return Err(AdapterError::Empty);
        }

        let items = to_items(&ids, self.fetch_articles(&ids).await?);
        if items.is_empty() {
            return Err(AdapterError::Empty);
        }
        Ok(items)
    }
}
