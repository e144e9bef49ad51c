//! arXiv adapter over the public Atom API.
//!
//! Query form: `search_query=all:<t1> AND all:<t2> ...`, optionally
//! restricted with `AND cat:<category>*`, sorted by relevance. The category
//! follows the query's domain label (`technical` → `cs`,
//! `physical-science` → `physics` by default). arXiv reports
//! bad queries as a feed with a single entry whose id points at
//! `/api/errors`; that is surfaced as [`AdapterError::Malformed`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use evidence_harness_core::text::{collapse_whitespace, tokens};
use evidence_harness_core::{AdapterError, DomainLabel, ExternalResultItem, SourceAdapter};

use super::{check_status, leading_year, map_reqwest, rank_relevance, snippet};
use crate::config::ArxivConfig;

pub struct ArxivAdapter {
    client: reqwest::Client,
    base_url: String,
    category: Option<String>,
    categories: BTreeMap<DomainLabel, Option<String>>,
}

impl ArxivAdapter {
    /// Label keys in `config.categories` that do not parse are skipped;
    /// `config::validate` rejects them at load time.
    pub fn new(client: reqwest::Client, config: &ArxivConfig) -> Self {
        let categories = config
            .categories
            .iter()
            .filter_map(|(label, cat)| {
                let label = label.parse::<DomainLabel>().ok()?;
                Some((label, clean_category(cat)))
            })
            .collect();
        Self {
            client,
            base_url: config.base_url.clone(),
            category: config.category.as_deref().and_then(clean_category),
            categories,
        }
    }

    /// Category prefix used for queries routed under `domain`.
    pub fn category_for(&self, domain: DomainLabel) -> Option<&str> {
        match self.categories.get(&domain) {
            Some(cat) => cat.as_deref(),
            None => self.category.as_deref(),
        }
    }

    async fn search(
        &self,
        query_text: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ExternalResultItem>, AdapterError> {
        let search = search_query(query_text, category);
        if search.is_empty() {
            return Err(AdapterError::Empty);
        }

        let max_results = limit.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", search.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(map_reqwest)?;
        let body = check_status(response)
            .await?
            .text()
            .await
            .map_err(map_reqwest)?;

        let items = to_items(parse_feed(&body)?);
        if items.is_empty() {
            return Err(AdapterError::Empty);
        }
        Ok(items)
    }
}

fn clean_category(raw: &str) -> Option<String> {
    Some(raw.trim().trim_end_matches('*').to_string()).filter(|c| !c.is_empty())
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct ArxivEntry {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub published: String,
    pub link: Option<String>,
}

pub(crate) fn search_query(query_text: &str, category: Option<&str>) -> String {
    let terms = tokens(query_text)
        .into_iter()
        .map(|t| format!("all:{}", t))
        .collect::<Vec<_>>()
        .join(" AND ");
    match category {
        Some(cat) if terms.is_empty() => format!("cat:{}*", cat),
        Some(cat) => format!("{} AND cat:{}*", terms, cat),
        None => terms,
    }
}

fn text_err(e: impl std::fmt::Display) -> AdapterError {
    AdapterError::Malformed(format!("invalid Atom feed: {}", e))
}

/// Parse an arXiv Atom feed into its entries.
pub(crate) fn parse_feed(xml: &str) -> Result<Vec<ArxivEntry>, AdapterError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut current: Option<ArxivEntry> = None;
    let mut field: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => current = Some(ArxivEntry::default()),
                b"id" if current.is_some() => field = Some("id"),
                b"title" if current.is_some() => field = Some("title"),
                b"summary" if current.is_some() => field = Some("summary"),
                b"published" if current.is_some() => field = Some("published"),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"link" => {
                if let Some(entry) = current.as_mut() {
                    let rel = e
                        .try_get_attribute("rel")
                        .map_err(text_err)?
                        .map(|a| a.unescape_value().map(|v| v.into_owned()))
                        .transpose()
                        .map_err(text_err)?;
                    if rel.as_deref().unwrap_or("alternate") == "alternate" {
                        if let Some(href) = e.try_get_attribute("href").map_err(text_err)? {
                            entry.link = Some(href.unescape_value().map_err(text_err)?.into_owned());
                        }
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(entry), Some(name)) = (current.as_mut(), field) {
                    let text = t.unescape().map_err(text_err)?;
                    let slot = match name {
                        "id" => &mut entry.id,
                        "title" => &mut entry.title,
                        "summary" => &mut entry.summary,
                        _ => &mut entry.published,
                    };
                    if !slot.is_empty() {
                        slot.push(' ');
                    }
                    slot.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                    field = None;
                }
                b"id" | b"title" | b"summary" | b"published" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(text_err(e)),
            _ => {}
        }
        buf.clear();
    }

    if let Some(err) = entries.iter().find(|e| e.id.contains("/api/errors")) {
        return Err(AdapterError::Malformed(format!(
            "arXiv rejected the query: {}",
            collapse_whitespace(&err.summary)
        )));
    }

    Ok(entries)
}

/// `http://arxiv.org/abs/2401.01234v2` → `2401.01234v2`.
fn arxiv_id(id_url: &str) -> &str {
    id_url
        .rsplit_once("/abs/")
        .map(|(_, id)| id)
        .unwrap_or(id_url)
        .trim()
}

pub(crate) fn to_items(entries: Vec<ArxivEntry>) -> Vec<ExternalResultItem> {
    let n = entries.len();
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| ExternalResultItem {
            paper_id: format!("arxiv:{}", arxiv_id(&e.id)),
            title: collapse_whitespace(&e.title),
            year: leading_year(&e.published),
            relevance: rank_relevance(i, n),
            snippet: snippet(&e.summary),
            source_name: "arxiv".to_string(),
            url: e.link.or_else(|| (!e.id.is_empty()).then(|| e.id.trim().to_string())),
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for ArxivAdapter {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn description(&self) -> &str {
        "arXiv preprints (Atom API)"
    }

    async fn fetch(
        &self,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<ExternalResultItem>, AdapterError> {
        self.search(query_text, self.category.as_deref(), limit)
            .await
    }

    async fn fetch_for(
        &self,
        domain: DomainLabel,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<ExternalResultItem>, AdapterError> {
        self.search(query_text, self.category_for(domain), limit)
            .await
    }
}
