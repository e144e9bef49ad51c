//! In-memory [`LocalSearch`] implementation for tests and embedding.
//!
//! Papers live in a `Vec` behind `std::sync::RwLock`. Scoring is plain
//! token overlap: each distinct query token found in the title counts 2,
//! found only in the abstract counts 1. Scores are min-max normalized.

use std::collections::HashSet;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::{normalize_scores, LocalSearch};
use crate::models::{LocalResultItem, LocalResultSet};
use crate::text::tokens;

const SNIPPET_CHARS: usize = 240;

/// A paper held by [`InMemoryIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPaper {
    pub paper_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub abstract_text: String,
}

impl IndexedPaper {
    pub fn new(paper_id: impl Into<String>, title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            paper_id: paper_id.into(),
            title: title.into(),
            year,
            abstract_text: String::new(),
        }
    }

    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = text.into();
        self
    }
}

#[derive(Default)]
pub struct InMemoryIndex {
    papers: RwLock<Vec<IndexedPaper>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_papers(papers: impl IntoIterator<Item = IndexedPaper>) -> Self {
        Self {
            papers: RwLock::new(papers.into_iter().collect()),
        }
    }

    pub fn insert(&self, paper: IndexedPaper) {
        let mut papers = self.papers.write().unwrap_or_else(|e| e.into_inner());
        papers.push(paper);
    }

    pub fn len(&self) -> usize {
        self.papers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn score(query: &[String], paper: &IndexedPaper) -> f64 {
    let title: HashSet<String> = tokens(&paper.title).into_iter().collect();
    let body: HashSet<String> = tokens(&paper.abstract_text).into_iter().collect();
    query
        .iter()
        .map(|t| {
            if title.contains(t) {
                2.0
            } else if body.contains(t) {
                1.0
            } else {
                0.0
            }
        })
        .sum()
}

fn snippet(paper: &IndexedPaper) -> String {
    let source = if paper.abstract_text.trim().is_empty() {
        &paper.title
    } else {
        &paper.abstract_text
    };
    let mut s: String = source.chars().take(SNIPPET_CHARS).collect();
    if source.chars().count() > SNIPPET_CHARS {
        s.push_str("...");
    }
    s
}

#[async_trait]
impl LocalSearch for InMemoryIndex {
    async fn search(&self, query_text: &str, limit: usize) -> Result<LocalResultSet> {
        let mut query = tokens(query_text);
        query.sort();
        query.dedup();
        if query.is_empty() || limit == 0 {
            return Ok(LocalResultSet::empty());
        }

        let papers = self.papers.read().unwrap_or_else(|e| e.into_inner());
        let mut hits: Vec<(&IndexedPaper, f64)> = papers
            .iter()
            .map(|p| (p, score(&query, p)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);

        let raw: Vec<f64> = hits.iter().map(|(_, s)| *s).collect();
        let items = hits
            .iter()
            .zip(normalize_scores(&raw))
            .map(|((p, _), relevance)| LocalResultItem {
                paper_id: p.paper_id.clone(),
                title: p.title.clone(),
                year: p.year,
                relevance,
                snippet: snippet(p),
            })
            .collect();

        Ok(LocalResultSet::new(items))
    }
}
