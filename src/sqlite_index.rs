//! SQLite FTS5 implementation of [`LocalSearch`].
//!
//! Query text is split into tokens, each token is quoted (so FTS5 operators
//! in user input are treated as plain words), and the tokens are OR-joined.
//! BM25 rank is negated so larger is better, then min-max normalized into
//! `[0, 1]` across the returned rows.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use evidence_harness_core::index::normalize_scores;
use evidence_harness_core::text::tokens;
use evidence_harness_core::{LocalResultItem, LocalResultSet, LocalSearch};

use crate::config::Config;
use crate::db;

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn paper_count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM papers")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

/// Build an FTS5 MATCH expression, or `None` if the text has no tokens.
pub fn fts_query(text: &str) -> Option<String> {
    let mut toks = tokens(text);
    toks.dedup();
    if toks.is_empty() {
        return None;
    }
    Some(
        toks.iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

#[async_trait]
impl LocalSearch for SqliteIndex {
    async fn search(&self, query_text: &str, limit: usize) -> Result<LocalResultSet> {
        let Some(match_expr) = fts_query(query_text) else {
            return Ok(LocalResultSet::empty());
        };

        let rows = sqlx::query(
            r#"
            SELECT papers.id AS id, papers.title AS title, papers.year AS year,
                   papers_fts.rank AS rank,
                   snippet(papers_fts, 2, '', '', '...', 32) AS snippet
            FROM papers_fts
            JOIN papers ON papers.id = papers_fts.paper_id
            WHERE papers_fts MATCH ?
            ORDER BY papers_fts.rank
            LIMIT ?
            "#,
        )
        .bind(&match_expr)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let raw: Vec<f64> = rows
            .iter()
            .map(|row| row.try_get::<f64, _>("rank").map(|rank| -rank))
            .collect::<Result<_, _>>()?;

        let mut items = Vec::with_capacity(rows.len());
        for (row, relevance) in rows.iter().zip(normalize_scores(&raw)) {
            let title: String = row.try_get("title")?;
            let snippet: String = row.try_get::<Option<String>, _>("snippet")?.unwrap_or_default();
            items.push(LocalResultItem {
                paper_id: row.try_get("id")?,
                snippet: if snippet.trim().is_empty() {
                    title.clone()
                } else {
                    snippet
                },
                title,
                year: row.try_get("year")?,
                relevance,
            });
        }

        Ok(LocalResultSet::new(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts_query_quotes_and_ors() {
        assert_eq!(
            fts_query("deep learning").as_deref(),
            Some("\"deep\" OR \"learning\"")
        );
    }

    #[test]
    fn test_fts_query_neutralizes_operators() {
        assert_eq!(
            fts_query("NEAR(\"x\" AND y*)").as_deref(),
            Some("\"near\" OR \"x\" OR \"and\" OR \"y\"")
        );
    }

    #[test]
    fn test_fts_query_empty() {
        assert_eq!(fts_query("  -- "), None);
    }

    async fn seeded() -> (tempfile::TempDir, SqliteIndex) {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = db::open(&tmp.path().join("papers.sqlite")).await.unwrap();
        crate::migrate::migrate(&pool).await.unwrap();
        let records = crate::ingest::parse_records(
            r#"[
                {"id": "a", "title": "Graph attention networks", "year": 2018,
                 "abstract": "Attention over graph neighbourhoods."},
                {"id": "b", "title": "Protein structure prediction", "year": 2021,
                 "abstract": "Deep networks fold proteins."},
                {"id": "c", "title": "Soil carbon dynamics", "year": 2015}
            ]"#,
        )
        .unwrap();
        crate::ingest::ingest_records(&pool, &records).await.unwrap();
        (tmp, SqliteIndex::new(pool))
    }

    #[tokio::test]
    async fn test_search_ranks_and_normalizes() {
        let (_tmp, index) = seeded().await;
        assert_eq!(index.paper_count().await.unwrap(), 3);

        let results = index.search("graph attention", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.items()[0].paper_id, "a");
        assert_eq!(results.items()[0].relevance, 1.0);

        let results = index.search("networks", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|i| (0.0..=1.0).contains(&i.relevance)));
    }

    #[tokio::test]
    async fn test_search_snippet_falls_back_to_title() {
        let (_tmp, index) = seeded().await;
        let results = index.search("soil", 5).await.unwrap();
        assert_eq!(results.items()[0].snippet, "Soil carbon dynamics");
    }

    #[tokio::test]
    async fn test_search_without_tokens_is_empty() {
        let (_tmp, index) = seeded().await;
        assert!(index.search("?!", 5).await.unwrap().is_empty());
    }
}
