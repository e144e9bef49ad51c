//! Paper ingestion into the local index.
//!
//! Reads paper records from a JSON array or JSON Lines file and upserts them
//! into the `papers` table and its FTS5 mirror. Records are deduplicated by
//! a SHA-256 of the normalized `(title, year)` key, so re-ingesting the same
//! file is a no-op apart from refreshed metadata.

use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

use evidence_harness_core::merge::dedup_key;

use crate::config::Config;
use crate::db;
use crate::migrate;

/// One paper as it appears in an ingest file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PaperRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, rename = "abstract", alias = "abstract_text")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub read: usize,
    pub skipped: usize,
    pub upserted: usize,
}

pub async fn run_ingest(config: &Config, path: &Path, dry_run: bool) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ingest file: {}", path.display()))?;
    let records = parse_records(&content)
        .with_context(|| format!("Failed to parse ingest file: {}", path.display()))?;

    if dry_run {
        let valid = records.iter().filter(|r| !r.title.trim().is_empty()).count();
        println!("ingest {} (dry-run)", path.display());
        println!("  records read: {}", records.len());
        println!("  would upsert: {}", valid);
        println!("  would skip: {}", records.len() - valid);
        return Ok(());
    }

    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;
    let stats = ingest_records(&pool, &records).await?;

    println!("ingest {}", path.display());
    println!("  records read: {}", stats.read);
    println!("  upserted papers: {}", stats.upserted);
    println!("  skipped: {}", stats.skipped);
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Parse a JSON array of records, or one JSON object per line.
pub fn parse_records(content: &str) -> Result<Vec<PaperRecord>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("Invalid JSON array of paper records");
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid JSON on line {}", i + 1))
        })
        .collect()
}

/// SHA-256 over the normalized `(title, year)` key, hex encoded.
pub fn dedup_hash(title: &str, year: Option<i32>) -> String {
    let (title, year) = dedup_key(title, year);
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    if let Some(y) = year {
        hasher.update(y.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

pub async fn ingest_records(pool: &SqlitePool, records: &[PaperRecord]) -> Result<IngestStats> {
    let mut stats = IngestStats {
        read: records.len(),
        ..Default::default()
    };

    for (i, record) in records.iter().enumerate() {
        if record.title.trim().is_empty() {
            warn!(record = i, "skipping paper record with empty title");
            stats.skipped += 1;
            continue;
        }
        let id = upsert_paper(pool, record).await?;
        debug!(paper_id = %id, "upserted paper");
        stats.upserted += 1;
    }

    Ok(stats)
}

async fn upsert_paper(pool: &SqlitePool, record: &PaperRecord) -> Result<String> {
    let title = evidence_harness_core::text::collapse_whitespace(&record.title);
    let hash = dedup_hash(&title, record.year);

    let existing_id: Option<String> =
        sqlx::query_scalar("SELECT id FROM papers WHERE dedup_hash = ?")
            .bind(&hash)
            .fetch_optional(pool)
            .await?;

    let paper_id = existing_id
        .or_else(|| record.id.clone().filter(|id| !id.trim().is_empty()))
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let abstract_text = record.abstract_text.clone().unwrap_or_default();
    let authors = serde_json::to_string(&record.authors)?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO papers (id, title, year, abstract, authors, venue, url, dedup_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(dedup_hash) DO UPDATE SET
            title = excluded.title,
            abstract = excluded.abstract,
            authors = excluded.authors,
            venue = excluded.venue,
            url = excluded.url
        "#,
    )
    .bind(&paper_id)
    .bind(&title)
    .bind(record.year)
    .bind(&abstract_text)
    .bind(&authors)
    .bind(&record.venue)
    .bind(&record.url)
    .bind(&hash)
    .bind(chrono::Utc::now().timestamp())
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM papers_fts WHERE paper_id = ?")
        .bind(&paper_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO papers_fts (paper_id, title, abstract) VALUES (?, ?, ?)")
        .bind(&paper_id)
        .bind(&title)
        .bind(&abstract_text)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(paper_id)
}
