use anyhow::Result;

use evidence_harness_core::LocalSearch;

use crate::config::Config;
use crate::sqlite_index::SqliteIndex;

/// `evh search`: query the local corpus only, never external sources.
pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let index = SqliteIndex::open(config).await?;
    let limit = limit.unwrap_or(config.local.limit).max(1);
    let results = index.search(query, limit).await?;
    index.pool().close().await;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, item) in results.items().iter().enumerate() {
        let year = item
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "----".into());
        println!(
            "{}. [{:.2}] {} ({})",
            i + 1,
            item.relevance,
            item.title,
            year
        );
        println!("    id: {}", item.paper_id);
        if !item.snippet.is_empty() {
            println!("    {}", item.snippet);
        }
    }

    Ok(())
}
