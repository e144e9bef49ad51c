//! Read-only inspection commands: `evh classify` and `evh check`.

use anyhow::Result;

use evidence_harness_core::{DomainClassifier, Intent, LocalSearch, SufficiencyChecker};

use crate::config::Config;
use crate::orchestrator::build_query;
use crate::sqlite_index::SqliteIndex;

/// `evh check`: run local search and print the sufficiency verdict.
pub async fn run_check(config: &Config, text: &str, intent: Option<Intent>) -> Result<()> {
    let index = SqliteIndex::open(config).await?;
    let query = build_query(text, intent);
    let local = index.search(query.text(), config.local.limit).await?;
    let verdict = SufficiencyChecker::new(config.sufficiency.clone()).check(&query, &local);

    println!("query: {}", query.text());
    if let Some(intent) = query.intent() {
        println!("intent: {}", intent);
    }
    println!("requires_latest: {}", query.requires_latest());
    println!("local_results: {}", local.len());
    println!("sufficient: {}", verdict.sufficient);
    println!("reason: {}", verdict.reason);
    if let Some(t) = &verdict.threshold {
        println!("threshold: {}", t);
    }
    Ok(())
}

/// `evh classify`: print the domain label and the terms that selected it.
pub fn run_classify(config: &Config, text: &str) -> Result<()> {
    let classifier = DomainClassifier::new(config.classifier_table()?);
    let c = classifier.explain(text);
    let table = config.routing_table()?;
    println!("domain: {}", c.label);
    if !c.matched_terms.is_empty() {
        println!("matched: {}", c.matched_terms.join(", "));
    }
    println!("routes to: {}", table.adapters_for(c.label).join(" -> "));
    Ok(())
}
