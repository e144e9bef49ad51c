use anyhow::Result;
use serde::Serialize;

use crate::adapters;
use crate::config::{Config, KNOWN_ADAPTERS};

/// One external source as seen by the router.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceStatus {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    /// Domain labels whose fallback chain includes this source.
    pub labels: Vec<String>,
}

pub fn get_sources(config: &Config) -> Result<Vec<SourceStatus>> {
    let registry = adapters::build_registry(config)?;
    let table = config.routing_table()?;

    Ok(KNOWN_ADAPTERS
        .iter()
        .map(|name| {
            let adapter = registry.get(name);
            SourceStatus {
                name: name.to_string(),
                description: adapter
                    .map(|a| a.description().to_string())
                    .unwrap_or_default(),
                enabled: adapter.is_some(),
                labels: table
                    .labels_for(name)
                    .iter()
                    .map(|l| l.to_string())
                    .collect(),
            }
        })
        .collect())
}

pub fn list_sources(config: &Config) -> Result<()> {
    let sources = get_sources(config)?;

    println!("{:<18} {:<10} LABELS", "SOURCE", "STATUS");
    for s in &sources {
        let status = if s.enabled { "enabled" } else { "disabled" };
        let labels = if s.labels.is_empty() {
            "-".to_string()
        } else {
            s.labels.join(", ")
        };
        println!("{:<18} {:<10} {}", s.name, status, labels);
    }

    Ok(())
}
