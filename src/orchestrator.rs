//! Query resolution: local first, external only when local falls short.
//!
//! ```text
//! query ─▶ local search ─▶ sufficiency check ──sufficient──▶ local, as-is
//!                                 │
//!                            insufficient
//!                                 ▼
//!                       classify ─▶ route ─▶ merge(local, external)
//! ```
//!
//! Local search runs for every query and its failure is the only fatal
//! error. External failures are absorbed by the router and surface only as
//! `external_unavailable = true` on the [`Resolution`].

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use evidence_harness_core::{
    local_only, merge, DomainClassifier, DomainLabel, Intent, LocalSearch, MergedResultSet, Query,
    RouteOutcome, SufficiencyChecker, SufficiencyVerdict,
};

use crate::adapters;
use crate::config::Config;
use crate::router::Router;
use crate::sqlite_index::SqliteIndex;
use crate::synthesis;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    LocalSearch(anyhow::Error),

    #[error("resolution cancelled")]
    Cancelled,
}

/// Everything a caller learns from one resolution.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub query: Query,
    pub verdict: SufficiencyVerdict,
    /// External search was invoked (the local results were insufficient).
    pub used_external: bool,
    /// Set only when external search was invoked.
    pub domain_label: Option<DomainLabel>,
    pub route_outcome: Option<RouteOutcome>,
    /// External search was needed but no adapter produced results.
    pub external_unavailable: bool,
    pub merged: MergedResultSet,
}

pub struct Orchestrator {
    local: Arc<dyn LocalSearch>,
    checker: SufficiencyChecker,
    classifier: DomainClassifier,
    router: Arc<Router>,
    local_limit: usize,
    max_results: usize,
}

impl Orchestrator {
    pub fn new(
        local: Arc<dyn LocalSearch>,
        checker: SufficiencyChecker,
        classifier: DomainClassifier,
        router: Arc<Router>,
        local_limit: usize,
        max_results: usize,
    ) -> Self {
        Self {
            local,
            checker,
            classifier,
            router,
            local_limit,
            max_results,
        }
    }

    /// Wire an orchestrator from config with the given collaborators.
    pub fn from_config(config: &Config, local: Arc<dyn LocalSearch>, router: Arc<Router>) -> Result<Self> {
        Ok(Self::new(
            local,
            SufficiencyChecker::new(config.sufficiency.clone()),
            DomainClassifier::new(config.classifier_table()?),
            router,
            config.local.limit,
            config.routing.max_results,
        ))
    }

    pub fn classifier(&self) -> &DomainClassifier {
        &self.classifier
    }

    pub fn checker(&self) -> &SufficiencyChecker {
        &self.checker
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn resolve(&self, query: &Query) -> Result<Resolution, ResolveError> {
        self.resolve_with_cancel(query, &CancellationToken::new())
            .await
    }

    pub async fn resolve_with_cancel(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<Resolution, ResolveError> {
        let local = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            r = self.local.search(query.text(), self.local_limit) => r.map_err(ResolveError::LocalSearch)?,
        };

        let verdict = self.checker.check(query, &local);
        info!(
            local_results = local.len(),
            sufficient = verdict.sufficient,
            reason = %verdict.reason,
            "sufficiency verdict"
        );

        if verdict.sufficient {
            return Ok(Resolution {
                query: query.clone(),
                verdict,
                used_external: false,
                domain_label: None,
                route_outcome: None,
                external_unavailable: false,
                merged: local_only(&local),
            });
        }

        let domain = self.classifier.classify(query);
        info!(%domain, "local results insufficient, searching externally");

        let outcome = self.router.route(domain, query, cancel).await;
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        let merged = merge(&local, &outcome.results, self.max_results);
        let external_unavailable = outcome.external_unavailable();
        info!(
            %domain,
            served_by = outcome.served_by.as_deref().unwrap_or("none"),
            merged = merged.len(),
            external_unavailable,
            "resolution complete"
        );

        Ok(Resolution {
            query: query.clone(),
            verdict,
            used_external: true,
            domain_label: Some(domain),
            route_outcome: Some(outcome),
            external_unavailable,
            merged,
        })
    }
}

/// Build the production orchestrator: SQLite index plus enabled adapters.
pub async fn open(config: &Config) -> Result<Orchestrator> {
    let index = SqliteIndex::open(config).await?;
    let router = Router::from_config(config, adapters::build_registry(config)?)?;
    Orchestrator::from_config(config, Arc::new(index), Arc::new(router))
}

/// Build a [`Query`], attaching an explicit intent or a detected one.
pub fn build_query(text: &str, intent: Option<Intent>) -> Query {
    let query = Query::new(text);
    match intent.or_else(|| Intent::detect(text)) {
        Some(i) => query.with_intent(i),
        None => query,
    }
}

pub async fn run_resolve(
    config: &Config,
    text: &str,
    intent: Option<Intent>,
    json: bool,
    answer: bool,
) -> Result<()> {
    let orchestrator = open(config).await?;
    let query = build_query(text, intent);
    let resolution = orchestrator.resolve(&query).await?;

    let answer_text = if answer {
        let synthesizer = synthesis::build_synthesizer(&config.synthesis)?;
        Some(synthesizer.synthesize(&resolution).await?)
    } else {
        None
    };

    if json {
        let mut value = serde_json::to_value(&resolution)?;
        if let (Some(obj), Some(a)) = (value.as_object_mut(), &answer_text) {
            obj.insert("answer".to_string(), serde_json::Value::String(a.clone()));
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_resolution(&resolution);
    if let Some(a) = answer_text {
        println!();
        println!("{}", a);
    }
    Ok(())
}

fn print_resolution(resolution: &Resolution) {
    println!("query: {}", resolution.query.text());
    println!("verdict: {}", resolution.verdict.summary());
    println!("used_external: {}", resolution.used_external);
    if let Some(domain) = resolution.domain_label {
        println!("domain: {}", domain);
    }
    if let Some(outcome) = &resolution.route_outcome {
        for attempt in &outcome.attempts {
            match &attempt.error {
                Some(err) => println!(
                    "  {:<18} {:<10} {:>6}ms  {}",
                    attempt.adapter, attempt.status.as_str(), attempt.elapsed_ms, err
                ),
                None => println!(
                    "  {:<18} {:<10} {:>6}ms  {} results",
                    attempt.adapter, attempt.status.as_str(), attempt.elapsed_ms, attempt.result_count
                ),
            }
        }
    }
    if resolution.external_unavailable {
        println!("external_unavailable: true");
    }
    println!();

    if resolution.merged.is_empty() {
        println!("No results.");
        return;
    }
    for (i, item) in resolution.merged.items().iter().enumerate() {
        let year = item.year.map(|y| y.to_string()).unwrap_or_else(|| "----".into());
        println!(
            "{}. [{:.2}] {} ({}) [{}]",
            i + 1,
            item.relevance,
            item.title,
            year,
            item.source
        );
        if !item.snippet.is_empty() {
            println!("    {}", item.snippet);
        }
    }
}
