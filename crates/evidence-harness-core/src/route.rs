//! Routing tables and the inspectable outcome of a routing attempt.
//!
//! The router itself lives in the application crate because it needs a
//! runtime for timeouts and cancellation. Everything it decides is recorded
//! here as plain data: a [`RouteOutcome`] lists every [`AdapterAttempt`] in
//! invocation order, each of which moves exactly once from
//! [`AttemptStatus::Pending`] to a terminal status.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::models::{clamp_relevance, DomainLabel, ExternalResultItem};
use crate::source::{AdapterError, FailureKind};
use crate::text::collapse_whitespace;

// ═══════════════════════════════════════════════════════════════════════
// Routing table
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingTableError {
    #[error("routing table for '{label}' lists adapter '{adapter}' more than once")]
    DuplicateAdapter { label: DomainLabel, adapter: String },

    #[error("routing table for '{label}' contains an empty adapter name")]
    EmptyAdapterName { label: DomainLabel },
}

/// Static map from domain label to an ordered adapter list.
///
/// A label with no entry routes nowhere: the router records no attempts and
/// reports external sources as unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingTable {
    routes: BTreeMap<DomainLabel, Vec<String>>,
}

impl RoutingTable {
    /// Build a table, rejecting any list that repeats an adapter.
    pub fn new(routes: BTreeMap<DomainLabel, Vec<String>>) -> Result<Self, RoutingTableError> {
        for (label, adapters) in &routes {
            let mut seen = HashSet::new();
            for adapter in adapters {
                if adapter.trim().is_empty() {
                    return Err(RoutingTableError::EmptyAdapterName { label: *label });
                }
                if !seen.insert(adapter.as_str()) {
                    return Err(RoutingTableError::DuplicateAdapter {
                        label: *label,
                        adapter: adapter.clone(),
                    });
                }
            }
        }
        Ok(Self { routes })
    }

    /// Default routes:
    ///
    /// | Label | Adapters |
    /// |-------|----------|
    /// | technical | arxiv, semantic_scholar |
    /// | physical-science | arxiv, semantic_scholar |
    /// | medical | pubmed, semantic_scholar |
    /// | general | semantic_scholar |
    pub fn builtin() -> Self {
        let route = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut routes = BTreeMap::new();
        routes.insert(DomainLabel::Technical, route(&["arxiv", "semantic_scholar"]));
        routes.insert(
            DomainLabel::PhysicalScience,
            route(&["arxiv", "semantic_scholar"]),
        );
        routes.insert(DomainLabel::Medical, route(&["pubmed", "semantic_scholar"]));
        routes.insert(DomainLabel::General, route(&["semantic_scholar"]));
        Self { routes }
    }

    /// Replace the lists for the labels present in `overrides`.
    pub fn with_overrides(
        self,
        overrides: BTreeMap<DomainLabel, Vec<String>>,
    ) -> Result<Self, RoutingTableError> {
        let mut routes = self.routes;
        routes.extend(overrides);
        Self::new(routes)
    }

    pub fn adapters_for(&self, label: DomainLabel) -> &[String] {
        self.routes.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Labels whose list includes `adapter`.
    pub fn labels_for(&self, adapter: &str) -> Vec<DomainLabel> {
        self.routes
            .iter()
            .filter(|(_, adapters)| adapters.iter().any(|a| a == adapter))
            .map(|(label, _)| *label)
            .collect()
    }

    /// Every adapter name referenced anywhere in the table.
    pub fn adapter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .routes
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Drop entries for which `is_registered` is false.
    ///
    /// Returns the pruned table and the `(label, adapter)` pairs removed.
    pub fn retain_registered<F>(self, is_registered: F) -> (Self, Vec<(DomainLabel, String)>)
    where
        F: Fn(&str) -> bool,
    {
        let mut dropped = Vec::new();
        let routes = self
            .routes
            .into_iter()
            .map(|(label, adapters)| {
                let (keep, gone): (Vec<String>, Vec<String>) =
                    adapters.into_iter().partition(|a| is_registered(a));
                dropped.extend(gone.into_iter().map(|a| (label, a)));
                (label, keep)
            })
            .collect();
        (Self { routes }, dropped)
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Attempts
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Success,
    Failed,
    TimedOut,
    Cancelled,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
            AttemptStatus::TimedOut => "timed_out",
            AttemptStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One adapter invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterAttempt {
    pub adapter: String,
    pub status: AttemptStatus,
    pub failure: Option<FailureKind>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub result_count: usize,
}

impl AdapterAttempt {
    pub fn pending(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            status: AttemptStatus::Pending,
            failure: None,
            error: None,
            elapsed_ms: 0,
            result_count: 0,
        }
    }

    pub fn succeeded(self, result_count: usize, elapsed_ms: u64) -> Self {
        Self {
            status: AttemptStatus::Success,
            result_count,
            elapsed_ms,
            ..self
        }
    }

    pub fn failed(self, err: &AdapterError, elapsed_ms: u64) -> Self {
        Self {
            status: AttemptStatus::Failed,
            failure: Some(err.kind()),
            error: Some(err.to_string()),
            elapsed_ms,
            ..self
        }
    }

    pub fn timed_out(self, timeout_ms: u64, elapsed_ms: u64) -> Self {
        Self {
            status: AttemptStatus::TimedOut,
            failure: Some(FailureKind::Timeout),
            error: Some(format!("no response within {}ms", timeout_ms)),
            elapsed_ms,
            ..self
        }
    }

    pub fn cancelled(self, elapsed_ms: u64) -> Self {
        Self {
            status: AttemptStatus::Cancelled,
            elapsed_ms,
            ..self
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Outcome
// ═══════════════════════════════════════════════════════════════════════

/// Everything the router did for one `(domain, query)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOutcome {
    pub domain: DomainLabel,
    pub attempts: Vec<AdapterAttempt>,
    pub results: Vec<ExternalResultItem>,
    /// Adapter whose results were used, if any succeeded.
    pub served_by: Option<String>,
}

impl RouteOutcome {
    pub fn new(domain: DomainLabel) -> Self {
        Self {
            domain,
            attempts: Vec::new(),
            results: Vec::new(),
            served_by: None,
        }
    }

    /// No adapter produced results (including the case of no adapters).
    pub fn external_unavailable(&self) -> bool {
        self.served_by.is_none()
    }

    /// At least one adapter ran and every one failed or timed out.
    pub fn all_failed(&self) -> bool {
        !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|a| matches!(a.status, AttemptStatus::Failed | AttemptStatus::TimedOut))
    }

    pub fn was_cancelled(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.status == AttemptStatus::Cancelled)
    }

    /// Adapter names in invocation order.
    pub fn invoked(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.adapter.as_str()).collect()
    }
}

/// Normalize raw adapter output.
///
/// Titles are whitespace-collapsed and items with an empty title dropped;
/// relevance is clamped to `[0, 1]`; `source_name` is forced to `adapter`;
/// at most `limit` items are kept.
pub fn normalize_results(
    adapter: &str,
    items: Vec<ExternalResultItem>,
    limit: usize,
) -> Vec<ExternalResultItem> {
    items
        .into_iter()
        .filter_map(|mut item| {
            item.title = collapse_whitespace(&item.title);
            if item.title.is_empty() {
                return None;
            }
            item.snippet = collapse_whitespace(&item.snippet);
            item.relevance = clamp_relevance(item.relevance);
            item.source_name = adapter.to_string();
            Some(item)
        })
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes(entries: &[(DomainLabel, &[&str])]) -> BTreeMap<DomainLabel, Vec<String>> {
        entries
            .iter()
            .map(|(l, names)| (*l, names.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn ext(title: &str, relevance: f64) -> ExternalResultItem {
        ExternalResultItem {
            paper_id: title.into(),
            title: title.into(),
            year: Some(2024),
            relevance,
            snippet: String::new(),
            source_name: "whatever".into(),
            url: None,
        }
    }

    #[test]
    fn test_builtin_routes() {
        let t = RoutingTable::builtin();
        assert_eq!(t.adapters_for(DomainLabel::Technical), ["arxiv", "semantic_scholar"]);
        assert_eq!(t.adapters_for(DomainLabel::Medical), ["pubmed", "semantic_scholar"]);
        assert_eq!(t.adapters_for(DomainLabel::General), ["semantic_scholar"]);
        assert_eq!(
            t.labels_for("arxiv"),
            vec![DomainLabel::Technical, DomainLabel::PhysicalScience]
        );
        assert_eq!(t.adapter_names(), vec!["arxiv", "pubmed", "semantic_scholar"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = RoutingTable::new(routes(&[(DomainLabel::Medical, &["pubmed", "pubmed"])]))
            .unwrap_err();
        assert_eq!(
            err,
            RoutingTableError::DuplicateAdapter {
                label: DomainLabel::Medical,
                adapter: "pubmed".into()
            }
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(RoutingTable::new(routes(&[(DomainLabel::General, &[" "])])).is_err());
    }

    #[test]
    fn test_overrides_replace_only_named_labels() {
        let t = RoutingTable::builtin()
            .with_overrides(routes(&[(DomainLabel::General, &["arxiv"])]))
            .unwrap();
        assert_eq!(t.adapters_for(DomainLabel::General), ["arxiv"]);
        assert_eq!(t.adapters_for(DomainLabel::Medical), ["pubmed", "semantic_scholar"]);
    }

    #[test]
    fn test_missing_label_routes_nowhere() {
        let t = RoutingTable::new(BTreeMap::new()).unwrap();
        assert!(t.adapters_for(DomainLabel::Technical).is_empty());
    }

    #[test]
    fn test_retain_registered() {
        let (t, dropped) = RoutingTable::builtin().retain_registered(|name| name != "pubmed");
        assert_eq!(t.adapters_for(DomainLabel::Medical), ["semantic_scholar"]);
        assert_eq!(dropped, vec![(DomainLabel::Medical, "pubmed".to_string())]);
    }

    #[test]
    fn test_attempt_transitions() {
        let a = AdapterAttempt::pending("arxiv");
        assert_eq!(a.status, AttemptStatus::Pending);

        let ok = a.clone().succeeded(7, 120);
        assert_eq!(ok.status, AttemptStatus::Success);
        assert_eq!(ok.result_count, 7);
        assert_eq!(ok.failure, None);

        let failed = a.clone().failed(&AdapterError::Empty, 40);
        assert_eq!(failed.status, AttemptStatus::Failed);
        assert_eq!(failed.failure, Some(FailureKind::Empty));
        assert_eq!(failed.error.as_deref(), Some("no results"));

        let slow = a.timed_out(8000, 8001);
        assert_eq!(slow.status, AttemptStatus::TimedOut);
        assert_eq!(slow.failure, Some(FailureKind::Timeout));
    }

    #[test]
    fn test_outcome_flags() {
        let mut outcome = RouteOutcome::new(DomainLabel::Medical);
        assert!(outcome.external_unavailable());
        assert!(!outcome.all_failed());

        outcome
            .attempts
            .push(AdapterAttempt::pending("pubmed").timed_out(10, 11));
        outcome.attempts.push(
            AdapterAttempt::pending("semantic_scholar").failed(&AdapterError::Network("dns".into()), 3),
        );
        assert!(outcome.all_failed());
        assert_eq!(outcome.invoked(), vec!["pubmed", "semantic_scholar"]);
    }

    #[test]
    fn test_normalize_results() {
        let items = vec![
            ext("  Attention\n   Is All You Need ", 1.4),
            ext("   ", 0.5),
            ext("Second", -0.2),
            ext("Third", 0.3),
        ];
        let out = normalize_results("arxiv", items, 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "Attention Is All You Need");
        assert_eq!(out[0].relevance, 1.0);
        assert_eq!(out[1].title, "Second");
        assert_eq!(out[1].relevance, 0.0);
        assert!(out.iter().all(|i| i.source_name == "arxiv"));
    }
}
