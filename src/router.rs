//! Sequential-fallback routing over external source adapters.
//!
//! For a domain label the router walks the routing table's adapter list in
//! order. Each adapter gets one call bounded by the configured timeout:
//!
//! ```text
//! pending ──fetch ok, non-empty──▶ success   (stop)
//!    │────fetch error / empty────▶ failed    (next adapter)
//!    │────deadline elapsed───────▶ timed_out (next adapter)
//!    └────token cancelled────────▶ cancelled (stop)
//! ```
//!
//! Total external latency is therefore bounded by
//! `adapters × adapter_timeout`. Every attempt, including failures, is
//! recorded in the returned [`RouteOutcome`]. The router never returns an
//! error: "no external data" is a valid outcome.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use evidence_harness_core::route::normalize_results;
use evidence_harness_core::{
    AdapterAttempt, AdapterError, AttemptStatus, DomainLabel, Query, RouteOutcome, RoutingTable,
};

use crate::adapters::AdapterRegistry;
use crate::config::Config;

pub struct Router {
    table: RoutingTable,
    registry: AdapterRegistry,
    timeout: Duration,
    fetch_limit: usize,
}

impl Router {
    /// Build a router. Table entries naming adapters that are not in
    /// `registry` are dropped with a warning.
    pub fn new(
        table: RoutingTable,
        registry: AdapterRegistry,
        timeout: Duration,
        fetch_limit: usize,
    ) -> Self {
        let (table, dropped) = table.retain_registered(|name| registry.contains(name));
        for (label, adapter) in dropped {
            warn!(%label, adapter = %adapter, "routing table names an unregistered adapter, skipping it");
        }
        Self {
            table,
            registry,
            timeout,
            fetch_limit,
        }
    }

    pub fn from_config(config: &Config, registry: AdapterRegistry) -> Result<Self> {
        Ok(Self::new(
            config.routing_table()?,
            registry,
            config.routing.adapter_timeout(),
            config.routing.fetch_limit,
        ))
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub async fn route(
        &self,
        domain: DomainLabel,
        query: &Query,
        cancel: &CancellationToken,
    ) -> RouteOutcome {
        let mut outcome = RouteOutcome::new(domain);
        let mut seen = HashSet::new();
        let timeout_ms = self.timeout.as_millis() as u64;

        for name in self.table.adapters_for(domain) {
            if !seen.insert(name.as_str()) {
                continue;
            }
            let Some(adapter) = self.registry.get(name) else {
                continue;
            };
            if cancel.is_cancelled() {
                break;
            }

            let pending = AdapterAttempt::pending(name.as_str());
            let started = Instant::now();
            debug!(%domain, adapter = %name, "invoking adapter");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = tokio::time::timeout(self.timeout, adapter.fetch_for(domain, query.text(), self.fetch_limit)) => Some(r),
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let attempt = match result {
                None => pending.cancelled(elapsed_ms),
                Some(Err(_)) => pending.timed_out(timeout_ms, elapsed_ms),
                Some(Ok(Err(e))) => pending.failed(&e, elapsed_ms),
                Some(Ok(Ok(items))) => {
                    let items = normalize_results(name, items, self.fetch_limit);
                    if items.is_empty() {
                        pending.failed(&AdapterError::Empty, elapsed_ms)
                    } else {
                        let attempt = pending.succeeded(items.len(), elapsed_ms);
                        outcome.results = items;
                        outcome.served_by = Some(name.clone());
                        attempt
                    }
                }
            };

            match attempt.status {
                AttemptStatus::Success => info!(
                    adapter = %name,
                    results = attempt.result_count,
                    elapsed_ms,
                    "adapter succeeded"
                ),
                AttemptStatus::Cancelled => info!(adapter = %name, elapsed_ms, "routing cancelled"),
                _ => warn!(
                    adapter = %name,
                    status = %attempt.status,
                    error = attempt.error.as_deref().unwrap_or(""),
                    elapsed_ms,
                    "adapter failed, falling back"
                ),
            }

            let stop = matches!(
                attempt.status,
                AttemptStatus::Success | AttemptStatus::Cancelled
            );
            outcome.attempts.push(attempt);
            if stop {
                break;
            }
        }

        if outcome.all_failed() {
            warn!(%domain, attempts = outcome.attempts.len(), "all external sources failed");
        }
        outcome
    }
}
