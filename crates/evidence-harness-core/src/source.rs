//! The [`SourceAdapter`] trait: a uniform interface over external paper
//! search providers.
//!
//! Adapters do not retry and do not enforce timeouts; the router owns both
//! concerns. An adapter's only job is to turn `(query_text, limit)` into
//! result items or a typed [`AdapterError`]. The router calls
//! [`SourceAdapter::fetch_for`] so adapters that can narrow a search by
//! subject see the query's domain label.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::{DomainLabel, ExternalResultItem};

/// Errors an adapter can report. The router treats every variant as a
/// reason to fall back to the next adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited{}", .retry_after_secs.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no results")]
    Empty,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl AdapterError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AdapterError::Network(_) => FailureKind::Network,
            AdapterError::RateLimited { .. } => FailureKind::RateLimited,
            AdapterError::Malformed(_) => FailureKind::Malformed,
            AdapterError::Empty => FailureKind::Empty,
            AdapterError::Status { .. } => FailureKind::Status,
        }
    }
}

/// Variant tag of an [`AdapterError`] plus the router-only `Timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    RateLimited,
    Malformed,
    Empty,
    Status,
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Malformed => "malformed",
            FailureKind::Empty => "empty",
            FailureKind::Status => "status",
            FailureKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An external paper search provider.
///
/// Implementations must be `Send + Sync` so a registry of
/// `Arc<dyn SourceAdapter>` can be shared across concurrent resolutions.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use evidence_harness_core::{AdapterError, ExternalResultItem, SourceAdapter};
///
/// struct Offline;
///
/// #[async_trait]
/// impl SourceAdapter for Offline {
///     fn name(&self) -> &str { "offline" }
///     fn description(&self) -> &str { "Never returns anything" }
///     async fn fetch(&self, _q: &str, _limit: usize)
///         -> Result<Vec<ExternalResultItem>, AdapterError> {
///         Err(AdapterError::Empty)
///     }
/// }
/// ```
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry key, e.g. `"arxiv"`. Must be unique among registered adapters.
    fn name(&self) -> &str;

    /// One-line human description.
    fn description(&self) -> &str;

    /// Search the provider. `limit` is a hint; the router caps the result.
    async fn fetch(
        &self,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<ExternalResultItem>, AdapterError>;

    /// Search on behalf of a query classified as `domain`. Defaults to
    /// [`fetch`](Self::fetch).
    async fn fetch_for(
        &self,
        _domain: DomainLabel,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<ExternalResultItem>, AdapterError> {
        self.fetch(query_text, limit).await
    }
}
