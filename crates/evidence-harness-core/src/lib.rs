//! # Evidence Harness Core
//!
//! Shared, I/O-free logic for Evidence Harness: the query and result data
//! model, the sufficiency checker, the domain classifier, routing tables and
//! outcomes, evidence merging, and the collaborator traits for local search
//! and external source adapters.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Everything here is deterministic given its inputs, so it can be tested
//! with literal values.

pub mod classify;
pub mod index;
pub mod merge;
pub mod models;
pub mod route;
pub mod source;
pub mod sufficiency;
pub mod text;

pub use classify::{Classification, ClassifierTable, DomainClassifier, DomainRule};
pub use index::{InMemoryIndex, IndexedPaper, LocalSearch};
pub use merge::{local_only, merge};
pub use models::{
    DomainLabel, EvidenceItem, ExternalResultItem, Intent, LocalResultItem, LocalResultSet,
    MergedResultSet, Query,
};
pub use route::{
    normalize_results, AdapterAttempt, AttemptStatus, RouteOutcome, RoutingTable, RoutingTableError,
};
pub use source::{AdapterError, FailureKind, SourceAdapter};
pub use sufficiency::{
    SufficiencyChecker, SufficiencyPolicy, SufficiencyVerdict, Threshold, VerdictReason,
};
