//! # Evidence Harness
//!
//! A local-first research query resolver. Every query is answered from the
//! local paper index first; external literature sources are consulted only
//! when the local evidence is insufficient, and then only the sources suited
//! to the query's subject domain, tried one after another until one delivers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐
//! │  Query   │──▶│ Local index  │──▶│ Sufficiency │──sufficient──┐
//! └──────────┘   │ SQLite FTS5  │   │   checker   │              │
//!                └──────────────┘   └──────┬──────┘              ▼
//!                                          │ insufficient   ┌─────────┐
//!                                          ▼                │  Merge  │
//!                                  ┌──────────────┐         └────┬────┘
//!                                  │  Classifier  │              │
//!                                  └──────┬───────┘              ▼
//!                                         ▼                ┌───────────┐
//!                                  ┌──────────────┐        │ CLI / HTTP│
//!                                  │    Router    │──────▶ └───────────┘
//!                                  │ arXiv/PubMed │
//!                                  │ Sem. Scholar │
//!                                  └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! evh init                            # create database
//! evh ingest papers.jsonl             # load local papers
//! evh check "graph neural networks"   # is the local corpus enough?
//! evh resolve "latest cancer immunotherapy trials" --answer
//! evh serve                           # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] / [`migrate`] | Database connection and schema |
//! | [`ingest`] | Paper ingestion |
//! | [`sqlite_index`] | FTS5-backed local search |
//! | [`adapters`] | arXiv, PubMed, Semantic Scholar clients |
//! | [`router`] | Sequential fallback with timeouts and cancellation |
//! | [`orchestrator`] | Local-first resolution |
//! | [`synthesis`] | Answer generation from merged evidence |
//! | [`server`] | HTTP API |

pub mod adapters;
pub mod config;
pub mod db;
pub mod ingest;
pub mod inspect;
pub mod migrate;
pub mod orchestrator;
pub mod router;
pub mod search;
pub mod server;
pub mod sources;
pub mod sqlite_index;
pub mod synthesis;
