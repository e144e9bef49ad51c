//! JSON HTTP API over the orchestrator.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/sources` | External sources, enabled state, routed labels |
//! | `POST` | `/classify` | Domain label for `{ "query": ... }` |
//! | `POST` | `/resolve` | Full resolution for `{ "query", "intent"?, "answer"? }` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `local_search_failed` (500),
//! `cancelled` (503), `internal` (500).
//!
//! A resolution runs on its own task. If the client disconnects, the
//! handler future is dropped, its drop guard cancels the token, and the
//! router abandons the in-flight adapter call.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use evidence_harness_core::{DomainLabel, Intent};

use crate::config::Config;
use crate::orchestrator::{self, build_query, Orchestrator, Resolution, ResolveError};
use crate::sources::{get_sources, SourceStatus};
use crate::synthesis::{build_synthesizer, AnswerSynthesizer};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    sources: Arc<Vec<SourceStatus>>,
}

impl AppState {
    pub fn new(config: &Config, orchestrator: Orchestrator) -> anyhow::Result<Self> {
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            synthesizer: Arc::from(build_synthesizer(&config.synthesis)?),
            sources: Arc::new(get_sources(config)?),
        })
    }
}

/// Build the router with all endpoints and CORS applied.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sources", get(handle_sources))
        .route("/classify", post(handle_classify))
        .route("/resolve", post(handle_resolve))
        .layer(cors)
        .with_state(state)
}

/// `evh serve`: bind `[server].bind` and serve until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let orchestrator = orchestrator::open(config).await?;
    let state = AppState::new(config, orchestrator)?;

    let enabled: Vec<&str> = state
        .sources
        .iter()
        .filter(|s| s.enabled)
        .map(|s| s.name.as_str())
        .collect();
    info!(sources = %enabled.join(","), "external sources enabled");

    let app = build_app(state);
    let bind_addr = &config.server.bind;
    println!("evh server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into the JSON error contract.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::LocalSearch(e) => AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "local_search_failed",
                format!("local search failed: {:#}", e),
            ),
            ResolveError::Cancelled => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, "cancelled", "resolution cancelled")
            }
        }
    }
}

fn non_empty(query: &str) -> Result<&str, AppError> {
    let q = query.trim();
    if q.is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    Ok(q)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /sources ============

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<SourceStatus>,
}

async fn handle_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: state.sources.as_ref().clone(),
    })
}

// ============ POST /classify ============

#[derive(Deserialize)]
struct ClassifyRequest {
    query: String,
}

#[derive(Serialize)]
struct ClassifyResponse {
    domain: DomainLabel,
    matched_terms: Vec<String>,
    adapters: Vec<String>,
}

async fn handle_classify(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let query = non_empty(&req.query)?;
    let c = state.orchestrator.classifier().explain(query);
    let adapters = state.orchestrator.router().table().adapters_for(c.label).to_vec();
    Ok(Json(ClassifyResponse {
        domain: c.label,
        matched_terms: c.matched_terms,
        adapters,
    }))
}

// ============ POST /resolve ============

#[derive(Deserialize)]
struct ResolveRequest {
    query: String,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    answer: bool,
}

#[derive(Serialize)]
struct ResolveResponse {
    #[serde(flatten)]
    resolution: Resolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
}

async fn handle_resolve(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    let text = non_empty(&req.query)?;
    let intent = req
        .intent
        .as_deref()
        .map(str::parse::<Intent>)
        .transpose()
        .map_err(bad_request)?;
    let query = build_query(text, intent);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let orchestrator = state.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.resolve_with_cancel(&query, &cancel).await });
    let resolution = task
        .await
        .map_err(|e| internal(format!("resolution task failed: {}", e)))??;

    let answer = if req.answer {
        match state.synthesizer.synthesize(&resolution).await {
            Ok(a) => Some(a),
            Err(e) => {
                warn!(error = %e, "answer synthesis failed");
                None
            }
        }
    } else {
        None
    };

    Ok(Json(ResolveResponse { resolution, answer }))
}
