//! HTTP front end for the agent.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/agent/message` | Answer a message within a session |
//! | `GET`  | `/health` | Health check (status, timestamp, version) |
//! | `GET`  | `/index/stats` | Chunk count and sources in the similarity index |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message and session_id are required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500). Internal failures
//! always carry the generic message `"Failed to process message"`; the
//! cause is only logged.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use context_agent_core::models::IndexStats;

use crate::agent::{Agent, AgentError, AgentReply};
use crate::config::Config;

/// Build the agent from config, ingest the corpus, and serve on
/// `[server].bind` until the process is terminated.
///
/// Ingestion failures (for example a missing corpus directory) are fatal.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let agent = Agent::from_config(config)?;
    let stats = agent.initialize().await?;
    tracing::info!(
        chunks = stats.total_chunks,
        sources = stats.sources.len(),
        "similarity index ready"
    );

    serve(Arc::new(agent), &config.server.bind).await
}

/// Serve an already-built agent on `bind_addr`.
pub async fn serve(agent: Arc<Agent>, bind_addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "agent server listening");

    axum::serve(listener, router(agent)).await?;
    Ok(())
}

pub fn router(agent: Arc<Agent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/agent/message", post(handle_message))
        .route("/health", get(handle_health))
        .route("/index/stats", get(handle_stats))
        .layer(cors)
        .with_state(agent)
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

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<AgentError> for AppError {
    fn from(err: AgentError) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: err.to_string(),
        }
    }
}

// ============ POST /agent/message ============

#[derive(Deserialize)]
struct MessageRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

async fn handle_message(
    State(agent): State<Arc<Agent>>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<AgentReply>, AppError> {
    let Json(req) = payload.map_err(|e| {
        tracing::debug!(error = %e, "rejected request body");
        bad_request("message and session_id are required")
    })?;

    let (Some(message), Some(session_id)) = (required(req.message), required(req.session_id))
    else {
        return Err(bad_request("message and session_id are required"));
    };

    let reply = agent.process_message(&message, &session_id).await?;
    Ok(Json(reply))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /index/stats ============

async fn handle_stats(State(agent): State<Arc<Agent>>) -> Json<IndexStats> {
    Json(agent.index().stats())
}
