//! Chat HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/` | Run one turn: `{"prompt", "session_id"?}` → `{"response", "outcome"}` |
//! | `DELETE` | `/history/{session}` | Reset one session's history |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "retrieval_backend", "message": "retrieval backend error: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `retrieval_backend` (502),
//! `completion_backend` (502), `too_many_collections` (502), `timeout` (504),
//! `configuration` (500), `history_corrupt` (500), `internal` (500).
//!
//! # CORS
//!
//! `[server].allowed_origins` lists the browser origins allowed to call the
//! API. An empty list allows any origin.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use rag_chat_core::error::ChatError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::history::DEFAULT_SESSION;
use crate::session::{SessionOrchestrator, TurnOutcome};

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<SessionOrchestrator>,
}

/// Start the server described by `config` with HTTP collaborators.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let orchestrator = Arc::new(SessionOrchestrator::from_config(config)?);
    run_server_with_orchestrator(config, orchestrator).await
}

/// Start the server around an already-built orchestrator.
pub async fn run_server_with_orchestrator(
    config: &Config,
    orchestrator: Arc<SessionOrchestrator>,
) -> anyhow::Result<()> {
    let app = router(orchestrator, cors_layer(&config.server.allowed_origins)?);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "chat server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(orchestrator: Arc<SessionOrchestrator>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", post(handle_turn))
        .route("/history/{session}", delete(handle_reset))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { orchestrator })
}

fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = allowed_origins
            .iter()
            .map(|o| HeaderValue::from_str(o))
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
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

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        let status = match &err {
            ChatError::RetrievalBackend(_)
            | ChatError::CompletionBackend(_)
            | ChatError::TooManyCollections { .. } => StatusCode::BAD_GATEWAY,
            ChatError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let code = match &err {
            ChatError::Storage(_) | ChatError::Extraction(_) => "internal",
            other => other.code(),
        };
        tracing::warn!(code, error = %err, "turn failed");
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
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

// ============ POST / ============

#[derive(Deserialize)]
struct TurnRequest {
    prompt: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct TurnResponse {
    response: String,
    outcome: TurnOutcome,
}

fn session_or_default(session_id: Option<String>) -> String {
    session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string())
}

async fn handle_turn(
    State(state): State<AppState>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let session = session_or_default(req.session_id);
    let turn = state.orchestrator.handle_turn(&session, &req.prompt).await?;
    Ok(Json(TurnResponse {
        response: turn.text,
        outcome: turn.outcome,
    }))
}

// ============ DELETE /history/{session} ============

async fn handle_reset(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Result<StatusCode, AppError> {
    if session.trim().is_empty() {
        return Err(bad_request("session must not be empty"));
    }
    state.orchestrator.history().clear(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
