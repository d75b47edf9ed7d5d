//! HTTP surface for the chat core: JSON in, JSON out.
//!
//! Serving is request-per-call over shared state; the only cross-request
//! coordination lives inside the engine's stores, which are keyed per
//! user and per session.

use crate::types::{ChatRequest, ChatResponse, FeedbackRequest, FeedbackResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use peira_core::PeiraError;
use peira_engine::ChatEngine;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// The gateway HTTP server.
///
/// Routes:
/// - `POST /chat` — run one chat turn
/// - `POST /feedback` — submit feedback for a session
/// - `DELETE /clear_chat/{user_id}` — drop a user's memory
/// - `GET /health` — health check
pub struct GatewayServer {
    engine: Arc<ChatEngine>,
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(engine: Arc<ChatEngine>, host: &str, port: u16) -> Self {
        Self {
            engine,
            host: host.to_string(),
            port,
        }
    }

    /// Build the router. Split out so tests can drive it in-process.
    pub fn router(engine: Arc<ChatEngine>) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/chat", post(chat))
            .route("/feedback", post(feedback))
            .route("/clear_chat/:user_id", delete(clear_chat))
            .layer(CorsLayer::permissive())
            .with_state(engine)
    }

    /// Start the server. Spawns a background task and returns its handle.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        let app = Self::router(self.engine);
        let addr = format!("{}:{}", self.host, self.port);

        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(&addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!("Gateway failed to bind {}: {}", addr, e);
                    return;
                }
            };
            tracing::info!("Gateway listening on {}", addr);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Gateway server error: {}", e);
            }
        })
    }
}

fn status_for(err: &PeiraError) -> StatusCode {
    match err {
        PeiraError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
        PeiraError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PeiraError::Training(_) | PeiraError::Inference(_) | PeiraError::Collaborator { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

/// POST /chat — the turn pipeline never fails outward; degradation
/// happens inside the engine.
async fn chat(
    State(engine): State<Arc<ChatEngine>>,
    Json(req): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let outcome = engine.open_chat_turn(&req.user_id, &req.user_input).await;
    Json(ChatResponse {
        session_id: outcome.session_id,
        response: outcome.response,
        explanation: outcome.explanation,
        chat_history: outcome.chat_history,
    })
}

/// POST /feedback — 404 for unknown/consumed sessions, 500 when the
/// event could not be stored (the session survives for a retry).
async fn feedback(
    State(engine): State<Arc<ChatEngine>>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, StatusCode> {
    match engine.submit_feedback(req.session_id, &req.user_feedback).await {
        Ok(_event) => Ok(Json(FeedbackResponse {
            message: "Feedback received. Thank you!".to_string(),
        })),
        Err(e) => {
            tracing::warn!("Feedback rejected: {}", e);
            Err(status_for(&e))
        }
    }
}

/// DELETE /clear_chat/{user_id} — idempotent.
async fn clear_chat(
    State(engine): State<Arc<ChatEngine>>,
    Path(user_id): Path<String>,
) -> Result<Json<FeedbackResponse>, StatusCode> {
    match engine.clear_memory(&user_id).await {
        Ok(()) => Ok(Json(FeedbackResponse {
            message: "Chat history cleared successfully.".to_string(),
        })),
        Err(e) => {
            tracing::error!("Failed to clear chat history: {}", e);
            Err(status_for(&e))
        }
    }
}
