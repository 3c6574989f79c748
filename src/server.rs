//! HTTP chat surface: one endpoint running a full exchange, plus a health
//! probe. Thin by design — all orchestration lives in [`ToolLoop`].

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::Error;
use crate::orchestrator::{ToolExecutor, ToolLoop};
use crate::types::message::ChatMessage;
use crate::types::tool::ToolDescriptor;

#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<ToolLoop>,
    pub executor: Arc<dyn ToolExecutor>,
    pub catalog: Arc<Vec<ToolDescriptor>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_history: Vec<ChatMessage>,
    pub provider: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorBody>)> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "message is required".into(),
            }),
        ));
    }

    match state
        .driver
        .run(
            message,
            &request.conversation_history,
            &state.catalog,
            state.executor.as_ref(),
        )
        .await
    {
        Ok(outcome) => Ok(Json(ChatResponse {
            response: outcome.text,
            conversation_history: outcome.history,
            provider: outcome.provider.to_string(),
        })),
        Err(err) => {
            error!(error = %err, "chat exchange failed");
            Err((
                error_status(&err),
                Json(ErrorBody {
                    error: err.to_string(),
                }),
            ))
        }
    }
}

fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::Upstream { .. } | Error::Protocol { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let tools: Vec<&str> = state.catalog.iter().map(|t| t.name.as_str()).collect();
    Json(json!({
        "status": "ok",
        "provider": state.driver.provider().to_string(),
        "tools": tools,
    }))
}
