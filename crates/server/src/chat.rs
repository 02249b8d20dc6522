use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use shelfdesk_agent::runtime::AgentRuntime;
use shelfdesk_core::domain::conversation::{SessionId, TurnRequest};
use shelfdesk_core::errors::InterfaceError;
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

impl ChatState {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub session_id: String,
    pub response: String,
    pub end_chat: bool,
    pub follow_up: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ResetRequest {
    pub session_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatError {
    pub error: &'static str,
    pub correlation_id: String,
}

type ChatFailure = (StatusCode, Json<ChatError>);

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/api/message", post(message))
        .route("/api/reset", post(reset))
        .with_state(state)
}

pub async fn message(
    State(state): State<ChatState>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ChatFailure> {
    let session_id = body
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(SessionId)
        .unwrap_or_else(SessionId::generate);

    let reply = state
        .runtime
        .handle_turn(TurnRequest { session_id: session_id.clone(), message: body.message })
        .await
        .map_err(|error| failure(error.into_interface(Uuid::new_v4().to_string())))?;

    Ok(Json(MessageResponse {
        session_id: session_id.0,
        response: reply.response,
        end_chat: reply.end_chat,
        follow_up: reply.follow_up,
    }))
}

pub async fn reset(
    State(state): State<ChatState>,
    Json(body): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, ChatFailure> {
    state
        .runtime
        .reset(&SessionId(body.session_id))
        .await
        .map_err(|error| failure(error.into_interface(Uuid::new_v4().to_string())))?;

    Ok(Json(ResetResponse { status: "success", message: "Session reset successfully" }))
}

fn failure(error: InterfaceError) -> ChatFailure {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    warn!(
        event_name = "server.chat.request_failed",
        correlation_id = error.correlation_id(),
        status = status.as_u16(),
        error = %error,
        "chat request failed"
    );

    let body = ChatError {
        error: error.user_message(),
        correlation_id: error.correlation_id().to_string(),
    };
    (status, Json(body))
}
