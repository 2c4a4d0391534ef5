// @zen-component: API-ChatHandler
//
//! Chat request handler.

use axum::Json;
use axum::extract::State;
use ledgerchat_core::chat::Role;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{ChatRequest, ChatResponse};

/// `POST /api/chat`: answer one message against the stored credential.
///
/// Provider and data failures still produce a reply; invalid requests and
/// storage errors do not.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    if body.message.trim().is_empty() {
        return Err(AppError::Validation("message is required".into()));
    }
    // System turns are assembled server-side only.
    if body.history.iter().any(|turn| turn.role == Role::System) {
        return Err(AppError::Validation(
            "history may only contain user and assistant turns".into(),
        ));
    }

    let credential = state.assistant.stored_credential().await?;
    let reply = state
        .assistant
        .respond(&body.history, &body.message, credential.as_ref())
        .await;

    Ok(Json(ChatResponse {
        content: reply.text,
        reconnect_required: reply.reauthorization_required,
    }))
}
