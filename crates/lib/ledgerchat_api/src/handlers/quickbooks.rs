// @zen-component: API-QuickBooksHandlers
//
//! QuickBooks connection handlers: authorize, callback, status, disconnect.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{AuthorizeResponse, CallbackParams, ConnectionStatus};

/// `POST /api/quickbooks/authorize`: start the OAuth flow.
pub async fn authorize_handler(State(state): State<AppState>) -> AppResult<Json<AuthorizeResponse>> {
    let request = state.assistant.start_authorization().await?;
    Ok(Json(AuthorizeResponse {
        url: request.url,
        state: request.state,
    }))
}

/// `GET /api/quickbooks/callback`: Intuit redirect target.
///
/// Tokens stay server-side; only the connection summary is returned.
pub async fn callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Json<ConnectionStatus>> {
    let (Some(code), Some(realm_id), Some(oauth_state)) = (
        non_empty(params.code),
        non_empty(params.realm_id),
        non_empty(params.state),
    ) else {
        return Err(AppError::Validation("missing required parameters".into()));
    };

    let credential = state
        .assistant
        .complete_authorization(&code, &realm_id, &oauth_state)
        .await?;

    Ok(Json(ConnectionStatus {
        connected: true,
        account_id: Some(credential.account_id),
        expires_at: Some(credential.expires_at),
    }))
}

/// `GET /api/quickbooks/status`: whether a credential is stored.
pub async fn status_handler(State(state): State<AppState>) -> AppResult<Json<ConnectionStatus>> {
    let status = match state.assistant.stored_credential().await? {
        Some(credential) => ConnectionStatus {
            connected: true,
            account_id: Some(credential.account_id),
            expires_at: Some(credential.expires_at),
        },
        None => ConnectionStatus {
            connected: false,
            account_id: None,
            expires_at: None,
        },
    };
    Ok(Json(status))
}

/// `DELETE /api/quickbooks/connection`: forget the stored credential.
pub async fn disconnect_handler(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.assistant.disconnect().await?;
    Ok(StatusCode::NO_CONTENT)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
