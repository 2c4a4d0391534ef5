//! # ledgerchat_api
//!
//! HTTP API library for Ledgerchat.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use ledgerchat_core::Assistant;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{chat, quickbooks};

/// Route paths.
pub mod routes {
    pub const POST_QUICKBOOKS_AUTHORIZE: &str = "/api/quickbooks/authorize";
    pub const GET_QUICKBOOKS_CALLBACK: &str = "/api/quickbooks/callback";
    pub const GET_QUICKBOOKS_STATUS: &str = "/api/quickbooks/status";
    pub const DELETE_QUICKBOOKS_CONNECTION: &str = "/api/quickbooks/connection";
    pub const POST_CHAT: &str = "/api/chat";
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            routes::POST_QUICKBOOKS_AUTHORIZE,
            post(quickbooks::authorize_handler),
        )
        .route(
            routes::GET_QUICKBOOKS_CALLBACK,
            get(quickbooks::callback_handler),
        )
        .route(routes::GET_QUICKBOOKS_STATUS, get(quickbooks::status_handler))
        .route(
            routes::DELETE_QUICKBOOKS_CONNECTION,
            delete(quickbooks::disconnect_handler),
        )
        .route(routes::POST_CHAT, post(chat::chat_handler))
        .layer(cors)
        .with_state(state)
}
