//! QuickBooks Online integration.
//!
//! Provides the OAuth2 authorization-code flow, the refresh-before-expiry
//! guard, and invoice retrieval from the accounting query endpoint.

pub mod invoices;
pub mod oauth;
pub mod refresh;

use thiserror::Error;

pub use invoices::{FetchError, InvoiceFetcher, InvoiceRecord, RecordFetcher};
pub use oauth::{AuthorizationRequest, AuthorizationStateStore, OAuthClient, TokenExchange};
pub use refresh::RefreshGuard;

/// Credential lifecycle errors.
///
/// `Clone` so a single in-flight refresh outcome can be handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Token exchange rejected (HTTP {status}): {body}")]
    TokenRejected { status: u16, body: String },

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Credential expired: {0}")]
    CredentialExpired(String),

    #[error("Authorization state mismatch")]
    StateMismatch,

    #[error("Credential storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Whether the host must send the user through authorization again.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            AuthError::TokenRejected { .. }
                | AuthError::CredentialExpired(_)
                | AuthError::StateMismatch
        )
    }
}
