//! # ledgerchat_core
//!
//! Core domain logic for Ledgerchat: the QuickBooks OAuth2 credential
//! lifecycle, invoice retrieval, and assembly of AI requests grounded in
//! that data.

pub mod ai;
pub mod assistant;
pub mod chat;
pub mod config;
pub mod credential;
pub mod quickbooks;

pub use assistant::Assistant;
pub use credential::{Credential, CredentialStore};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
