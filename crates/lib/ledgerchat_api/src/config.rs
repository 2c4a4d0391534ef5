//! API server configuration.

use ledgerchat_core::config::LedgerConfig;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// QuickBooks and AI provider settings.
    pub ledger: LedgerConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable     | Default          |
    /// |--------------|------------------|
    /// | `BIND_ADDR`  | `127.0.0.1:3100` |
    ///
    /// See [`LedgerConfig::from_env`] for the provider variables.
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            ledger: LedgerConfig::from_env(),
        }
    }
}
