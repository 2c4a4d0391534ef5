// @zen-component: CFG-LedgerConfig
//
//! Runtime configuration resolved from environment variables.
//!
//! | Variable                   | Default                                                    |
//! |----------------------------|------------------------------------------------------------|
//! | `QUICKBOOKS_CLIENT_ID`     | none                                                       |
//! | `QUICKBOOKS_CLIENT_SECRET` | none                                                       |
//! | `QUICKBOOKS_REDIRECT_URI`  | `http://localhost:3000/quickbooks/callback`                |
//! | `QUICKBOOKS_AUTH_URL`      | `https://appcenter.intuit.com/connect/oauth2`              |
//! | `QUICKBOOKS_TOKEN_URL`     | `https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer`|
//! | `QUICKBOOKS_API_BASE_URL`  | `https://quickbooks.api.intuit.com`                        |
//! | `QUICKBOOKS_SCOPE`         | `com.intuit.quickbooks.accounting`                         |
//! | `OPENAI_API_KEY`           | none                                                       |
//! | `OPENAI_BASE_URL`          | `https://api.openai.com/v1`                                |
//! | `AI_MODEL`                 | `gpt-4`                                                    |
//! | `AI_TEMPERATURE`           | `0.7`                                                      |
//! | `AI_MAX_TOKENS`            | `500`                                                      |
//! | `HTTP_TIMEOUT_SECS`        | `30`                                                       |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::quickbooks::AuthError;

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/quickbooks/callback";
pub const DEFAULT_AUTH_URL: &str = "https://appcenter.intuit.com/connect/oauth2";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer";
pub const DEFAULT_API_BASE_URL: &str = "https://quickbooks.api.intuit.com";
pub const DEFAULT_SCOPE: &str = "com.intuit.quickbooks.accounting";

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Timeout applied to every outbound HTTP call.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// QuickBooks OAuth client registration and endpoints.
#[derive(Clone, Debug)]
pub struct QuickBooksConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    /// Base URL of the accounting API (without `/v3/...`).
    pub api_base_url: String,
    pub scope: String,
}

impl QuickBooksConfig {
    pub fn from_env() -> Self {
        Self {
            client_id: non_empty_var("QUICKBOOKS_CLIENT_ID"),
            client_secret: non_empty_var("QUICKBOOKS_CLIENT_SECRET"),
            redirect_uri: Some(
                env::var("QUICKBOOKS_REDIRECT_URI").unwrap_or_else(|_| DEFAULT_REDIRECT_URI.into()),
            ),
            auth_url: env::var("QUICKBOOKS_AUTH_URL").unwrap_or_else(|_| DEFAULT_AUTH_URL.into()),
            token_url: env::var("QUICKBOOKS_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_TOKEN_URL.into()),
            api_base_url: env::var("QUICKBOOKS_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.into()),
            scope: env::var("QUICKBOOKS_SCOPE").unwrap_or_else(|_| DEFAULT_SCOPE.into()),
        }
    }
}

impl Default for QuickBooksConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: Some(DEFAULT_REDIRECT_URI.into()),
            auth_url: DEFAULT_AUTH_URL.into(),
            token_url: DEFAULT_TOKEN_URL.into(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
            scope: DEFAULT_SCOPE.into(),
        }
    }
}

/// AI completion provider settings.
#[derive(Clone, Debug)]
pub struct AiConfig {
    /// OpenAI API key. Without one every completion fails and the fallback reply is used.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl AiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_var("OPENAI_API_KEY"),
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.into()),
            model: env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into()),
            temperature: parsed_var("AI_TEMPERATURE", DEFAULT_TEMPERATURE),
            max_tokens: parsed_var("AI_MAX_TOKENS", DEFAULT_MAX_TOKENS),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Complete configuration for an [`Assistant`](crate::Assistant).
#[derive(Clone, Debug, Default)]
pub struct LedgerConfig {
    pub quickbooks: QuickBooksConfig,
    pub ai: AiConfig,
    pub http_timeout: Option<Duration>,
}

impl LedgerConfig {
    /// Reads every section from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            quickbooks: QuickBooksConfig::from_env(),
            ai: AiConfig::from_env(),
            http_timeout: Some(Duration::from_secs(parsed_var(
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT.as_secs(),
            ))),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT)
    }

    /// Builds the shared HTTP client with the configured timeout.
    pub fn http_client(&self) -> Result<reqwest::Client, AuthError> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .build()
            .map_err(|e| AuthError::Configuration(format!("HTTP client: {e}")))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
