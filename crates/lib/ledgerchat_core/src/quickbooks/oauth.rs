// @zen-component: QB-OAuthCore
//
//! QuickBooks OAuth2 authorization-code flow.
//!
//! Builds the authorization redirect, tracks the CSRF `state` issued for
//! each attempt, and exchanges authorization codes and refresh tokens at the
//! Intuit token endpoint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, info};

use super::AuthError;
use crate::config::QuickBooksConfig;
use crate::credential::Credential;

/// TTL for pending authorization states (10 minutes).
const STATE_TTL: Duration = Duration::from_secs(600);

/// Generate a cryptographic state parameter (CSRF token).
pub fn generate_state() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Outbound authorization redirect and the state issued with it.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Compose the provider authorization URL for `state`.
///
/// Fails with [`AuthError::Configuration`] when the client id or redirect
/// URI is missing.
pub fn build_authorization_url(
    config: &QuickBooksConfig,
    state: &str,
) -> Result<String, AuthError> {
    let client_id = required(config.client_id.as_deref(), "QUICKBOOKS_CLIENT_ID")?;
    let redirect_uri = required(config.redirect_uri.as_deref(), "QUICKBOOKS_REDIRECT_URI")?;

    let url = url::Url::parse_with_params(
        &config.auth_url,
        &[
            ("client_id", client_id),
            ("response_type", "code"),
            ("scope", config.scope.as_str()),
            ("redirect_uri", redirect_uri),
            ("state", state),
        ],
    )
    .map_err(|e| AuthError::Configuration(format!("invalid authorization URL: {e}")))?;

    Ok(url.into())
}

/// Build a fresh [`AuthorizationRequest`] with a newly generated state.
pub fn authorization_request(config: &QuickBooksConfig) -> Result<AuthorizationRequest, AuthError> {
    let state = generate_state();
    let url = build_authorization_url(config, &state)?;
    Ok(AuthorizationRequest { url, state })
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, AuthError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AuthError::Configuration(format!("{name} is not set")))
}

// =============================================================================
// Authorization state store
// =============================================================================

/// Pending authorization attempt, stored between redirect and callback.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub created_at: Instant,
}

/// In-memory store of issued `state` values. Each state is single-use.
pub struct AuthorizationStateStore {
    states: DashMap<String, PendingAuthorization>,
}

impl AuthorizationStateStore {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    /// Record a state issued with an authorization redirect.
    pub fn insert(&self, state: String) {
        self.insert_at(state, Instant::now());
    }

    fn insert_at(&self, state: String, created_at: Instant) {
        self.states
            .insert(state, PendingAuthorization { created_at });
    }

    /// Take (remove and return) a pending state.
    /// Returns `None` if it was never issued, already used, or expired.
    pub fn take(&self, state: &str) -> Option<PendingAuthorization> {
        let (_, pending) = self.states.remove(state)?;
        if pending.created_at.elapsed() > STATE_TTL {
            return None;
        }
        Some(pending)
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        self.states
            .retain(|_, v| v.created_at.elapsed() <= STATE_TTL);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                store.cleanup();
            }
        })
    }
}

impl Default for AuthorizationStateStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Token exchange
// =============================================================================

/// Response from the Intuit token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// Converts authorization codes and refresh tokens into credentials.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange an authorization code. `account_id` comes from the callback
    /// redirect, not from the token endpoint.
    async fn exchange_authorization_code(
        &self,
        code: &str,
        account_id: &str,
    ) -> Result<Credential, AuthError>;

    /// Exchange the refresh token of `credential` for a new access token.
    ///
    /// The result keeps `account_id` and falls back to the old refresh token
    /// when the provider does not rotate it.
    async fn exchange_refresh_token(&self, credential: &Credential)
    -> Result<Credential, AuthError>;
}

/// HTTP client for the Intuit OAuth endpoints.
pub struct OAuthClient {
    http: reqwest::Client,
    config: QuickBooksConfig,
}

impl OAuthClient {
    pub fn new(http: reqwest::Client, config: QuickBooksConfig) -> Self {
        Self { http, config }
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let client_id = required(self.config.client_id.as_deref(), "QUICKBOOKS_CLIENT_ID")?;
        let client_secret =
            required(self.config.client_secret.as_deref(), "QUICKBOOKS_CLIENT_SECRET")?;

        let resp = self
            .http
            .post(&self.config.token_url)
            .basic_auth(client_id, Some(client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::TokenRejected { status, body });
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("response parse error: {e}")))
    }
}

#[async_trait]
impl TokenExchange for OAuthClient {
    async fn exchange_authorization_code(
        &self,
        code: &str,
        account_id: &str,
    ) -> Result<Credential, AuthError> {
        let redirect_uri = required(self.config.redirect_uri.as_deref(), "QUICKBOOKS_REDIRECT_URI")?;
        let resp = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;

        let refresh_token = resp.refresh_token.ok_or_else(|| {
            AuthError::TokenExchange("authorization response has no refresh_token".into())
        })?;

        info!(account_id = %account_id, expires_in = resp.expires_in, "authorization code exchanged");
        Ok(Credential {
            access_token: resp.access_token,
            refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(resp.expires_in),
            account_id: account_id.to_string(),
        })
    }

    async fn exchange_refresh_token(
        &self,
        credential: &Credential,
    ) -> Result<Credential, AuthError> {
        let resp = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credential.refresh_token.as_str()),
            ])
            .await?;

        debug!(
            account_id = %credential.account_id,
            rotated = resp.refresh_token.is_some(),
            "refresh token exchanged"
        );
        Ok(Credential {
            access_token: resp.access_token,
            refresh_token: resp
                .refresh_token
                .unwrap_or_else(|| credential.refresh_token.clone()),
            expires_at: Utc::now() + chrono::Duration::seconds(resp.expires_in),
            account_id: credential.account_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use axum::extract::{Form, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};

    fn test_config(token_url: String) -> QuickBooksConfig {
        QuickBooksConfig {
            client_id: Some("client-id".into()),
            client_secret: Some("client-secret".into()),
            redirect_uri: Some("http://localhost:3000/quickbooks/callback".into()),
            token_url,
            ..QuickBooksConfig::default()
        }
    }

    #[derive(Clone, Default)]
    struct TokenEndpoint {
        forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
        auth_headers: Arc<Mutex<Vec<String>>>,
        rotate: bool,
    }

    async fn token_handler(
        State(endpoint): State<TokenEndpoint>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> axum::response::Response {
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            endpoint.auth_headers.lock().unwrap().push(auth.to_string());
        }
        let grant = form.get("grant_type").cloned().unwrap_or_default();
        endpoint.forms.lock().unwrap().push(form.clone());

        match grant.as_str() {
            "authorization_code" if form.get("code").map(String::as_str) == Some("bad") => (
                StatusCode::BAD_REQUEST,
                r#"{"error":"invalid_grant"}"#,
            )
                .into_response(),
            "authorization_code" => Json(serde_json::json!({
                "access_token": "A",
                "refresh_token": "R",
                "expires_in": 3600,
                "token_type": "bearer"
            }))
            .into_response(),
            "refresh_token" if endpoint.rotate => Json(serde_json::json!({
                "access_token": "A2",
                "refresh_token": "R2",
                "expires_in": 3600
            }))
            .into_response(),
            "refresh_token" => Json(serde_json::json!({
                "access_token": "A2",
                "expires_in": 3600
            }))
            .into_response(),
            _ => StatusCode::BAD_REQUEST.into_response(),
        }
    }

    async fn serve(endpoint: TokenEndpoint) -> String {
        let app = Router::new()
            .route("/oauth2/v1/tokens/bearer", post(token_handler))
            .with_state(endpoint);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/oauth2/v1/tokens/bearer")
    }

    #[test]
    fn generate_state_produces_unique_values() {
        let s1 = generate_state();
        let s2 = generate_state();
        assert_ne!(s1, s2);
        assert!(s1.len() >= 20);
        assert!(
            s1.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn authorization_url_carries_required_params() {
        let config = test_config("http://unused".into());
        let request = authorization_request(&config).unwrap();
        let url = url::Url::parse(&request.url).unwrap();
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert!(request.url.starts_with("https://appcenter.intuit.com/connect/oauth2?"));
        assert_eq!(params["client_id"], "client-id");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "com.intuit.quickbooks.accounting");
        assert_eq!(
            params["redirect_uri"],
            "http://localhost:3000/quickbooks/callback"
        );
        assert_eq!(params["state"], request.state);
    }

    #[test]
    fn authorization_url_requires_client_id() {
        let config = QuickBooksConfig::default();
        let err = build_authorization_url(&config, "s").unwrap_err();
        assert!(matches!(err, AuthError::Configuration(ref m) if m.contains("QUICKBOOKS_CLIENT_ID")));
    }

    #[test]
    fn authorization_url_requires_redirect_uri() {
        let config = QuickBooksConfig {
            client_id: Some("id".into()),
            redirect_uri: Some("  ".into()),
            ..QuickBooksConfig::default()
        };
        let err = build_authorization_url(&config, "s").unwrap_err();
        assert!(matches!(err, AuthError::Configuration(ref m) if m.contains("REDIRECT_URI")));
    }

    #[test]
    fn state_store_take_is_single_use() {
        let store = AuthorizationStateStore::new();
        store.insert("abc".into());
        assert!(store.take("abc").is_some());
        assert!(store.take("abc").is_none());
        assert!(store.take("never-issued").is_none());
    }

    #[test]
    fn state_store_expired_entry_returns_none() {
        let store = AuthorizationStateStore::new();
        store.insert_at("old".into(), Instant::now() - Duration::from_secs(700));
        assert!(store.take("old").is_none());
    }

    #[test]
    fn state_store_cleanup_removes_expired() {
        let store = AuthorizationStateStore::new();
        store.insert("fresh".into());
        store.insert_at("stale".into(), Instant::now() - Duration::from_secs(700));

        store.cleanup();
        assert_eq!(store.len(), 1);
        assert!(store.take("fresh").is_some());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn spawn_cleanup_task_runs() {
        let store = Arc::new(AuthorizationStateStore::new());
        let handle = store.spawn_cleanup_task();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
    }

    #[tokio::test]
    async fn authorization_code_exchange_computes_expiry() {
        let endpoint = TokenEndpoint::default();
        let client = OAuthClient::new(reqwest::Client::new(), test_config(serve(endpoint.clone()).await));

        let before = Utc::now();
        let cred = client.exchange_authorization_code("c1", "acc1").await.unwrap();

        assert_eq!(cred.access_token, "A");
        assert_eq!(cred.refresh_token, "R");
        assert_eq!(cred.account_id, "acc1");
        let expected = before + chrono::Duration::seconds(3600);
        let drift = (cred.expires_at - expected).num_milliseconds().abs();
        assert!(drift < 1000, "expiry drifted by {drift}ms");

        let forms = endpoint.forms.lock().unwrap();
        assert_eq!(forms[0]["grant_type"], "authorization_code");
        assert_eq!(forms[0]["code"], "c1");
        assert_eq!(
            forms[0]["redirect_uri"],
            "http://localhost:3000/quickbooks/callback"
        );
    }

    #[tokio::test]
    async fn token_requests_use_basic_client_auth() {
        use base64::Engine;

        let endpoint = TokenEndpoint::default();
        let client = OAuthClient::new(reqwest::Client::new(), test_config(serve(endpoint.clone()).await));
        client.exchange_authorization_code("c1", "acc1").await.unwrap();

        let expected = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("client-id:client-secret")
        );
        assert_eq!(endpoint.auth_headers.lock().unwrap()[0], expected);
    }

    #[tokio::test]
    async fn rejected_code_surfaces_provider_body() {
        let endpoint = TokenEndpoint::default();
        let client = OAuthClient::new(reqwest::Client::new(), test_config(serve(endpoint).await));

        let err = client.exchange_authorization_code("bad", "acc1").await.unwrap_err();
        match err {
            AuthError::TokenRejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn refresh_keeps_old_refresh_token_when_not_rotated() {
        let endpoint = TokenEndpoint::default();
        let client = OAuthClient::new(reqwest::Client::new(), test_config(serve(endpoint.clone()).await));
        let old = Credential {
            access_token: "A".into(),
            refresh_token: "R".into(),
            expires_at: Utc::now(),
            account_id: "acc1".into(),
        };

        let cred = client.exchange_refresh_token(&old).await.unwrap();
        assert_eq!(cred.access_token, "A2");
        assert_eq!(cred.refresh_token, "R");
        assert_eq!(cred.account_id, "acc1");
        assert!(!cred.is_expired());

        let forms = endpoint.forms.lock().unwrap();
        assert_eq!(forms[0]["grant_type"], "refresh_token");
        assert_eq!(forms[0]["refresh_token"], "R");
    }

    #[tokio::test]
    async fn refresh_adopts_rotated_refresh_token() {
        let endpoint = TokenEndpoint {
            rotate: true,
            ..TokenEndpoint::default()
        };
        let client = OAuthClient::new(reqwest::Client::new(), test_config(serve(endpoint).await));
        let old = Credential {
            access_token: "A".into(),
            refresh_token: "R".into(),
            expires_at: Utc::now(),
            account_id: "acc1".into(),
        };

        let cred = client.exchange_refresh_token(&old).await.unwrap();
        assert_eq!(cred.refresh_token, "R2");
    }

    #[tokio::test]
    async fn exchange_without_client_secret_is_configuration_error() {
        let config = QuickBooksConfig {
            client_id: Some("id".into()),
            ..QuickBooksConfig::default()
        };
        let client = OAuthClient::new(reqwest::Client::new(), config);
        let err = client.exchange_authorization_code("c1", "acc1").await.unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_is_exchange_error() {
        let client = OAuthClient::new(
            reqwest::Client::new(),
            test_config("http://127.0.0.1:1/tokens".into()),
        );
        let err = client.exchange_authorization_code("c1", "acc1").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExchange(_)));
    }
}
