// @zen-component: CORE-Assistant
//
//! Boundary surface exposed to the host application.
//!
//! - [`Assistant::start_authorization`]: authorization redirect target
//! - [`Assistant::complete_authorization`]: callback handling and token exchange
//! - [`Assistant::send_turn`]: one conversational turn, never fails

use std::sync::Arc;

use tracing::info;

use crate::ai::{CompletionProvider, CompletionSettings, OpenAiProvider, ResponseGenerator};
use crate::chat::{ContextAssembler, ConversationTurn, IntentClassifier, KeywordIntentClassifier};
use crate::config::{LedgerConfig, QuickBooksConfig};
use crate::credential::{Credential, CredentialStore};
use crate::quickbooks::oauth::{self, AuthorizationRequest, AuthorizationStateStore};
use crate::quickbooks::{AuthError, InvoiceFetcher, OAuthClient, RecordFetcher, RefreshGuard, TokenExchange};

/// Reply to an empty message; no AI call is made.
pub const GREETING: &str = "Hello! I'm your QuickBooks assistant. How can I help you today?";

/// Collaborators an [`Assistant`] is wired from.
pub struct Components {
    pub exchanger: Arc<dyn TokenExchange>,
    pub fetcher: Arc<dyn RecordFetcher>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub provider: Arc<dyn CompletionProvider>,
}

/// Outcome of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub text: String,
    /// The stored credential was rejected; the user must reconnect.
    pub reauthorization_required: bool,
}

pub struct Assistant {
    quickbooks: QuickBooksConfig,
    states: Arc<AuthorizationStateStore>,
    exchanger: Arc<dyn TokenExchange>,
    store: Arc<dyn CredentialStore>,
    assembler: ContextAssembler,
    generator: ResponseGenerator,
}

impl Assistant {
    /// Wire the HTTP-backed QuickBooks and OpenAI collaborators from `config`.
    pub fn new(config: &LedgerConfig, store: Arc<dyn CredentialStore>) -> Result<Self, AuthError> {
        let http = config.http_client()?;
        let exchanger: Arc<dyn TokenExchange> =
            Arc::new(OAuthClient::new(http.clone(), config.quickbooks.clone()));
        let guard = Arc::new(RefreshGuard::new(Arc::clone(&exchanger), Arc::clone(&store)));
        let components = Components {
            exchanger,
            fetcher: Arc::new(InvoiceFetcher::new(
                http.clone(),
                config.quickbooks.api_base_url.clone(),
                guard,
            )),
            classifier: Arc::new(KeywordIntentClassifier),
            provider: Arc::new(OpenAiProvider::new(http, &config.ai)),
        };
        Ok(Self::with_components(config, store, components))
    }

    pub fn with_components(
        config: &LedgerConfig,
        store: Arc<dyn CredentialStore>,
        components: Components,
    ) -> Self {
        Self {
            quickbooks: config.quickbooks.clone(),
            states: Arc::new(AuthorizationStateStore::new()),
            exchanger: components.exchanger,
            store,
            assembler: ContextAssembler::new(components.classifier, components.fetcher),
            generator: ResponseGenerator::new(
                components.provider,
                CompletionSettings::from(&config.ai),
            ),
        }
    }

    /// Pending authorization states, for periodic cleanup.
    pub fn authorization_states(&self) -> &Arc<AuthorizationStateStore> {
        &self.states
    }

    /// Build the redirect URL and remember its state for the callback.
    pub async fn start_authorization(&self) -> Result<AuthorizationRequest, AuthError> {
        let request = oauth::authorization_request(&self.quickbooks)?;
        self.states.insert(request.state.clone());
        info!("authorization started");
        Ok(request)
    }

    /// Validate the callback `state`, exchange `code`, and store the credential.
    pub async fn complete_authorization(
        &self,
        code: &str,
        account_id: &str,
        state: &str,
    ) -> Result<Credential, AuthError> {
        self.states.take(state).ok_or(AuthError::StateMismatch)?;

        let credential = self
            .exchanger
            .exchange_authorization_code(code, account_id)
            .await?;
        self.store.save(&credential).await?;

        info!(account_id = %credential.account_id, "QuickBooks connected");
        Ok(credential)
    }

    pub async fn stored_credential(&self) -> Result<Option<Credential>, AuthError> {
        self.store.load().await
    }

    pub async fn disconnect(&self) -> Result<(), AuthError> {
        self.store.clear().await?;
        info!("QuickBooks disconnected");
        Ok(())
    }

    /// Answer `user_text` given prior `history`.
    pub async fn send_turn(
        &self,
        history: &[ConversationTurn],
        user_text: &str,
        credential: Option<&Credential>,
    ) -> String {
        self.respond(history, user_text, credential).await.text
    }

    /// Like [`send_turn`](Self::send_turn), also reporting whether the
    /// credential needs to be re-authorized.
    pub async fn respond(
        &self,
        history: &[ConversationTurn],
        user_text: &str,
        credential: Option<&Credential>,
    ) -> TurnReply {
        if user_text.trim().is_empty() {
            return TurnReply {
                text: GREETING.to_string(),
                reauthorization_required: false,
            };
        }

        let latest = ConversationTurn::user(user_text);
        let request = self
            .assembler
            .build_request(history, &latest, credential)
            .await;
        let text = self.generator.generate(&request).await;

        TurnReply {
            text,
            reauthorization_required: request.requires_reauthorization(),
        }
    }
}
