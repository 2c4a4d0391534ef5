// @zen-component: AI-ResponseGenerator
//
//! AI completion: provider abstraction and the reply generator that never
//! fails a conversational turn.

pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::chat::context::{AiRequest, ChatMessage};

pub use openai::OpenAiProvider;

/// Reply when the user asked about their data but has not connected QuickBooks.
pub const CONNECT_ACCOUNT_FALLBACK: &str = "I'd be happy to help with that, but you'll need to connect your QuickBooks account first to access your invoice data.";

/// Reply for every other completion failure.
pub const GENERIC_FALLBACK: &str =
    "I'm sorry, I encountered an error processing your request. Please try again.";

/// Errors from the completion provider.
#[derive(Debug, Error)]
pub enum AiProviderError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Provider HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from AI service: {0}")]
    InvalidResponse(String),
}

/// Model parameters sent with every completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&crate::config::AiConfig> for CompletionSettings {
    fn from(config: &crate::config::AiConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Request/response contract of an AI completion service.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        settings: &CompletionSettings,
    ) -> Result<String, AiProviderError>;
}

pub struct ResponseGenerator {
    provider: Arc<dyn CompletionProvider>,
    settings: CompletionSettings,
}

impl ResponseGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: CompletionSettings) -> Self {
        Self { provider, settings }
    }

    /// Send `request` to the provider; on any failure return a fallback reply.
    pub async fn generate(&self, request: &AiRequest) -> String {
        match self.provider.complete(&request.messages, &self.settings).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, model = %self.settings.model, "completion failed, using fallback reply");
                fallback_reply(request).to_string()
            }
        }
    }
}

/// Deterministic reply for a failed completion.
pub fn fallback_reply(request: &AiRequest) -> &'static str {
    if request.data_relevant && !request.has_credential {
        CONNECT_ACCOUNT_FALLBACK
    } else {
        GENERIC_FALLBACK
    }
}
