// @zen-component: AI-OpenAIProvider
//
//! OpenAI chat-completions provider.
//!
//! Calls `{base_url}/chat/completions` once per turn. Failures are not
//! retried; the caller falls back to a canned reply instead.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AiProviderError, CompletionProvider, CompletionSettings};
use crate::chat::context::ChatMessage;
use crate::config::AiConfig;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(client: Client, config: &AiConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        settings: &CompletionSettings,
    ) -> Result<String, AiProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiProviderError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&CompletionRequest {
                model: &settings.model,
                messages,
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
            })
            .send()
            .await
            .map_err(|e| AiProviderError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(AiProviderError::Status { status, body });
        }

        let data: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| AiProviderError::InvalidResponse(e.to_string()))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AiProviderError::InvalidResponse("no choices returned".to_string()))
    }
}
