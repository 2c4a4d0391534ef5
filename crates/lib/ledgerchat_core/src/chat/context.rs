// @zen-component: CHAT-ContextAssembler
//
//! Assembles the outgoing AI request for one conversational turn.
//!
//! Prompt order is fixed: capability notice, optional invoice snapshot,
//! chat history, latest user turn. A failed invoice fetch never fails the
//! turn; it is recorded in [`InvoiceContext::Unavailable`] and the request
//! is built without the snapshot.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::intent::IntentClassifier;
use super::{ConversationTurn, Role};
use crate::credential::Credential;
use crate::quickbooks::{FetchError, InvoiceRecord, RecordFetcher};

pub const CONNECTED_NOTICE: &str = "You are an AI assistant with access to QuickBooks invoice data. Help the user with their financial questions.";

pub const DISCONNECTED_NOTICE: &str = "You are an AI assistant that can help with financial questions. Note that you do not have access to QuickBooks data because the user has not connected their account yet.";

const SNAPSHOT_PREFIX: &str = "Here is the latest invoice data from QuickBooks:\n\n";
const SNAPSHOT_SUFFIX: &str = "\n\nUse this data to answer the user's question.";

/// `{role, content}` pair sent to the completion provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self::new(turn.role, turn.content.clone())
    }
}

/// What happened to invoice data for this turn.
#[derive(Debug)]
pub enum InvoiceContext {
    /// No credential; nothing was attempted.
    NotConnected,
    /// The message did not look data-related.
    NotRelevant,
    /// Fetch succeeded with no rows; nothing injected.
    Empty,
    /// Records were injected as a snapshot turn.
    Injected(Vec<InvoiceRecord>),
    /// Fetch failed; the turn continues without data.
    Unavailable(FetchError),
}

/// Fully assembled request for the AI provider.
#[derive(Debug)]
pub struct AiRequest {
    pub messages: Vec<ChatMessage>,
    pub data_relevant: bool,
    pub has_credential: bool,
    pub invoice_context: InvoiceContext,
}

impl AiRequest {
    /// Whether the invoice fetch showed the credential is no longer usable.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(&self.invoice_context, InvoiceContext::Unavailable(e) if e.requires_reauthorization())
    }
}

pub struct ContextAssembler {
    classifier: Arc<dyn IntentClassifier>,
    fetcher: Arc<dyn RecordFetcher>,
}

impl ContextAssembler {
    pub fn new(classifier: Arc<dyn IntentClassifier>, fetcher: Arc<dyn RecordFetcher>) -> Self {
        Self {
            classifier,
            fetcher,
        }
    }

    pub async fn build_request(
        &self,
        history: &[ConversationTurn],
        latest_user_turn: &ConversationTurn,
        credential: Option<&Credential>,
    ) -> AiRequest {
        let data_relevant = self.classifier.is_data_relevant(&latest_user_turn.content);

        let invoice_context = match credential {
            None => InvoiceContext::NotConnected,
            Some(_) if !data_relevant => InvoiceContext::NotRelevant,
            Some(credential) => self.fetch(credential).await,
        };

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ChatMessage::new(
            Role::System,
            if credential.is_some() {
                CONNECTED_NOTICE
            } else {
                DISCONNECTED_NOTICE
            },
        ));
        if let InvoiceContext::Injected(records) = &invoice_context
            && let Some(snapshot) = snapshot_message(records)
        {
            messages.push(snapshot);
        }
        messages.extend(history.iter().map(ChatMessage::from));
        messages.push(ChatMessage::from(latest_user_turn));

        AiRequest {
            messages,
            data_relevant,
            has_credential: credential.is_some(),
            invoice_context,
        }
    }

    async fn fetch(&self, credential: &Credential) -> InvoiceContext {
        match self.fetcher.fetch_invoices(credential).await {
            Ok(records) if records.is_empty() => {
                debug!(account_id = %credential.account_id, "no invoices to inject");
                InvoiceContext::Empty
            }
            Ok(records) => InvoiceContext::Injected(records),
            Err(e) => {
                warn!(account_id = %credential.account_id, error = %e, "invoice fetch failed, continuing without data");
                InvoiceContext::Unavailable(e)
            }
        }
    }
}

fn snapshot_message(records: &[InvoiceRecord]) -> Option<ChatMessage> {
    match serde_json::to_string_pretty(records) {
        Ok(json) => Some(ChatMessage::new(
            Role::System,
            format!("{SNAPSHOT_PREFIX}{json}{SNAPSHOT_SUFFIX}"),
        )),
        Err(e) => {
            warn!(error = %e, "could not serialize invoice snapshot");
            None
        }
    }
}
