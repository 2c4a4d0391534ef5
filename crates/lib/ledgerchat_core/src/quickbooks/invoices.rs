// @zen-component: QB-InvoiceFetcher
//
//! Invoice retrieval from the QuickBooks accounting query endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::AuthError;
use super::refresh::RefreshGuard;
use crate::credential::Credential;

/// Query issued for every invoice fetch.
pub const INVOICE_QUERY: &str = "SELECT * FROM Invoice";

/// Errors from an invoice fetch. Callers treat any of them as "no data".
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Credential unusable: {0}")]
    Credential(#[from] AuthError),

    #[error("Invoice request failed: {0}")]
    Request(String),

    #[error("Invoice query HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invoice response parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Whether the failure means the user has to reconnect QuickBooks.
    pub fn requires_reauthorization(&self) -> bool {
        match self {
            FetchError::Credential(e) => e.requires_reauthorization(),
            FetchError::Status { status, .. } => *status == 401,
            _ => false,
        }
    }
}

/// Read-only projection of a QuickBooks invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    pub id: String,
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub due_date: Option<String>,
    pub total_amount: f64,
    pub balance: f64,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryEnvelope {
    #[serde(rename = "QueryResponse", default)]
    query_response: QueryResponse,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    // Absent when the query matches nothing.
    #[serde(rename = "Invoice", default)]
    invoice: Vec<RawInvoice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawInvoice {
    id: String,
    customer_ref: RawReference,
    due_date: Option<String>,
    total_amt: f64,
    balance: f64,
    #[serde(rename = "status")]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReference {
    value: String,
    name: Option<String>,
}

impl From<RawInvoice> for InvoiceRecord {
    fn from(raw: RawInvoice) -> Self {
        Self {
            id: raw.id,
            customer_id: raw.customer_ref.value,
            customer_name: raw.customer_ref.name,
            due_date: raw.due_date,
            total_amount: raw.total_amt,
            balance: raw.balance,
            status: raw.status,
        }
    }
}

/// Source of invoice records for a credential.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    async fn fetch_invoices(&self, credential: &Credential)
    -> Result<Vec<InvoiceRecord>, FetchError>;
}

/// Fetches invoices over HTTP, refreshing the credential first when needed.
pub struct InvoiceFetcher {
    http: reqwest::Client,
    api_base_url: String,
    guard: Arc<RefreshGuard>,
}

impl InvoiceFetcher {
    pub fn new(http: reqwest::Client, api_base_url: impl Into<String>, guard: Arc<RefreshGuard>) -> Self {
        Self {
            http,
            api_base_url: api_base_url.into(),
            guard,
        }
    }

    fn query_url(&self, account_id: &str) -> String {
        format!(
            "{}/v3/company/{account_id}/query",
            self.api_base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl RecordFetcher for InvoiceFetcher {
    async fn fetch_invoices(
        &self,
        credential: &Credential,
    ) -> Result<Vec<InvoiceRecord>, FetchError> {
        let credential = self.guard.ensure_valid(credential).await?;

        let resp = self
            .http
            .post(self.query_url(&credential.account_id))
            .bearer_auth(&credential.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, "application/text")
            .body(INVOICE_QUERY)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let envelope: QueryEnvelope = resp
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        let records: Vec<InvoiceRecord> = envelope
            .query_response
            .invoice
            .into_iter()
            .map(InvoiceRecord::from)
            .collect();
        debug!(account_id = %credential.account_id, count = records.len(), "invoices fetched");
        Ok(records)
    }
}
