// ============================================================================
// REMIT-INVOICING - Backend API Client
// ============================================================================
// Talks to the invoice backend. The backend owns invoice records and builds
// the unsigned instruction template for each activation; the client signs
// and submits, then reports the activation back.
//
// Endpoints:
// - GET  /invoice/{id}              fetch one invoice
// - POST /invoice/{id}/transaction  build the activation template
// - PUT  /invoice/{id}              update status after submission
// ============================================================================

use crate::error::ActivationError;
use crate::model::{Invoice, InvoiceStatus};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Timeout for backend calls
const BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Response envelope the backend wraps every payload in
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Unsigned-payload template for one invoice activation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationTemplate {
    /// Base64 instruction template to wrap, sign, and submit
    pub transaction: String,

    /// Hash the backend stores with the invoice once activated
    pub invoice_tx_hash: String,
}

/// Invoice backend operations the workflow depends on
#[async_trait]
pub trait InvoiceBackend: Send + Sync {
    /// Fetch one invoice by id
    async fn fetch_invoice(&self, id: &str) -> Result<Invoice>;

    /// Ask the backend to build the activation template for an invoice
    async fn prepare_activation(&self, id: &str) -> Result<ActivationTemplate>;

    /// Mark the invoice as processing after a successful submission
    async fn record_activation(&self, id: &str, tx_hash: &str) -> Result<()>;
}

// ============================================================================
// HTTP CLIENT
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateInvoiceRequest<'a> {
    invoice_status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    invoice_tx_hash: Option<&'a str>,
}

/// Backend client over HTTP
pub struct HttpInvoiceBackend {
    base_url: String,
    http: Client,
}

impl HttpInvoiceBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(BACKEND_TIMEOUT)
            .build()
            .map_err(|e| ActivationError::Backend(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn unwrap_envelope<T>(id: &str, envelope: ApiResponse<T>) -> Result<T> {
        if !envelope.success {
            return Err(ActivationError::Backend(
                envelope
                    .error
                    .unwrap_or_else(|| "Backend reported failure".to_string()),
            ));
        }
        envelope.data.ok_or_else(|| {
            ActivationError::Backend(format!("Backend response for invoice {} has no data", id))
        })
    }
}

#[async_trait]
impl InvoiceBackend for HttpInvoiceBackend {
    async fn fetch_invoice(&self, id: &str) -> Result<Invoice> {
        debug!(id, "fetching invoice");
        let response = self
            .http
            .get(self.endpoint(&format!("/invoice/{}", id)))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ActivationError::NotFound(id.to_string())),
            status if status.is_success() => {
                let envelope: ApiResponse<Invoice> = response.json().await?;
                Self::unwrap_envelope(id, envelope)
            }
            status => Err(ActivationError::Backend(format!(
                "Invoice fetch failed with status {}",
                status
            ))),
        }
    }

    async fn prepare_activation(&self, id: &str) -> Result<ActivationTemplate> {
        debug!(id, "requesting activation template");
        let response = self
            .http
            .post(self.endpoint(&format!("/invoice/{}/transaction", id)))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ActivationError::NotFound(id.to_string())),
            status if status.is_success() => {
                let envelope: ApiResponse<ActivationTemplate> = response.json().await?;
                Self::unwrap_envelope(id, envelope)
            }
            status => Err(ActivationError::Backend(format!(
                "Activation template request failed with status {}",
                status
            ))),
        }
    }

    async fn record_activation(&self, id: &str, tx_hash: &str) -> Result<()> {
        let body = UpdateInvoiceRequest {
            invoice_status: InvoiceStatus::Processing.code(),
            invoice_tx_hash: Some(tx_hash),
        };
        let response = self
            .http
            .put(self.endpoint(&format!("/invoice/{}", id)))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ActivationError::NotFound(id.to_string())),
            status if status.is_success() => {
                info!(id, tx_hash, "invoice marked processing");
                Ok(())
            }
            status => Err(ActivationError::Backend(format!(
                "Invoice update failed with status {}",
                status
            ))),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
