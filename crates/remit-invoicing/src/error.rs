// ============================================================================
// REMIT-INVOICING - Error Types
// ============================================================================

use crate::model::InvoiceStatus;
use remit_chain::ChainError;
use thiserror::Error;

/// Errors surfaced by the invoice activation workflow
#[derive(Debug, Clone, Error)]
pub enum ActivationError {
    // ==================== Workflow ====================
    #[error("Activation already in progress for invoice {0}")]
    AlreadyInProgress(String),

    #[error("Invoice {id} cannot be activated in status {status}")]
    NotActivatable { id: String, status: InvoiceStatus },

    // ==================== Backend ====================
    #[error("Invoice not found: {0}")]
    NotFound(String),

    #[error("Backend request failed: {0}")]
    Backend(String),

    // ==================== Settlement ====================
    #[error("Settlement failed: {0}")]
    Chain(#[from] ChainError),
}

impl ActivationError {
    /// Whether a fresh activation attempt could plausibly succeed without
    /// user intervention
    pub fn is_retryable(&self) -> bool {
        match self {
            ActivationError::Backend(_) => true,
            ActivationError::Chain(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ActivationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ActivationError::Backend("Request timed out".to_string())
        } else if e.is_connect() {
            ActivationError::Backend(format!("Connection failed: {}", e))
        } else {
            ActivationError::Backend(e.to_string())
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
