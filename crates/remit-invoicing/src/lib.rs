// ============================================================================
// REMIT-INVOICING - Invoice Activation
// ============================================================================
// Invoice model, backend API client, and the activation workflow that pays
// invoices through the settlement core.
// ============================================================================

pub mod activation;
pub mod backend;
pub mod error;
pub mod model;
pub mod wallet;

pub use activation::{ActivationOutcome, ActivationWorkflow};
pub use backend::{ActivationTemplate, ApiResponse, HttpInvoiceBackend, InvoiceBackend};
pub use error::ActivationError;
pub use model::{Invoice, InvoiceStatus};
pub use wallet::WalletOverview;

/// Convenience result type for invoicing operations
pub type Result<T> = std::result::Result<T, ActivationError>;
