// ============================================================================
// REMIT-INVOICING - Activation Workflow
// ============================================================================
// Drives one invoice from fetched record to submitted payment:
//
//   fetch -> status check -> template -> orchestrated transaction -> record
//
// The invoice status update runs only after the cluster accepted the
// transaction, never speculatively. At most one activation per invoice is
// in flight at a time.
// ============================================================================

use crate::backend::InvoiceBackend;
use crate::error::ActivationError;
use crate::Result;
use remit_chain::rpc::TransportSource;
use remit_chain::transaction::TransactionTemplate;
use remit_chain::{
    ChainError, Commitment, JobKind, Signature, SignerBridge, TransactionJob,
    TransactionOrchestrator,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Summary of a successful activation
#[derive(Debug, Clone)]
pub struct ActivationOutcome {
    pub invoice_id: String,

    /// Cluster-side reference returned by submission
    pub submission_reference: Signature,

    /// Backend-side hash recorded with the invoice
    pub invoice_tx_hash: String,

    pub job: TransactionJob,
}

/// Releases the per-invoice slot when the activation attempt ends
struct InFlightGuard<'a> {
    registry: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.registry.lock() {
            in_flight.remove(&self.id);
        }
    }
}

/// Invoice activation on top of the settlement core
pub struct ActivationWorkflow {
    transports: Arc<dyn TransportSource>,
    signer: Arc<SignerBridge>,
    backend: Arc<dyn InvoiceBackend>,
    commitment: Commitment,
    in_flight: Mutex<HashSet<String>>,
}

impl ActivationWorkflow {
    pub fn new(
        transports: Arc<dyn TransportSource>,
        signer: Arc<SignerBridge>,
        backend: Arc<dyn InvoiceBackend>,
    ) -> Self {
        Self {
            transports,
            signer,
            backend,
            commitment: Commitment::Confirmed,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    fn begin(&self, id: &str) -> Result<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().map_err(|_| {
            ActivationError::Chain(ChainError::Internal(
                "In-flight registry lock poisoned".to_string(),
            ))
        })?;

        if !in_flight.insert(id.to_string()) {
            return Err(ActivationError::AlreadyInProgress(id.to_string()));
        }
        Ok(InFlightGuard {
            registry: &self.in_flight,
            id: id.to_string(),
        })
    }

    /// Activate one invoice end to end.
    ///
    /// A second call for the same invoice while one is in flight fails with
    /// `AlreadyInProgress` before touching the backend. Independent invoices
    /// activate concurrently. On any failed transaction job the invoice is
    /// left untouched and the settlement failure is surfaced; a backend
    /// update failure after a successful submission is reported as a backend
    /// error with the submission reference logged.
    pub async fn activate(
        &self,
        invoice_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ActivationOutcome> {
        let _guard = self.begin(invoice_id)?;
        info!(invoice = invoice_id, "activation started");

        // No wallet attached: fail before any backend or cluster traffic
        if !self.signer.capability().is_ready() {
            return Err(ActivationError::Chain(ChainError::SignerUnavailable));
        }

        let invoice = self.backend.fetch_invoice(invoice_id).await?;
        if !invoice.status.is_activatable() {
            return Err(ActivationError::NotActivatable {
                id: invoice_id.to_string(),
                status: invoice.status,
            });
        }

        let template = self.backend.prepare_activation(invoice_id).await?;

        // One transport handle for the whole run; a cluster switch mid-run
        // fails this job instead of straddling two endpoints.
        let rpc = self.transports.transport();
        let orchestrator =
            TransactionOrchestrator::new(rpc, self.signer.clone()).with_commitment(self.commitment);

        let encoded = template.transaction.clone();
        let job = orchestrator
            .run(
                JobKind::InvoiceActivation,
                move || TransactionTemplate::from_base64(&encoded),
                cancel,
            )
            .await;

        let reference = match job.outcome() {
            Ok(reference) => reference,
            Err(e) => {
                warn!(invoice = invoice_id, error = %e, "activation job failed, invoice untouched");
                return Err(ActivationError::Chain(e));
            }
        };

        // The backend stores its own template hash, not the submission
        // reference; both are logged for correlation.
        if let Err(e) = self
            .backend
            .record_activation(invoice_id, &template.invoice_tx_hash)
            .await
        {
            warn!(
                invoice = invoice_id,
                reference = %reference,
                error = %e,
                "submission succeeded but the invoice update failed"
            );
            return Err(e);
        }

        info!(invoice = invoice_id, reference = %reference, "invoice activated");
        Ok(ActivationOutcome {
            invoice_id: invoice_id.to_string(),
            submission_reference: reference,
            invoice_tx_hash: template.invoice_tx_hash,
            job,
        })
    }
}
