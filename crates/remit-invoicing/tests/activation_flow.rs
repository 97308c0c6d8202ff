// ============================================================================
// REMIT-INVOICING - Activation Flow Tests
// ============================================================================
// Workflow scenarios against a scripted backend and a scripted cluster.
// ============================================================================

use async_trait::async_trait;
use chrono::Utc;
use remit_chain::rpc::{
    AccountSnapshot, ChainRpc, Commitment, LatestBlockhash, SignatureRecord, SubmitOptions,
    TransactionDetail, TransportSource,
};
use remit_chain::{
    Address, Blockhash, ChainError, JobState, LocalKeypairSigner, Signature, SignerBridge,
};
use remit_invoicing::backend::ActivationTemplate;
use remit_invoicing::{
    ActivationError, ActivationWorkflow, Invoice, InvoiceBackend, InvoiceStatus,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SCRIPTED CLUSTER
// ============================================================================

struct MockRpc {
    blockhash_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    reject_submission: bool,
}

impl MockRpc {
    fn accepting() -> Arc<Self> {
        Arc::new(Self {
            blockhash_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            reject_submission: false,
        })
    }

    fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            blockhash_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            reject_submission: true,
        })
    }

    fn reference() -> Signature {
        Signature::new([9u8; 64])
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn latest_blockhash(
        &self,
        _commitment: Commitment,
        _cancel: &CancellationToken,
    ) -> remit_chain::Result<LatestBlockhash> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(LatestBlockhash {
            blockhash: Blockhash::new([7u8; 32]),
            last_valid_block_height: 1000,
        })
    }

    async fn submit_transaction(
        &self,
        _wire_base64: &str,
        _options: SubmitOptions,
        _cancel: &CancellationToken,
    ) -> remit_chain::Result<Signature> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_submission {
            return Err(ChainError::RejectedBySimulation(
                "Transaction simulation failed: insufficient funds for fees".to_string(),
            ));
        }
        Ok(Self::reference())
    }

    async fn account_state(
        &self,
        _address: &Address,
        _commitment: Commitment,
        _cancel: &CancellationToken,
    ) -> remit_chain::Result<Option<AccountSnapshot>> {
        Ok(None)
    }

    async fn balance(
        &self,
        _address: &Address,
        _commitment: Commitment,
        _cancel: &CancellationToken,
    ) -> remit_chain::Result<u64> {
        Ok(0)
    }

    async fn signatures_for(
        &self,
        _address: &Address,
        _limit: usize,
        _cancel: &CancellationToken,
    ) -> remit_chain::Result<Vec<SignatureRecord>> {
        Ok(Vec::new())
    }

    async fn transaction_detail(
        &self,
        _signature: &Signature,
        _cancel: &CancellationToken,
    ) -> remit_chain::Result<Option<TransactionDetail>> {
        Ok(None)
    }
}

struct MockTransportSource(Arc<MockRpc>);

impl TransportSource for MockTransportSource {
    fn transport(&self) -> Arc<dyn ChainRpc> {
        self.0.clone()
    }
}

// ============================================================================
// SCRIPTED BACKEND
// ============================================================================

struct MockBackend {
    invoices: Mutex<HashMap<String, Invoice>>,
    template: ActivationTemplate,
    fetch_calls: AtomicUsize,
    prepare_calls: AtomicUsize,
    record_calls: AtomicUsize,
    fail_record: bool,
    hold_prepare: Option<CancellationToken>,
}

impl MockBackend {
    fn new(invoices: Vec<Invoice>) -> Self {
        Self {
            invoices: Mutex::new(invoices.into_iter().map(|i| (i.id.clone(), i)).collect()),
            template: ActivationTemplate {
                transaction: "AQIDBA==".to_string(),
                invoice_tx_hash: "hash-from-backend".to_string(),
            },
            fetch_calls: AtomicUsize::new(0),
            prepare_calls: AtomicUsize::new(0),
            record_calls: AtomicUsize::new(0),
            fail_record: false,
            hold_prepare: None,
        }
    }

    fn failing_record(mut self) -> Self {
        self.fail_record = true;
        self
    }

    /// Park `prepare_activation` until the latch fires
    fn holding_prepare(mut self, latch: CancellationToken) -> Self {
        self.hold_prepare = Some(latch);
        self
    }

    fn stored(&self, id: &str) -> Invoice {
        self.invoices.lock().unwrap().get(id).cloned().unwrap()
    }
}

#[async_trait]
impl InvoiceBackend for MockBackend {
    async fn fetch_invoice(&self, id: &str) -> remit_invoicing::Result<Invoice> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.invoices
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ActivationError::NotFound(id.to_string()))
    }

    async fn prepare_activation(&self, id: &str) -> remit_invoicing::Result<ActivationTemplate> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latch) = &self.hold_prepare {
            latch.cancelled().await;
        }
        if !self.invoices.lock().unwrap().contains_key(id) {
            return Err(ActivationError::NotFound(id.to_string()));
        }
        Ok(self.template.clone())
    }

    async fn record_activation(&self, id: &str, tx_hash: &str) -> remit_invoicing::Result<()> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_record {
            return Err(ActivationError::Backend("Update rejected".to_string()));
        }
        let mut invoices = self.invoices.lock().unwrap();
        let invoice = invoices
            .get_mut(id)
            .ok_or_else(|| ActivationError::NotFound(id.to_string()))?;
        invoice.status = InvoiceStatus::Processing;
        invoice.invoice_tx_hash = Some(tx_hash.to_string());
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn invoice(id: &str, status: InvoiceStatus) -> Invoice {
    Invoice {
        id: id.to_string(),
        invoice_number: format!("INV-2024-{}", id),
        recipient: "Acme Logistics".to_string(),
        amount: "1250.00".to_string(),
        currency: "USDC".to_string(),
        status,
        invoice_tx_hash: None,
        created_at: Utc::now(),
        due_at: None,
    }
}

async fn ready_bridge() -> Arc<SignerBridge> {
    let bridge = Arc::new(SignerBridge::new());
    bridge
        .connect(Arc::new(LocalKeypairSigner::generate()))
        .await;
    bridge
}

fn workflow(
    backend: Arc<MockBackend>,
    rpc: Arc<MockRpc>,
    bridge: Arc<SignerBridge>,
) -> ActivationWorkflow {
    ActivationWorkflow::new(Arc::new(MockTransportSource(rpc)), bridge, backend)
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn happy_path_submits_then_records() {
    let backend = Arc::new(MockBackend::new(vec![invoice("inv-1", InvoiceStatus::Draft)]));
    let rpc = MockRpc::accepting();
    let workflow = workflow(backend.clone(), rpc.clone(), ready_bridge().await);

    let outcome = workflow
        .activate("inv-1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.invoice_id, "inv-1");
    assert_eq!(outcome.submission_reference, MockRpc::reference());
    assert_eq!(outcome.invoice_tx_hash, "hash-from-backend");
    assert_eq!(outcome.job.state(), JobState::Submitted);

    assert_eq!(rpc.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.record_calls.load(Ordering::SeqCst), 1);

    // The backend keeps its own template hash, not the cluster reference
    let stored = backend.stored("inv-1");
    assert_eq!(stored.status, InvoiceStatus::Processing);
    assert_eq!(stored.invoice_tx_hash.as_deref(), Some("hash-from-backend"));
    assert_ne!(
        stored.invoice_tx_hash.unwrap(),
        outcome.submission_reference.to_string()
    );
}

#[tokio::test]
async fn overdue_invoice_is_activatable() {
    let backend = Arc::new(MockBackend::new(vec![invoice(
        "inv-9",
        InvoiceStatus::Overdue,
    )]));
    let rpc = MockRpc::accepting();
    let workflow = workflow(backend.clone(), rpc, ready_bridge().await);

    workflow
        .activate("inv-9", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(backend.stored("inv-9").status, InvoiceStatus::Processing);
}

#[tokio::test]
async fn absent_signer_fails_before_backend_traffic() {
    let backend = Arc::new(MockBackend::new(vec![invoice("inv-1", InvoiceStatus::Draft)]));
    let rpc = MockRpc::accepting();
    let workflow = workflow(backend.clone(), rpc.clone(), Arc::new(SignerBridge::new()));

    let result = workflow.activate("inv-1", &CancellationToken::new()).await;
    assert!(matches!(
        result,
        Err(ActivationError::Chain(ChainError::SignerUnavailable))
    ));

    assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(rpc.blockhash_calls.load(Ordering::SeqCst), 0);
    assert_eq!(rpc.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_activatable_statuses_are_refused() {
    let backend = Arc::new(MockBackend::new(vec![
        invoice("inv-paid", InvoiceStatus::Completed),
        invoice("inv-pending", InvoiceStatus::Processing),
    ]));
    let rpc = MockRpc::accepting();
    let workflow = workflow(backend.clone(), rpc, ready_bridge().await);

    for id in ["inv-paid", "inv-pending"] {
        let result = workflow.activate(id, &CancellationToken::new()).await;
        assert!(
            matches!(result, Err(ActivationError::NotActivatable { .. })),
            "{}",
            id
        );
    }
    assert_eq!(backend.prepare_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_invoice_is_not_found() {
    let backend = Arc::new(MockBackend::new(Vec::new()));
    let workflow = workflow(backend, MockRpc::accepting(), ready_bridge().await);

    let result = workflow.activate("inv-404", &CancellationToken::new()).await;
    assert!(matches!(result, Err(ActivationError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn concurrent_activation_of_same_invoice_is_rejected() {
    let latch = CancellationToken::new();
    let backend = Arc::new(
        MockBackend::new(vec![invoice("inv-1", InvoiceStatus::Draft)])
            .holding_prepare(latch.clone()),
    );
    let rpc = MockRpc::accepting();
    let workflow = Arc::new(workflow(backend.clone(), rpc.clone(), ready_bridge().await));

    let first = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.activate("inv-1", &CancellationToken::new()).await })
    };

    // First attempt is parked inside the backend call
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = workflow.activate("inv-1", &CancellationToken::new()).await;
    assert!(matches!(second, Err(ActivationError::AlreadyInProgress(_))));

    latch.cancel();
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome.invoice_id, "inv-1");
    assert_eq!(rpc.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.record_calls.load(Ordering::SeqCst), 1);

    // Slot released; a later attempt is refused on status instead
    let after = workflow.activate("inv-1", &CancellationToken::new()).await;
    assert!(matches!(after, Err(ActivationError::NotActivatable { .. })));
}

#[tokio::test]
async fn independent_invoices_activate_concurrently() {
    let backend = Arc::new(MockBackend::new(vec![
        invoice("inv-1", InvoiceStatus::Draft),
        invoice("inv-2", InvoiceStatus::Draft),
    ]));
    let rpc = MockRpc::accepting();
    let workflow = workflow(backend.clone(), rpc.clone(), ready_bridge().await);

    let cancel = CancellationToken::new();
    let (a, b) = tokio::join!(
        workflow.activate("inv-1", &cancel),
        workflow.activate("inv-2", &cancel)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(rpc.submit_calls.load(Ordering::SeqCst), 2);
    assert_eq!(backend.stored("inv-1").status, InvoiceStatus::Processing);
    assert_eq!(backend.stored("inv-2").status, InvoiceStatus::Processing);
}

#[tokio::test]
async fn simulation_rejection_leaves_invoice_untouched() {
    let backend = Arc::new(MockBackend::new(vec![invoice("inv-1", InvoiceStatus::Draft)]));
    let rpc = MockRpc::rejecting();
    let workflow = workflow(backend.clone(), rpc.clone(), ready_bridge().await);

    let result = workflow.activate("inv-1", &CancellationToken::new()).await;
    match result {
        Err(ActivationError::Chain(ChainError::RejectedBySimulation(_))) => {}
        other => panic!("expected simulation rejection, got {:?}", other),
    }

    assert_eq!(rpc.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.record_calls.load(Ordering::SeqCst), 0);

    let stored = backend.stored("inv-1");
    assert_eq!(stored.status, InvoiceStatus::Draft);
    assert_eq!(stored.invoice_tx_hash, None);

    // The in-flight slot was released; a retry reaches submission again
    let retry = workflow.activate("inv-1", &CancellationToken::new()).await;
    assert!(matches!(
        retry,
        Err(ActivationError::Chain(ChainError::RejectedBySimulation(_)))
    ));
    assert_eq!(rpc.submit_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn record_failure_after_submission_surfaces_backend_error() {
    let backend = Arc::new(
        MockBackend::new(vec![invoice("inv-1", InvoiceStatus::Draft)]).failing_record(),
    );
    let rpc = MockRpc::accepting();
    let workflow = workflow(backend.clone(), rpc.clone(), ready_bridge().await);

    let result = workflow.activate("inv-1", &CancellationToken::new()).await;
    assert!(matches!(result, Err(ActivationError::Backend(_))));

    // The payment went out even though the update failed
    assert_eq!(rpc.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.record_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.stored("inv-1").status, InvoiceStatus::Draft);
}

#[tokio::test]
async fn pre_cancelled_token_aborts_before_submission() {
    let backend = Arc::new(MockBackend::new(vec![invoice("inv-1", InvoiceStatus::Draft)]));
    let rpc = MockRpc::accepting();
    let workflow = workflow(backend.clone(), rpc.clone(), ready_bridge().await);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = workflow.activate("inv-1", &cancel).await;
    assert!(matches!(
        result,
        Err(ActivationError::Chain(ChainError::Cancelled))
    ));
    assert_eq!(rpc.submit_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.record_calls.load(Ordering::SeqCst), 0);
}
