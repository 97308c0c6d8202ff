// ============================================================================
// REMIT-CHAIN - Transaction Orchestrator
// ============================================================================
// Drives one transaction from template to submission through a monotonic
// state machine:
//
//   Building -> AwaitingSignature -> Signed -> Submitting -> Submitted
//                                                          -> Confirmed
//
// Failed is terminal and reachable from every non-terminal state. States
// never move backwards, and a terminal state never changes again.
// ============================================================================

use crate::address::Signature;
use crate::error::ChainError;
use crate::rpc::{ChainRpc, Commitment, SubmitOptions};
use crate::signer::SignerBridge;
use crate::transaction::{TransactionMessage, TransactionTemplate, UnsignedTransaction};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// JOB STATE
// ============================================================================

/// Lifecycle state of a transaction job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    Building,
    AwaitingSignature,
    Signed,
    Submitting,
    Submitted,
    Confirmed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Confirmed | JobState::Failed)
    }

    /// Whether moving to `next` is a legal forward step
    pub fn can_transition(&self, next: JobState) -> bool {
        use JobState::*;

        if *self == next {
            return false;
        }
        match (*self, next) {
            (Building, AwaitingSignature)
            | (AwaitingSignature, Signed)
            | (Signed, Submitting)
            | (Submitting, Submitted)
            | (Submitted, Confirmed) => true,
            (state, Failed) => !state.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Building => "building",
            JobState::AwaitingSignature => "awaitingSignature",
            JobState::Signed => "signed",
            JobState::Submitting => "submitting",
            JobState::Submitted => "submitted",
            JobState::Confirmed => "confirmed",
            JobState::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// What a job is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    InvoiceActivation,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::InvoiceActivation => write!(f, "invoiceActivation"),
        }
    }
}

// ============================================================================
// JOB
// ============================================================================

/// One transaction run, from template to terminal state.
///
/// State moves only through `advance`/`fail`, which enforce the transition
/// rules; everything else on the job is plain data for callers.
#[derive(Debug, Clone)]
pub struct TransactionJob {
    pub id: Uuid,
    pub kind: JobKind,
    state: JobState,
    trace: Vec<JobState>,
    pub unsigned: Option<UnsignedTransaction>,
    pub signed_wire: Option<String>,
    pub submission_reference: Option<Signature>,
    pub error: Option<ChainError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionJob {
    pub fn new(kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            state: JobState::Building,
            trace: vec![JobState::Building],
            unsigned: None,
            signed_wire: None,
            submission_reference: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// States visited so far, in order
    pub fn trace(&self) -> &[JobState] {
        &self.trace
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Advance the state machine. Illegal transitions are logged and
    /// ignored; the job keeps its current state.
    pub(crate) fn advance(&mut self, next: JobState) {
        if !self.state.can_transition(next) {
            error!(job = %self.id, from = %self.state, to = %next, "illegal job transition ignored");
            return;
        }
        self.state = next;
        self.trace.push(next);
        self.updated_at = Utc::now();
    }

    /// Fail the job. A job already in a terminal state is left untouched.
    pub(crate) fn fail(&mut self, error: ChainError) {
        if self.state.is_terminal() {
            error!(job = %self.id, error = %error, "failure after terminal state ignored");
            return;
        }
        warn!(job = %self.id, state = %self.state, error = %error, "job failed");
        self.error = Some(error);
        self.advance(JobState::Failed);
    }

    /// Collapse the job into a submission outcome
    pub fn outcome(&self) -> Result<Signature> {
        match self.state {
            JobState::Submitted | JobState::Confirmed => {
                self.submission_reference.ok_or_else(|| {
                    ChainError::Internal("Submitted job missing reference".to_string())
                })
            }
            JobState::Failed => Err(self
                .error
                .clone()
                .unwrap_or_else(|| ChainError::Internal("Job failed without error".to_string()))),
            state => Err(ChainError::Internal(format!(
                "Job still in progress: {}",
                state
            ))),
        }
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Runs transaction jobs against one transport handle and the signer bridge
pub struct TransactionOrchestrator {
    rpc: Arc<dyn ChainRpc>,
    signer: Arc<SignerBridge>,
    commitment: Commitment,
}

impl TransactionOrchestrator {
    pub fn new(rpc: Arc<dyn ChainRpc>, signer: Arc<SignerBridge>) -> Self {
        Self {
            rpc,
            signer,
            commitment: Commitment::Confirmed,
        }
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    /// Drive one transaction end to end.
    ///
    /// Failures land on the returned job instead of an `Err`; callers read
    /// `outcome()`. The signer capability is checked before any network
    /// traffic, so a missing wallet fails the job without touching the
    /// cluster. Submission keeps preflight enabled; a simulation rejection
    /// is fatal and is never retried here. Retrying a transient network
    /// failure is a fresh job started by the caller.
    pub async fn run<F>(
        &self,
        kind: JobKind,
        build: F,
        cancel: &CancellationToken,
    ) -> TransactionJob
    where
        F: FnOnce() -> Result<TransactionTemplate> + Send,
    {
        let mut job = TransactionJob::new(kind);
        info!(job = %job.id, kind = %job.kind, "transaction job started");

        if cancel.is_cancelled() {
            job.fail(ChainError::Cancelled);
            return job;
        }

        let capability = self.signer.capability();
        let Some(fee_payer) = capability.public_identity.filter(|_| capability.can_sign) else {
            job.fail(ChainError::SignerUnavailable);
            return job;
        };

        let template = match build() {
            Ok(template) => template,
            Err(e) => {
                let e = match e {
                    e @ (ChainError::Build(_) | ChainError::Cancelled) => e,
                    other => ChainError::Build(other.to_string()),
                };
                job.fail(e);
                return job;
            }
        };

        let blockhash = match self.rpc.latest_blockhash(self.commitment, cancel).await {
            Ok(latest) => latest.blockhash,
            Err(e) => {
                job.fail(e);
                return job;
            }
        };

        let unsigned = UnsignedTransaction::new(TransactionMessage::new(
            fee_payer, blockhash, template,
        ));
        job.unsigned = Some(unsigned.clone());
        job.advance(JobState::AwaitingSignature);

        let signed = match self.signer.sign(&unsigned, cancel).await {
            Ok(signed) => signed,
            Err(e) => {
                job.fail(e);
                return job;
            }
        };
        job.advance(JobState::Signed);

        if let Err(e) = signed.verify() {
            job.fail(e);
            return job;
        }
        let wire = signed.wire_encode();
        job.signed_wire = Some(wire.clone());

        job.advance(JobState::Submitting);
        let options = SubmitOptions {
            commitment: self.commitment,
            skip_preflight: false,
        };

        match self.rpc.submit_transaction(&wire, options, cancel).await {
            Ok(reference) => {
                job.submission_reference = Some(reference);
                job.advance(JobState::Submitted);
                info!(
                    job = %job.id,
                    reference = %reference,
                    digest = %signed.digest(),
                    "transaction submitted"
                );
            }
            Err(e) => job.fail(e),
        }
        job
    }

    /// Follow-up confirmation check for a submitted job.
    ///
    /// One lookup, no polling: a clean detail advances the job to
    /// `Confirmed`, an on-chain execution error fails it, and a transaction
    /// the cluster has not processed yet leaves it `Submitted`.
    pub async fn check_confirmation(
        &self,
        job: &mut TransactionJob,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if job.state != JobState::Submitted {
            return Err(ChainError::Internal(format!(
                "Confirmation check on a job in state {}",
                job.state
            )));
        }
        let reference = job
            .submission_reference
            .ok_or_else(|| ChainError::Internal("Submitted job missing reference".to_string()))?;

        match self.rpc.transaction_detail(&reference, cancel).await? {
            None => {}
            Some(detail) if detail.succeeded() => {
                job.advance(JobState::Confirmed);
                info!(job = %job.id, reference = %reference, "transaction confirmed");
            }
            Some(detail) => {
                let reason = detail
                    .err
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                job.fail(ChainError::Network(format!(
                    "Transaction failed on chain: {}",
                    reason
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
