// ============================================================================
// REMIT-CHAIN - Settlement Core
// ============================================================================
// Cluster selection, RPC transport, signing, and transaction orchestration
// for the Remit client. No UI concerns live here; hosts wire these pieces
// together and render on top.
// ============================================================================

pub mod address;
pub mod cluster;
pub mod error;
pub mod manager;
pub mod orchestrator;
pub mod rpc;
pub mod signer;
pub mod store;
pub mod transaction;

pub use address::{Address, Blockhash, Signature};
pub use cluster::{ClusterEndpoint, ClusterRegistry, NetworkKind};
pub use error::ChainError;
pub use manager::ClusterManager;
pub use orchestrator::{JobKind, JobState, TransactionJob, TransactionOrchestrator};
pub use rpc::{
    AccountSnapshot, ChainRpc, Commitment, HistoryEntry, HttpRpcTransport, LatestBlockhash,
    SignatureRecord, SubmitOptions, TransactionDetail, TransportSource,
};
pub use signer::{LocalKeypairSigner, SignError, SignerBridge, SignerCapability, WalletSigner};
pub use store::ClusterStore;
pub use transaction::{
    SignedTransaction, TransactionMessage, TransactionTemplate, UnsignedTransaction,
};

/// Convenience result type for settlement operations
pub type Result<T> = std::result::Result<T, ChainError>;
