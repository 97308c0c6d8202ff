// ============================================================================
// REMIT-CHAIN - Error Types
// ============================================================================

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ChainError {
    // ==================== Transaction Lifecycle Errors ====================
    #[error("Transaction assembly failed: {0}")]
    Build(String),

    #[error("Transaction rejected by preflight simulation: {0}")]
    RejectedBySimulation(String),

    #[error("Wire encoding failed: {0}")]
    Encoding(String),

    // ==================== Signer Errors ====================
    #[error("Wallet signer not connected or capability lost")]
    SignerUnavailable,

    #[error("Signing request declined by the wallet user")]
    UserRejected,

    // ==================== Network Errors ====================
    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Operation cancelled")]
    Cancelled,

    // ==================== Cluster Errors ====================
    #[error("Cluster endpoint not found: {0}")]
    ClusterNotFound(String),

    #[error("Invalid cluster endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Cluster endpoint is active: {0}")]
    ActiveEndpointInUse(String),

    // ==================== Storage Errors ====================
    #[error("Storage error: {0}")]
    Storage(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChainError {
    /// Create a network error with context
    pub fn network(msg: impl Into<String>) -> Self {
        ChainError::Network(msg.into())
    }

    /// Create a build error with context
    pub fn build(msg: impl Into<String>) -> Self {
        ChainError::Build(msg.into())
    }

    /// Create an internal error with context
    pub fn internal(msg: impl Into<String>) -> Self {
        ChainError::Internal(msg.into())
    }

    /// Whether a fresh attempt of the same operation could succeed.
    ///
    /// Only transport failures qualify. A preflight rejection means the
    /// payload itself is bad and resubmitting it unchanged cannot help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::Network(_))
    }
}

// Convert from various error types

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChainError::Network(format!("Request timed out: {}", e))
        } else if e.is_connect() {
            ChainError::Network(format!("Connection failed: {}", e))
        } else {
            ChainError::Network(e.to_string())
        }
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(e: rusqlite::Error) -> Self {
        ChainError::Storage(e.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for ChainError {
    fn from(e: ed25519_dalek::SignatureError) -> Self {
        ChainError::Encoding(format!("Signature check failed: {}", e))
    }
}

impl From<base64::DecodeError> for ChainError {
    fn from(e: base64::DecodeError) -> Self {
        ChainError::Encoding(format!("Invalid base64: {}", e))
    }
}

impl From<bs58::decode::Error> for ChainError {
    fn from(e: bs58::decode::Error) -> Self {
        ChainError::Encoding(format!("Invalid base58: {}", e))
    }
}
