// ============================================================================
// REMIT-CHAIN - Signer Bridge
// ============================================================================
// Connection point between the settlement core and an external wallet
// signer. The wallet is attached and detached at runtime; everything else
// observes it through a capability snapshot and a watch channel.
// ============================================================================

use crate::address::{Address, Signature};
use crate::error::ChainError;
use crate::transaction::{SignedTransaction, UnsignedTransaction};
use crate::Result;
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ============================================================================
// CAPABILITY
// ============================================================================

/// What the currently attached signer can do
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignerCapability {
    pub public_identity: Option<Address>,
    pub can_sign: bool,
}

impl SignerCapability {
    pub fn absent() -> Self {
        Self {
            public_identity: None,
            can_sign: false,
        }
    }

    pub fn ready(identity: Address) -> Self {
        Self {
            public_identity: Some(identity),
            can_sign: true,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.can_sign && self.public_identity.is_some()
    }
}

// ============================================================================
// SIGNER TRAIT
// ============================================================================

/// Failure modes a signer can report
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignError {
    #[error("Signing request rejected by user")]
    Rejected,

    #[error("Signer unavailable: {0}")]
    Unavailable(String),

    #[error("Signing failed: {0}")]
    Failed(String),
}

impl From<SignError> for ChainError {
    fn from(e: SignError) -> Self {
        match e {
            SignError::Rejected => ChainError::UserRejected,
            SignError::Unavailable(_) | SignError::Failed(_) => ChainError::SignerUnavailable,
        }
    }
}

/// External wallet that signs settlement transactions.
///
/// Implementations typically proxy a browser extension or a hardware
/// device; the bridge treats them as slow and fallible.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Public identity this signer signs for
    fn identity(&self) -> Address;

    /// Produce a signed transaction for the given payload
    async fn sign_transaction(
        &self,
        unsigned: &UnsignedTransaction,
    ) -> std::result::Result<SignedTransaction, SignError>;
}

// ============================================================================
// BRIDGE
// ============================================================================

/// Runtime slot for the attached wallet signer
pub struct SignerBridge {
    slot: RwLock<Option<Arc<dyn WalletSigner>>>,
    capability: watch::Sender<SignerCapability>,
}

impl SignerBridge {
    pub fn new() -> Self {
        let (capability, _) = watch::channel(SignerCapability::absent());
        Self {
            slot: RwLock::new(None),
            capability,
        }
    }

    /// Attach a signer. Watchers observe the capability flip to ready.
    pub async fn connect(&self, signer: Arc<dyn WalletSigner>) {
        let identity = signer.identity();
        *self.slot.write().await = Some(signer);
        self.capability
            .send_replace(SignerCapability::ready(identity));
        info!(identity = %identity, "wallet signer connected");
    }

    /// Detach the signer. In-flight signing requests observe the change and
    /// fail instead of waiting on a wallet that is gone.
    pub async fn disconnect(&self) {
        *self.slot.write().await = None;
        self.capability.send_replace(SignerCapability::absent());
        info!("wallet signer disconnected");
    }

    /// Snapshot of the current capability
    pub fn capability(&self) -> SignerCapability {
        self.capability.borrow().clone()
    }

    /// Subscribe to capability changes
    pub fn watch_capability(&self) -> watch::Receiver<SignerCapability> {
        self.capability.subscribe()
    }

    /// Request a signature from the attached signer.
    ///
    /// The request is raced against the caller's token and against signer
    /// detachment. A signature that has already been granted wins over a
    /// cancellation arriving in the same wakeup; a cancellation while the
    /// request is still pending aborts it.
    pub async fn sign(
        &self,
        unsigned: &UnsignedTransaction,
        cancel: &CancellationToken,
    ) -> Result<SignedTransaction> {
        if cancel.is_cancelled() {
            return Err(ChainError::Cancelled);
        }

        let signer = {
            let slot = self.slot.read().await;
            slot.clone().ok_or(ChainError::SignerUnavailable)?
        };

        let mut capability = self.capability.subscribe();
        let sign_fut = signer.sign_transaction(unsigned);
        tokio::pin!(sign_fut);

        loop {
            tokio::select! {
                biased;

                outcome = &mut sign_fut => {
                    return match outcome {
                        Ok(signed) => Ok(signed),
                        Err(SignError::Rejected) => {
                            info!("signing request rejected by user");
                            Err(ChainError::UserRejected)
                        }
                        Err(e) => {
                            warn!(error = %e, "signer failed");
                            Err(ChainError::SignerUnavailable)
                        }
                    };
                }
                changed = capability.changed() => {
                    if changed.is_err() || !capability.borrow().is_ready() {
                        warn!("signer detached while a request was pending");
                        return Err(ChainError::SignerUnavailable);
                    }
                }
                _ = cancel.cancelled() => {
                    return Err(ChainError::Cancelled);
                }
            }
        }
    }
}

impl Default for SignerBridge {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// LOCAL KEYPAIR SIGNER
// ============================================================================

/// In-process signer backed by an ed25519 keypair.
///
/// Intended for development clusters and tests; production flows attach an
/// external wallet instead.
pub struct LocalKeypairSigner {
    keypair: SigningKey,
}

impl LocalKeypairSigner {
    /// Generate a fresh random keypair
    pub fn generate() -> Self {
        Self {
            keypair: SigningKey::generate(&mut OsRng),
        }
    }

    /// Build from a raw 32-byte secret
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            keypair: SigningKey::from_bytes(secret),
        }
    }

    /// Parse a base58 secret. Accepts a 32-byte secret or a 64-byte keypair
    /// export whose first half is the secret.
    pub fn from_base58(encoded: &str) -> Result<Self> {
        let bytes = bs58::decode(encoded).into_vec()?;
        let secret: [u8; 32] = match bytes.len() {
            32 | 64 => {
                let mut secret = [0u8; 32];
                secret.copy_from_slice(&bytes[..32]);
                secret
            }
            other => {
                return Err(ChainError::Encoding(format!(
                    "Secret key must be 32 or 64 bytes, got {}",
                    other
                )))
            }
        };
        Ok(Self::from_bytes(&secret))
    }

    pub fn address(&self) -> Address {
        Address::new(self.keypair.verifying_key().to_bytes())
    }
}

#[async_trait]
impl WalletSigner for LocalKeypairSigner {
    fn identity(&self) -> Address {
        self.address()
    }

    async fn sign_transaction(
        &self,
        unsigned: &UnsignedTransaction,
    ) -> std::result::Result<SignedTransaction, SignError> {
        let signature = self.keypair.sign(&unsigned.signing_payload());
        Ok(SignedTransaction::new(
            Signature::new(signature.to_bytes()),
            unsigned.message.clone(),
        ))
    }
}

// ============================================================================
// TESTS
// ============================================================================
