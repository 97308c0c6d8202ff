// ============================================================================
// REMIT-CHAIN - Transaction Envelope
// ============================================================================
// Binary envelope for settlement transactions.
//
// The backend produces the instruction template; the client wraps it into a
// message together with the fee payer and a fresh blockhash, has it signed,
// and ships the signed envelope as base64.
//
// Message layout (all integers big-endian):
// - version        u8
// - fee payer      32 bytes
// - blockhash      32 bytes
// - template len   u32
// - template       variable
//
// Wire layout:
// - signature count  u32
// - signatures       64 bytes each
// - message          as above
// ============================================================================

use crate::address::{Address, Blockhash, Signature, ADDRESS_LEN, BLOCKHASH_LEN, SIGNATURE_LEN};
use crate::error::ChainError;
use crate::Result;
use sha2::{Digest, Sha256};

/// Current message layout version
pub const MESSAGE_VERSION: u8 = 1;

/// Templates above this size are rejected outright
pub const MAX_TEMPLATE_LEN: usize = 64 * 1024;

// ============================================================================
// TEMPLATE
// ============================================================================

/// Backend-produced instruction body. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionTemplate {
    bytes: Vec<u8>,
}

impl TransactionTemplate {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ChainError::Build(
                "Transaction template is empty".to_string(),
            ));
        }
        if bytes.len() > MAX_TEMPLATE_LEN {
            return Err(ChainError::Build(format!(
                "Transaction template too large: {} bytes",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// Decode a base64 template as delivered by the backend
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64_decode(encoded)
            .map_err(|e| ChainError::Build(format!("Invalid template encoding: {}", e)))?;
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

/// The signed-over portion of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMessage {
    pub fee_payer: Address,
    pub recent_blockhash: Blockhash,
    pub template: TransactionTemplate,
}

impl TransactionMessage {
    pub fn new(fee_payer: Address, recent_blockhash: Blockhash, template: TransactionTemplate) -> Self {
        Self {
            fee_payer,
            recent_blockhash,
            template,
        }
    }

    /// Serialize to the canonical byte layout
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + ADDRESS_LEN + BLOCKHASH_LEN + 4 + self.template.len());
        out.push(MESSAGE_VERSION);
        out.extend_from_slice(self.fee_payer.as_bytes());
        out.extend_from_slice(self.recent_blockhash.as_bytes());
        out.extend_from_slice(&(self.template.len() as u32).to_be_bytes());
        out.extend_from_slice(self.template.as_bytes());
        out
    }

    /// Parse the canonical byte layout. Rejects trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);

        let version = reader.read_u8()?;
        if version != MESSAGE_VERSION {
            return Err(ChainError::Encoding(format!(
                "Unsupported message version: {}",
                version
            )));
        }

        let fee_payer = Address::new(reader.read_array::<ADDRESS_LEN>()?);
        let recent_blockhash = Blockhash::new(reader.read_array::<BLOCKHASH_LEN>()?);

        let template_len = reader.read_u32()? as usize;
        if template_len > MAX_TEMPLATE_LEN {
            return Err(ChainError::Encoding(format!(
                "Template length out of range: {}",
                template_len
            )));
        }
        let template = TransactionTemplate {
            bytes: reader.read_bytes(template_len)?.to_vec(),
        };

        reader.expect_end()?;

        Ok(Self {
            fee_payer,
            recent_blockhash,
            template,
        })
    }
}

// ============================================================================
// UNSIGNED / SIGNED TRANSACTIONS
// ============================================================================

/// Message awaiting a signature
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub message: TransactionMessage,
}

impl UnsignedTransaction {
    pub fn new(message: TransactionMessage) -> Self {
        Self { message }
    }

    /// The exact bytes a signer must sign
    pub fn signing_payload(&self) -> Vec<u8> {
        self.message.encode()
    }
}

/// Signed transaction ready for submission
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub signatures: Vec<Signature>,
    pub message: TransactionMessage,
}

impl SignedTransaction {
    /// Single-signer transaction (the common case: fee payer signs)
    pub fn new(signature: Signature, message: TransactionMessage) -> Self {
        Self {
            signatures: vec![signature],
            message,
        }
    }

    /// Serialize to the canonical wire bytes
    pub fn wire_bytes(&self) -> Vec<u8> {
        let message = self.message.encode();
        let mut out =
            Vec::with_capacity(4 + self.signatures.len() * SIGNATURE_LEN + message.len());
        out.extend_from_slice(&(self.signatures.len() as u32).to_be_bytes());
        for signature in &self.signatures {
            out.extend_from_slice(signature.as_bytes());
        }
        out.extend_from_slice(&message);
        out
    }

    /// Base64 wire form submitted to the RPC node
    pub fn wire_encode(&self) -> String {
        base64_encode(&self.wire_bytes())
    }

    /// Parse the base64 wire form back into a transaction
    pub fn wire_decode(encoded: &str) -> Result<Self> {
        let bytes = base64_decode(encoded)?;
        let mut reader = Reader::new(&bytes);

        let count = reader.read_u32()? as usize;
        if count == 0 || count > 16 {
            return Err(ChainError::Encoding(format!(
                "Signature count out of range: {}",
                count
            )));
        }

        let mut signatures = Vec::with_capacity(count);
        for _ in 0..count {
            signatures.push(Signature::new(reader.read_array::<SIGNATURE_LEN>()?));
        }

        let message = TransactionMessage::decode(reader.remaining())?;

        Ok(Self {
            signatures,
            message,
        })
    }

    /// Verify the fee payer signature over the encoded message.
    ///
    /// Must pass before the envelope leaves the process; a failure here is an
    /// internal invariant violation, not a user-facing condition.
    pub fn verify(&self) -> Result<()> {
        use ed25519_dalek::Verifier;

        let signature = self.signatures.first().ok_or_else(|| {
            ChainError::Encoding("Transaction has no signatures".to_string())
        })?;

        let key = ed25519_dalek::VerifyingKey::from_bytes(self.message.fee_payer.as_bytes())?;
        let dalek_sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());

        key.verify(&self.message.encode(), &dalek_sig)?;
        Ok(())
    }

    /// SHA-256 of the wire bytes, hex encoded. Used for log correlation.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.wire_bytes());
        hex::encode(hasher.finalize())
    }
}

// ============================================================================
// BYTE READER
// ============================================================================

/// Bounds-checked cursor over an envelope buffer
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let byte = self.read_bytes(1)?;
        Ok(byte[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(u32::from_be_bytes(buf))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(bytes);
        Ok(buf)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or_else(|| {
            ChainError::Encoding("Envelope length overflow".to_string())
        })?;
        if end > self.bytes.len() {
            return Err(ChainError::Encoding("Envelope truncated".to_string()));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    fn expect_end(&self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(ChainError::Encoding(format!(
                "Trailing bytes in envelope: {}",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn base64_encode(data: &[u8]) -> String {
    use base64::{engine::general_purpose, Engine as _};
    general_purpose::STANDARD.encode(data)
}

fn base64_decode(encoded: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    use base64::{engine::general_purpose, Engine as _};
    general_purpose::STANDARD.decode(encoded)
}

// ============================================================================
// TESTS
// ============================================================================
