// ============================================================================
// REMIT-CHAIN - Account & Hash Primitives
// ============================================================================
// Fixed-width byte newtypes shared by the RPC layer and the envelope codec.
//
// The chain encodes all three as base58 text:
// - Address:   32-byte Ed25519 public key
// - Blockhash: 32-byte recent block hash
// - Signature: 64-byte Ed25519 signature
// ============================================================================

use crate::error::ChainError;
use crate::Result;
use std::fmt;
use std::str::FromStr;

/// Ed25519 public key length in bytes
pub const ADDRESS_LEN: usize = 32;

/// Block hash length in bytes
pub const BLOCKHASH_LEN: usize = 32;

/// Ed25519 signature length in bytes
pub const SIGNATURE_LEN: usize = 64;

// ============================================================================
// ADDRESS
// ============================================================================

/// Account address (Ed25519 public key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Parse from base58 text, validating length and alphabet
    pub fn parse(text: &str) -> Result<Self> {
        let bytes = decode_fixed::<ADDRESS_LEN>(text, "address")?;
        Ok(Address(bytes))
    }
}

impl FromStr for Address {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

// ============================================================================
// BLOCKHASH
// ============================================================================

/// Recent block hash attached to a transaction message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Blockhash([u8; BLOCKHASH_LEN]);

impl Blockhash {
    pub fn new(bytes: [u8; BLOCKHASH_LEN]) -> Self {
        Blockhash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCKHASH_LEN] {
        &self.0
    }

    pub fn parse(text: &str) -> Result<Self> {
        let bytes = decode_fixed::<BLOCKHASH_LEN>(text, "blockhash")?;
        Ok(Blockhash(bytes))
    }
}

impl FromStr for Blockhash {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        Blockhash::parse(s)
    }
}

impl fmt::Display for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

// ============================================================================
// SIGNATURE
// ============================================================================

/// Ed25519 signature; doubles as the submission reference on chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    pub fn new(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Signature(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn parse(text: &str) -> Result<Self> {
        let bytes = decode_fixed::<SIGNATURE_LEN>(text, "signature")?;
        Ok(Signature(bytes))
    }
}

impl FromStr for Signature {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        Signature::parse(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

// ============================================================================
// BASE58 DECODING
// ============================================================================

/// Decode base58 text into an exact-width byte array
fn decode_fixed<const N: usize>(text: &str, what: &str) -> Result<[u8; N]> {
    let decoded = bs58::decode(text).into_vec()?;

    if decoded.len() != N {
        return Err(ChainError::Encoding(format!(
            "Invalid {}: expected {} bytes, got {}",
            what,
            N,
            decoded.len()
        )));
    }

    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}

// ============================================================================
// SERDE (all three serialize as base58 strings)
// ============================================================================

macro_rules! impl_base58_serde {
    ($type:ident) => {
        impl serde::Serialize for $type {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $type {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                $type::parse(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_base58_serde!(Address);
impl_base58_serde!(Blockhash);
impl_base58_serde!(Signature);

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip() {
        let bytes = [7u8; 32];
        let address = Address::new(bytes);
        let text = address.to_string();
        let back = Address::parse(&text).unwrap();
        assert_eq!(address, back);
    }

    #[test]
    fn test_system_program_address() {
        // 32 zero bytes encode as a run of base58 '1' characters
        let address = Address::parse("11111111111111111111111111111111").unwrap();
        assert_eq!(address.as_bytes(), &[0u8; 32]);
        assert_eq!(address.to_string(), "11111111111111111111111111111111");
    }

    #[test]
    fn test_address_wrong_length() {
        // Valid base58 but decodes to fewer than 32 bytes
        let result = Address::parse("abc");
        assert!(result.is_err());
    }

    #[test]
    fn test_address_bad_alphabet() {
        // '0', 'O', 'I', 'l' are not in the base58 alphabet
        let result = Address::parse("0OIl000000000000000000000000000000000000000");
        assert!(result.is_err());
    }

    #[test]
    fn test_signature_roundtrip() {
        let sig = Signature::new([9u8; 64]);
        let back = Signature::parse(&sig.to_string()).unwrap();
        assert_eq!(sig, back);
    }

    #[test]
    fn test_blockhash_rejects_signature_width() {
        // 64-byte payload must not parse as a 32-byte blockhash
        let sig = Signature::new([3u8; 64]);
        let result = Blockhash::parse(&sig.to_string());
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let address = Address::new([1u8; 32]);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", address));

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(address, back);
    }

    #[test]
    fn test_serde_rejects_malformed() {
        let result: std::result::Result<Address, _> = serde_json::from_str("\"not-base58-0\"");
        assert!(result.is_err());
    }
}
