// ============================================================================
// REMIT-INVOICING - Wallet Overview
// ============================================================================
// Data source for the wallet page: balance plus recent settlement history
// for the connected identity. Rendering lives in the host application.
// ============================================================================

use crate::Result;
use remit_chain::rpc::{resolve_history, ChainRpc, Commitment, HistoryEntry};
use remit_chain::Address;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// History entries the overview resolves by default
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Base units per whole token
const UNITS_PER_TOKEN: f64 = 1_000_000_000.0;

/// Balance and recent history for one wallet identity
#[derive(Debug, Clone)]
pub struct WalletOverview {
    pub identity: Address,
    pub lamports: u64,
    pub history: Vec<HistoryEntry>,
}

impl WalletOverview {
    /// Load the overview at confirmed commitment.
    ///
    /// Individual history details may be missing when their lookup failed;
    /// the balance and the signature list are authoritative.
    pub async fn load(
        rpc: &dyn ChainRpc,
        identity: Address,
        history_limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let lamports = rpc.balance(&identity, Commitment::Confirmed, cancel).await?;
        let history = resolve_history(rpc, &identity, history_limit, cancel).await?;
        debug!(identity = %identity, lamports, entries = history.len(), "wallet overview loaded");

        Ok(Self {
            identity,
            lamports,
            history,
        })
    }

    /// Balance in whole tokens
    pub fn tokens(&self) -> f64 {
        self.lamports as f64 / UNITS_PER_TOKEN
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_conversion() {
        let overview = WalletOverview {
            identity: Address::new([1u8; 32]),
            lamports: 2_500_000_000,
            history: Vec::new(),
        };
        assert!((overview.tokens() - 2.5).abs() < f64::EPSILON);
    }
}
