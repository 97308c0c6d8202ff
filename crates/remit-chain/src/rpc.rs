// ============================================================================
// REMIT-CHAIN - RPC Transport
// ============================================================================
// JSON-RPC 2.0 client for cluster nodes.
//
// A transport handle is bound to exactly one endpoint URL for its entire
// lifetime. Switching clusters never re-points a handle; the manager builds
// a fresh handle and invalidates the old one, so in-flight calls fail
// instead of silently continuing against the wrong cluster.
// ============================================================================

use crate::address::{Address, Blockhash, Signature};
use crate::error::ChainError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Timeout for regular RPC calls
pub const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for endpoint reachability probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Node error code for a failed preflight simulation
const PREFLIGHT_FAILURE_CODE: i64 = -32002;

// ============================================================================
// DATA TYPES
// ============================================================================

/// Confirmation level for queries and submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl Default for Commitment {
    fn default() -> Self {
        Commitment::Confirmed
    }
}

/// A fresh blockhash and the height until which it stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: Blockhash,
    pub last_valid_block_height: u64,
}

/// Account state at the queried commitment level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub lamports: u64,
    pub owner: Address,
    pub executable: bool,
    pub data: Vec<u8>,
}

/// One entry of an address's signature history
#[derive(Debug, Clone)]
pub struct SignatureRecord {
    pub signature: Signature,
    pub slot: u64,
    pub err: Option<Value>,
    pub memo: Option<String>,
    pub block_time: Option<i64>,
}

/// Detail of a processed transaction
#[derive(Debug, Clone)]
pub struct TransactionDetail {
    pub slot: u64,
    pub block_time: Option<i64>,
    pub err: Option<Value>,
    pub fee: Option<u64>,
}

impl TransactionDetail {
    /// Whether the transaction executed without an on-chain error
    pub fn succeeded(&self) -> bool {
        self.err.is_none()
    }
}

/// Submission policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    pub commitment: Commitment,
    pub skip_preflight: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        // Preflight stays on: a simulation rejection is a definitive
        // verdict on the payload, and skipping it would only trade a typed
        // error for an opaque on-chain failure.
        Self {
            commitment: Commitment::Confirmed,
            skip_preflight: false,
        }
    }
}

/// A history record paired with its resolved detail, when available
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub record: SignatureRecord,
    pub detail: Option<TransactionDetail>,
}

// ============================================================================
// CHAIN RPC TRAIT
// ============================================================================

/// RPC surface the orchestrator and wallet views depend on.
///
/// Every call takes a caller-owned cancellation token; a cancelled call
/// returns `ChainError::Cancelled` without waiting for the node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Fetch a fresh blockhash for transaction assembly
    async fn latest_blockhash(
        &self,
        commitment: Commitment,
        cancel: &CancellationToken,
    ) -> Result<LatestBlockhash>;

    /// Submit a wire-encoded transaction; returns the submission reference
    async fn submit_transaction(
        &self,
        wire_base64: &str,
        options: SubmitOptions,
        cancel: &CancellationToken,
    ) -> Result<Signature>;

    /// Load account state; `None` when the account does not exist
    async fn account_state(
        &self,
        address: &Address,
        commitment: Commitment,
        cancel: &CancellationToken,
    ) -> Result<Option<AccountSnapshot>>;

    /// Balance in base units
    async fn balance(
        &self,
        address: &Address,
        commitment: Commitment,
        cancel: &CancellationToken,
    ) -> Result<u64>;

    /// Most recent signatures involving an address, newest first
    async fn signatures_for(
        &self,
        address: &Address,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SignatureRecord>>;

    /// Detail for a processed transaction; `None` while still pending
    async fn transaction_detail(
        &self,
        signature: &Signature,
        cancel: &CancellationToken,
    ) -> Result<Option<TransactionDetail>>;
}

/// Source of the handle bound to the currently active cluster.
///
/// Callers take one handle per operation and keep it for the whole run; a
/// cluster switch invalidates previously handed-out handles.
pub trait TransportSource: Send + Sync {
    fn transport(&self) -> Arc<dyn ChainRpc>;
}

// ============================================================================
// JSON-RPC WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Most query results arrive wrapped as `{ "context": …, "value": … }`
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct RawBlockhash {
    blockhash: String,
    #[serde(rename = "lastValidBlockHeight")]
    last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    lamports: u64,
    owner: String,
    executable: bool,
    #[serde(default)]
    data: Option<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct RawSignatureRecord {
    signature: String,
    slot: u64,
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    memo: Option<String>,
    #[serde(default, rename = "blockTime")]
    block_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawTransactionDetail {
    slot: u64,
    #[serde(default, rename = "blockTime")]
    block_time: Option<i64>,
    #[serde(default)]
    meta: Option<RawTransactionMeta>,
}

#[derive(Debug, Deserialize)]
struct RawTransactionMeta {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    fee: Option<u64>,
}

fn map_rpc_error(error: RpcErrorObject) -> ChainError {
    if error.code == PREFLIGHT_FAILURE_CODE {
        debug!(data = ?error.data, "preflight failure detail");
        ChainError::RejectedBySimulation(error.message)
    } else {
        ChainError::Network(format!("RPC error {}: {}", error.code, error.message))
    }
}

// ============================================================================
// HTTP TRANSPORT
// ============================================================================

/// HTTP transport bound to a single endpoint URL
pub struct HttpRpcTransport {
    url: String,
    http: Client,
    next_id: AtomicU64,
    invalidated: CancellationToken,
}

impl HttpRpcTransport {
    /// Create a transport for the given endpoint URL
    pub fn new(url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            http,
            next_id: AtomicU64::new(1),
            invalidated: CancellationToken::new(),
        })
    }

    /// The endpoint this handle is bound to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Mark the handle stale. Pending and future calls fail with a network
    /// error instead of continuing against a replaced endpoint.
    pub fn invalidate(&self) {
        self.invalidated.cancel();
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.is_cancelled()
    }

    /// One-shot reachability check against a candidate endpoint
    pub async fn probe(url: &str, timeout: Duration) -> Result<()> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "getHealth",
            params: json!([]),
        };

        let response = http
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let body: RpcResponse = response.json().await?;

        if let Some(error) = body.error {
            return Err(map_rpc_error(error));
        }
        match body.result {
            Some(Value::String(health)) if health == "ok" => Ok(()),
            other => Err(ChainError::Network(format!(
                "Unexpected health response: {:?}",
                other
            ))),
        }
    }

    /// Issue one JSON-RPC call, racing it against the caller's token and
    /// the handle's invalidation token.
    async fn call(
        &self,
        method: &'static str,
        params: Value,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, url = %self.url, "rpc request");

        let exchange = async {
            let request = RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            };
            let response = self
                .http
                .post(&self.url)
                .json(&request)
                .send()
                .await?
                .error_for_status()?;
            let body: RpcResponse = response.json().await?;

            if let Some(error) = body.error {
                return Err(map_rpc_error(error));
            }
            body.result
                .ok_or_else(|| ChainError::Network("RPC response missing result".to_string()))
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(method, id, "rpc call cancelled by caller");
                Err(ChainError::Cancelled)
            }
            _ = self.invalidated.cancelled() => {
                Err(ChainError::Network("Cluster endpoint changed".to_string()))
            }
            result = exchange => result,
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Result<T> {
        serde_json::from_value(value)
            .map_err(|e| ChainError::Network(format!("Malformed {} response: {}", method, e)))
    }
}

#[async_trait]
impl ChainRpc for HttpRpcTransport {
    async fn latest_blockhash(
        &self,
        commitment: Commitment,
        cancel: &CancellationToken,
    ) -> Result<LatestBlockhash> {
        let params = json!([{ "commitment": commitment.as_str() }]);
        let value = self.call("getLatestBlockhash", params, cancel).await?;
        let raw: WithContext<RawBlockhash> = Self::parse("getLatestBlockhash", value)?;

        let blockhash = Blockhash::parse(&raw.value.blockhash)
            .map_err(|e| ChainError::Network(format!("Malformed blockhash in response: {}", e)))?;

        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height: raw.value.last_valid_block_height,
        })
    }

    async fn submit_transaction(
        &self,
        wire_base64: &str,
        options: SubmitOptions,
        cancel: &CancellationToken,
    ) -> Result<Signature> {
        let params = json!([wire_base64, {
            "encoding": "base64",
            "skipPreflight": options.skip_preflight,
            "preflightCommitment": options.commitment.as_str(),
        }]);
        let value = self.call("sendTransaction", params, cancel).await?;
        let reference: String = Self::parse("sendTransaction", value)?;

        Signature::parse(&reference)
            .map_err(|e| ChainError::Network(format!("Malformed submission reference: {}", e)))
    }

    async fn account_state(
        &self,
        address: &Address,
        commitment: Commitment,
        cancel: &CancellationToken,
    ) -> Result<Option<AccountSnapshot>> {
        let params = json!([address.to_string(), {
            "commitment": commitment.as_str(),
            "encoding": "base64",
        }]);
        let value = self.call("getAccountInfo", params, cancel).await?;
        let raw: WithContext<Option<RawAccount>> = Self::parse("getAccountInfo", value)?;

        let Some(account) = raw.value else {
            return Ok(None);
        };

        let data = match account.data {
            Some((encoded, _)) => {
                use base64::{engine::general_purpose, Engine as _};
                general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| {
                        ChainError::Network(format!("Malformed account data: {}", e))
                    })?
            }
            None => Vec::new(),
        };
        let owner = Address::parse(&account.owner)
            .map_err(|e| ChainError::Network(format!("Malformed account owner: {}", e)))?;

        Ok(Some(AccountSnapshot {
            lamports: account.lamports,
            owner,
            executable: account.executable,
            data,
        }))
    }

    async fn balance(
        &self,
        address: &Address,
        commitment: Commitment,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let params = json!([address.to_string(), { "commitment": commitment.as_str() }]);
        let value = self.call("getBalance", params, cancel).await?;
        let raw: WithContext<u64> = Self::parse("getBalance", value)?;
        Ok(raw.value)
    }

    async fn signatures_for(
        &self,
        address: &Address,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SignatureRecord>> {
        let limit = limit.clamp(1, 1000);
        let params = json!([address.to_string(), { "limit": limit }]);
        let value = self.call("getSignaturesForAddress", params, cancel).await?;
        let raw: Vec<RawSignatureRecord> = Self::parse("getSignaturesForAddress", value)?;

        let mut records = Vec::with_capacity(raw.len());
        for entry in raw {
            let signature = Signature::parse(&entry.signature).map_err(|e| {
                ChainError::Network(format!("Malformed signature in history: {}", e))
            })?;
            records.push(SignatureRecord {
                signature,
                slot: entry.slot,
                err: entry.err,
                memo: entry.memo,
                block_time: entry.block_time,
            });
        }
        Ok(records)
    }

    async fn transaction_detail(
        &self,
        signature: &Signature,
        cancel: &CancellationToken,
    ) -> Result<Option<TransactionDetail>> {
        let params = json!([signature.to_string(), {
            "encoding": "json",
            "commitment": Commitment::Confirmed.as_str(),
            "maxSupportedTransactionVersion": 0,
        }]);
        let value = self.call("getTransaction", params, cancel).await?;
        let raw: Option<RawTransactionDetail> = Self::parse("getTransaction", value)?;

        Ok(raw.map(|detail| {
            let meta = detail.meta.unwrap_or(RawTransactionMeta {
                err: None,
                fee: None,
            });
            TransactionDetail {
                slot: detail.slot,
                block_time: detail.block_time,
                err: meta.err,
                fee: meta.fee,
            }
        }))
    }
}

// ============================================================================
// HISTORY RESOLUTION
// ============================================================================

/// Resolve an address's recent history to per-transaction detail.
///
/// Individual detail lookups may fail without sinking the whole view: a
/// failed entry keeps `detail: None` and the failure is logged. Caller
/// cancellation still aborts the operation as a whole.
pub async fn resolve_history(
    rpc: &dyn ChainRpc,
    address: &Address,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<HistoryEntry>> {
    let records = rpc.signatures_for(address, limit, cancel).await?;

    let lookups = records
        .iter()
        .map(|record| rpc.transaction_detail(&record.signature, cancel));
    let details = futures::future::join_all(lookups).await;

    let mut entries = Vec::with_capacity(records.len());
    for (record, detail) in records.into_iter().zip(details) {
        let detail = match detail {
            Ok(detail) => detail,
            Err(ChainError::Cancelled) => return Err(ChainError::Cancelled),
            Err(e) => {
                warn!(signature = %record.signature, error = %e, "history detail lookup failed");
                None
            }
        };
        entries.push(HistoryEntry { record, detail });
    }
    Ok(entries)
}

// ============================================================================
// TESTS
// ============================================================================
