// ============================================================================
// REMIT-CHAIN - Cluster Catalog
// ============================================================================
// Named RPC endpoint registry. Ships with the three public clusters and
// accepts user-defined custom endpoints. Exactly one endpoint is active at
// any time; the registry enforces that invariant on every mutation.
// ============================================================================

use crate::error::ChainError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Network selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Main,
    Test,
    Dev,
    Custom,
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NetworkKind::Main => "main",
            NetworkKind::Test => "test",
            NetworkKind::Dev => "dev",
            NetworkKind::Custom => "custom",
        };
        write!(f, "{}", label)
    }
}

/// A named RPC endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEndpoint {
    /// Unique name, the registry key
    pub name: String,

    /// RPC URL
    pub url: String,

    /// Which network this endpoint serves
    pub kind: NetworkKind,

    /// Whether this endpoint is the active selection
    #[serde(default)]
    pub is_active: bool,
}

impl ClusterEndpoint {
    /// Public mainnet endpoint
    pub fn main() -> Self {
        Self {
            name: "main".to_string(),
            url: "https://api.mainnet-beta.solana.com".to_string(),
            kind: NetworkKind::Main,
            is_active: false,
        }
    }

    /// Public testnet endpoint
    pub fn test() -> Self {
        Self {
            name: "test".to_string(),
            url: "https://api.testnet.solana.com".to_string(),
            kind: NetworkKind::Test,
            is_active: false,
        }
    }

    /// Public devnet endpoint
    pub fn dev() -> Self {
        Self {
            name: "dev".to_string(),
            url: "https://api.devnet.solana.com".to_string(),
            kind: NetworkKind::Dev,
            is_active: false,
        }
    }

    /// User-defined endpoint
    pub fn custom(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            kind: NetworkKind::Custom,
            is_active: false,
        }
    }

    /// Check if this is the mainnet endpoint
    pub fn is_main(&self) -> bool {
        self.kind == NetworkKind::Main
    }

    /// Get explorer URL for a transaction on this cluster
    pub fn explorer_tx_url(&self, reference: &str) -> String {
        match self.kind {
            NetworkKind::Main => format!("https://explorer.solana.com/tx/{}", reference),
            NetworkKind::Test => {
                format!("https://explorer.solana.com/tx/{}?cluster=testnet", reference)
            }
            NetworkKind::Dev => {
                format!("https://explorer.solana.com/tx/{}?cluster=devnet", reference)
            }
            NetworkKind::Custom => format!(
                "https://explorer.solana.com/tx/{}?cluster=custom&customUrl={}",
                reference, self.url
            ),
        }
    }

    /// Get explorer URL for an account on this cluster
    pub fn explorer_account_url(&self, address: &str) -> String {
        match self.kind {
            NetworkKind::Main => format!("https://explorer.solana.com/address/{}", address),
            NetworkKind::Test => {
                format!("https://explorer.solana.com/address/{}?cluster=testnet", address)
            }
            NetworkKind::Dev => {
                format!("https://explorer.solana.com/address/{}?cluster=devnet", address)
            }
            NetworkKind::Custom => format!(
                "https://explorer.solana.com/address/{}?cluster=custom&customUrl={}",
                address, self.url
            ),
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Endpoint registry with a single active selection.
///
/// Pure state; persistence and transport wiring live in `ClusterManager`.
#[derive(Debug, Clone)]
pub struct ClusterRegistry {
    endpoints: BTreeMap<String, ClusterEndpoint>,
    active: String,
}

impl ClusterRegistry {
    /// Registry seeded with the three public clusters, mainnet active
    pub fn with_defaults() -> Self {
        let mut endpoints = BTreeMap::new();
        for endpoint in [
            ClusterEndpoint::main(),
            ClusterEndpoint::test(),
            ClusterEndpoint::dev(),
        ] {
            endpoints.insert(endpoint.name.clone(), endpoint);
        }

        let mut registry = Self {
            endpoints,
            active: "main".to_string(),
        };
        registry.apply_active_flags();
        registry
    }

    /// Rebuild from persisted state: built-ins are re-seeded, stored custom
    /// endpoints merged in, and the stored active name restored when it still
    /// resolves. An unknown stored name falls back to mainnet.
    pub fn from_parts(custom: Vec<ClusterEndpoint>, active: Option<&str>) -> Self {
        let mut registry = Self::with_defaults();

        for mut endpoint in custom {
            endpoint.kind = NetworkKind::Custom;
            endpoint.is_active = false;
            registry
                .endpoints
                .entry(endpoint.name.clone())
                .or_insert(endpoint);
        }

        if let Some(name) = active {
            if registry.endpoints.contains_key(name) {
                registry.active = name.to_string();
            }
        }
        registry.apply_active_flags();
        registry
    }

    /// List all endpoints, ordered by name
    pub fn list(&self) -> Vec<ClusterEndpoint> {
        self.endpoints.values().cloned().collect()
    }

    /// The custom endpoints only, ordered by name (persisted subset)
    pub fn custom_endpoints(&self) -> Vec<ClusterEndpoint> {
        self.endpoints
            .values()
            .filter(|e| e.kind == NetworkKind::Custom)
            .cloned()
            .collect()
    }

    /// Look up an endpoint by name
    pub fn endpoint(&self, name: &str) -> Result<&ClusterEndpoint> {
        self.endpoints
            .get(name)
            .ok_or_else(|| ChainError::ClusterNotFound(name.to_string()))
    }

    /// The active endpoint
    pub fn active(&self) -> &ClusterEndpoint {
        self.endpoints
            .get(&self.active)
            .expect("registry invariant: active endpoint is registered")
    }

    /// Name of the active endpoint
    pub fn active_name(&self) -> &str {
        &self.active
    }

    /// Register a new endpoint. Does not change the active selection.
    pub fn add(&mut self, endpoint: ClusterEndpoint) -> Result<()> {
        if endpoint.name.trim().is_empty() {
            return Err(ChainError::InvalidEndpoint(
                "Endpoint name must not be empty".to_string(),
            ));
        }
        if self.endpoints.contains_key(&endpoint.name) {
            return Err(ChainError::InvalidEndpoint(format!(
                "Endpoint name already registered: {}",
                endpoint.name
            )));
        }
        validate_endpoint_url(&endpoint.url)?;

        let mut endpoint = endpoint;
        endpoint.is_active = false;
        self.endpoints.insert(endpoint.name.clone(), endpoint);
        Ok(())
    }

    /// Remove an endpoint. The active endpoint cannot be removed.
    pub fn remove(&mut self, name: &str) -> Result<ClusterEndpoint> {
        if !self.endpoints.contains_key(name) {
            return Err(ChainError::ClusterNotFound(name.to_string()));
        }
        if name == self.active {
            return Err(ChainError::ActiveEndpointInUse(name.to_string()));
        }
        self.endpoints
            .remove(name)
            .ok_or_else(|| ChainError::ClusterNotFound(name.to_string()))
    }

    /// Switch the active selection
    pub fn set_active(&mut self, name: &str) -> Result<&ClusterEndpoint> {
        if !self.endpoints.contains_key(name) {
            return Err(ChainError::ClusterNotFound(name.to_string()));
        }
        self.active = name.to_string();
        self.apply_active_flags();
        Ok(self.active())
    }

    fn apply_active_flags(&mut self) {
        for (name, endpoint) in self.endpoints.iter_mut() {
            endpoint.is_active = *name == self.active;
        }
    }
}

impl Default for ClusterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Validate endpoint URL syntax (reachability is checked separately)
pub fn validate_endpoint_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| ChainError::InvalidEndpoint(format!("Invalid URL {}: {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ChainError::InvalidEndpoint(format!(
            "Unsupported URL scheme: {}",
            scheme
        ))),
    }
}

// ============================================================================
// TESTS
// ============================================================================
