// ============================================================================
// REMIT-CHAIN - Cluster Manager
// ============================================================================
// Owns the endpoint registry, its persistence, and the live transport
// handle. All cluster mutations flow through here so registry state, the
// settings store, and the transport stay consistent with each other.
// ============================================================================

use crate::cluster::{validate_endpoint_url, ClusterEndpoint, ClusterRegistry};
use crate::error::ChainError;
use crate::rpc::{ChainRpc, HttpRpcTransport, TransportSource, PROBE_TIMEOUT};
use crate::store::ClusterStore;
use crate::Result;
use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

/// Cluster selection and transport wiring
pub struct ClusterManager {
    registry: Mutex<ClusterRegistry>,
    store: ClusterStore,
    transport: ArcSwap<HttpRpcTransport>,
    probe_timeout: Duration,
    probe_endpoints: bool,
}

impl ClusterManager {
    /// Restore the registry from the store and bind a transport to the
    /// active endpoint.
    pub fn open(store: ClusterStore) -> Result<Self> {
        let (custom, active) = store.load()?;
        let registry = ClusterRegistry::from_parts(custom, active.as_deref());
        let transport = HttpRpcTransport::new(&registry.active().url)?;
        info!(active = %registry.active().name, "cluster manager ready");

        Ok(Self {
            registry: Mutex::new(registry),
            store,
            transport: ArcSwap::from_pointee(transport),
            probe_timeout: PROBE_TIMEOUT,
            probe_endpoints: true,
        })
    }

    /// Open the settings store at its default location
    pub fn open_default() -> Result<Self> {
        let path = ClusterStore::default_path()
            .ok_or_else(|| ChainError::Storage("No data directory available".to_string()))?;
        Self::open(ClusterStore::open(&path)?)
    }

    /// Manager over an in-memory store, defaults only
    pub fn in_memory() -> Result<Self> {
        Self::open(ClusterStore::in_memory()?)
    }

    /// Skip the reachability probe when adding endpoints. Test fixtures and
    /// offline tooling use this.
    pub fn with_probe_disabled(mut self) -> Self {
        self.probe_endpoints = false;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, ClusterRegistry>> {
        self.registry
            .lock()
            .map_err(|_| ChainError::Internal("Cluster registry lock poisoned".to_string()))
    }

    /// All endpoints, ordered by name
    pub fn list(&self) -> Result<Vec<ClusterEndpoint>> {
        Ok(self.lock()?.list())
    }

    /// The active endpoint
    pub fn active(&self) -> Result<ClusterEndpoint> {
        Ok(self.lock()?.active().clone())
    }

    /// Register a custom endpoint after validating it.
    ///
    /// The URL is syntax-checked and, unless probing is disabled, the
    /// endpoint must answer a health probe. Nothing is registered or
    /// persisted when validation fails, and the active selection never
    /// changes here.
    pub async fn add_endpoint(&self, name: &str, url: &str) -> Result<ClusterEndpoint> {
        validate_endpoint_url(url)?;

        if self.probe_endpoints {
            HttpRpcTransport::probe(url, self.probe_timeout)
                .await
                .map_err(|e| {
                    warn!(name, url, error = %e, "endpoint probe failed");
                    ChainError::InvalidEndpoint(format!("Endpoint unreachable: {}", e))
                })?;
        }

        let endpoint = ClusterEndpoint::custom(name, url);
        {
            let mut registry = self.lock()?;
            registry.add(endpoint.clone())?;
            if let Err(e) = self.store.save(&registry) {
                registry.remove(&endpoint.name).ok();
                return Err(e);
            }
        }

        info!(name, url, "custom endpoint added");
        Ok(endpoint)
    }

    /// Switch the active endpoint.
    ///
    /// A fresh transport is bound to the target before any state changes.
    /// After the swap the previous handle is invalidated, so in-flight
    /// calls against the old cluster fail instead of completing.
    pub fn set_active(&self, name: &str) -> Result<ClusterEndpoint> {
        let target = {
            let registry = self.lock()?;
            if registry.active_name() == name {
                return Ok(registry.active().clone());
            }
            registry.endpoint(name)?.clone()
        };

        let fresh = Arc::new(HttpRpcTransport::new(&target.url)?);

        let active = {
            let mut registry = self.lock()?;
            let previous = registry.active_name().to_string();
            let active = registry.set_active(name)?.clone();
            if let Err(e) = self.store.save(&registry) {
                registry.set_active(&previous).ok();
                return Err(e);
            }
            let old = self.transport.swap(fresh);
            old.invalidate();
            active
        };

        info!(name = %active.name, url = %active.url, "active cluster switched");
        Ok(active)
    }

    /// Remove an endpoint. The active endpoint cannot be removed.
    pub fn remove_endpoint(&self, name: &str) -> Result<ClusterEndpoint> {
        let removed = {
            let mut registry = self.lock()?;
            let removed = registry.remove(name)?;
            if let Err(e) = self.store.save(&registry) {
                registry.add(removed.clone()).ok();
                return Err(e);
            }
            removed
        };

        info!(name, "endpoint removed");
        Ok(removed)
    }

    /// Handle bound to the currently active endpoint
    pub fn transport(&self) -> Arc<HttpRpcTransport> {
        self.transport.load_full()
    }
}

impl TransportSource for ClusterManager {
    fn transport(&self) -> Arc<dyn ChainRpc> {
        self.transport.load_full()
    }
}

// ============================================================================
// TESTS
// ============================================================================
