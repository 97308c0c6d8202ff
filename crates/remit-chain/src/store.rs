// ============================================================================
// REMIT-CHAIN - Cluster Settings Store
// ============================================================================
// SQLite-backed persistence for the cluster registry: the custom endpoint
// set and the active selection. Built-ins are never stored; they are
// re-seeded at startup and merged with this state.
// ============================================================================

use crate::cluster::{ClusterEndpoint, ClusterRegistry};
use crate::error::ChainError;
use crate::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Storage key for the active endpoint name
const KEY_ACTIVE: &str = "cluster.active";

/// Storage key for the custom endpoint set (JSON array)
const KEY_CUSTOM: &str = "cluster.custom";

/// Settings store for cluster state
pub struct ClusterStore {
    conn: Mutex<Connection>,
}

impl ClusterStore {
    /// Open (or create) the settings database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChainError::Storage(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store for tests and throwaway sessions
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Default database location under the platform data directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("remit").join("settings.db"))
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    // ==================== Cluster State ====================

    /// Load persisted cluster state: custom endpoints and active name
    pub fn load(&self) -> Result<(Vec<ClusterEndpoint>, Option<String>)> {
        let custom = match self.get(KEY_CUSTOM)? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| ChainError::Storage(format!("Corrupt custom endpoint set: {}", e)))?,
            None => Vec::new(),
        };
        let active = self.get(KEY_ACTIVE)?;

        debug!(custom = custom.len(), ?active, "loaded cluster state");
        Ok((custom, active))
    }

    /// Persist the registry's custom endpoints and active selection
    pub fn save(&self, registry: &ClusterRegistry) -> Result<()> {
        let custom = serde_json::to_string(&registry.custom_endpoints())
            .map_err(|e| ChainError::Storage(format!("Failed to encode endpoints: {}", e)))?;

        self.set(KEY_CUSTOM, &custom)?;
        self.set(KEY_ACTIVE, registry.active_name())?;
        Ok(())
    }

    // ==================== Key/Value Primitives ====================

    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;

        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO settings (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            "#,
            params![key, value],
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ChainError::Storage(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
