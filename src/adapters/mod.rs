//! Adapters: one per integration, uniform read/capture contract
//!
//! An integration implements the capability traits ([`Configurable`],
//! [`LiveReadable`], [`SnapshotCapturable`]). Wrapping it in [`Adapter`]
//! adds the mode-aware behaviour: live reads only in local mode, snapshot
//! fallback, write-through and guarded capture. Everything downstream
//! (orchestrator, HTTP layer) works with `Arc<dyn DataAdapter>`.

mod base;
mod change;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use base::{Adapter, AdapterSettings};
pub use change::ChangeTracker;

use crate::error::{AdapterError, Result};
use crate::types::ReadOutcome;

/// Whether an integration can attempt live calls at all
pub trait Configurable: Send + Sync {
    fn service_name(&self) -> &str;

    /// Credentials and config present. Pure, no I/O.
    fn is_configured(&self) -> bool;

    /// Needs a user-interactive login, so headless sweeps skip it by default
    fn requires_interactive_auth(&self) -> bool {
        false
    }
}

/// Live reads against the external service
#[async_trait]
pub trait LiveReadable: Configurable {
    /// Snapshot keys this integration serves
    fn keys(&self) -> Vec<String>;

    async fn read_live(&self, key: &str) -> std::result::Result<serde_json::Value, AdapterError>;
}

/// Fetch everything the integration snapshots in one go
#[async_trait]
pub trait SnapshotCapturable: Configurable {
    async fn capture_live(&self) -> std::result::Result<Vec<(String, serde_json::Value)>, AdapterError>;
}

/// Full capability set required by [`Adapter`]
pub trait Integration: LiveReadable + SnapshotCapturable {}

impl<T: LiveReadable + SnapshotCapturable> Integration for T {}

/// Result of a successful capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOutcome {
    pub records_written: u64,
    pub keys: Vec<String>,
    pub captured_at: DateTime<Utc>,
}

/// Object-safe view of an adapter used by the orchestrator and the API
#[async_trait]
pub trait DataAdapter: Send + Sync {
    fn service_name(&self) -> &str;
    fn is_configured(&self) -> bool;
    fn requires_interactive_auth(&self) -> bool;
    fn keys(&self) -> Vec<String>;

    /// Live when local and configured, otherwise the latest snapshot
    async fn read(&self, key: &str) -> Result<ReadOutcome>;

    /// Fetch live and overwrite this adapter's snapshots. Local mode only.
    async fn capture_snapshot(&self) -> Result<CaptureOutcome>;
}

/// Name-indexed set of adapters, built once at startup
#[derive(Clone, Default)]
pub struct AdapterCatalog {
    adapters: BTreeMap<String, Arc<dyn DataAdapter>>,
}

impl AdapterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn DataAdapter>) {
        let name = adapter.service_name().to_string();
        if self.adapters.insert(name.clone(), adapter).is_some() {
            tracing::warn!("Adapter {} registered twice; keeping the latest", name);
        }
    }

    pub fn with(mut self, adapter: Arc<dyn DataAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, service_name: &str) -> Option<Arc<dyn DataAdapter>> {
        self.adapters.get(service_name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn DataAdapter>> {
        self.adapters.values()
    }

    /// Adapter that serves `key`, if any
    pub fn owner_of(&self, key: &str) -> Option<Arc<dyn DataAdapter>> {
        self.adapters
            .values()
            .find(|a| a.keys().iter().any(|k| k == key))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
