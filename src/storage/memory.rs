//! In-process stores
//!
//! `MemorySnapshotStore` keeps snapshots for the lifetime of the process and
//! backs tests and single-machine setups. `UnconfiguredStore` stands in when
//! no durable store is set up: reads find nothing, writes fail.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use super::backend::{SnapshotStore, StoreResult};
use crate::error::StoreError;
use crate::types::{Snapshot, SyncLogEntry};

#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: DashMap<String, Snapshot>,
    sync_log: Mutex<Vec<SyncLogEntry>>,
    writes: AtomicU64,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of `put` calls served
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn sync_log(&self) -> Vec<SyncLogEntry> {
        self.sync_log.lock().clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Snapshot>> {
        Ok(self.snapshots.get(key).map(|s| s.value().clone()))
    }

    async fn put(
        &self,
        key: &str,
        payload: serde_json::Value,
        captured_at: DateTime<Utc>,
    ) -> StoreResult<Snapshot> {
        let snapshot = Snapshot::new(key, payload, captured_at);
        self.snapshots.insert(key.to_string(), snapshot.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(snapshot)
    }

    async fn snapshot_count(&self) -> StoreResult<usize> {
        Ok(self.snapshots.len())
    }

    async fn record_sync(&self, entry: &SyncLogEntry) -> StoreResult<()> {
        self.sync_log.lock().push(entry.clone());
        Ok(())
    }

    async fn last_successful_sync(&self, service_name: &str) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self
            .sync_log
            .lock()
            .iter()
            .filter(|e| e.service_name == service_name && e.success)
            .map(|e| e.synced_at)
            .max())
    }
}

/// Placeholder used when no durable store is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredStore;

#[async_trait]
impl SnapshotStore for UnconfiguredStore {
    fn backend_name(&self) -> &'static str {
        "none"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<Snapshot>> {
        Ok(None)
    }

    async fn put(
        &self,
        _key: &str,
        _payload: serde_json::Value,
        _captured_at: DateTime<Utc>,
    ) -> StoreResult<Snapshot> {
        Err(StoreError::NotConfigured)
    }

    async fn snapshot_count(&self) -> StoreResult<usize> {
        Ok(0)
    }

    async fn record_sync(&self, _entry: &SyncLogEntry) -> StoreResult<()> {
        Ok(())
    }

    async fn last_successful_sync(&self, _service_name: &str) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(None)
    }
}
