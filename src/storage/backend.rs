//! Snapshot store trait
//!
//! The core needs very little from the durable store: read the latest
//! snapshot for a key, overwrite the snapshot for a key, and keep a log of
//! sync outcomes. Retention and pruning belong to whoever operates the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{Snapshot, SyncLogEntry};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable key/value store of the latest snapshot per key
///
/// Implementations must make `put` atomic per key (last write wins) and
/// bound every call with a timeout so a stalled store cannot wedge a sweep
/// or a foreground read.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Short backend name for logs and status output
    fn backend_name(&self) -> &'static str;

    /// False for the placeholder used when no store is set up
    fn is_configured(&self) -> bool {
        true
    }

    /// Latest snapshot for `key`
    async fn get(&self, key: &str) -> StoreResult<Option<Snapshot>>;

    /// Overwrite the snapshot for `key`
    async fn put(
        &self,
        key: &str,
        payload: serde_json::Value,
        captured_at: DateTime<Utc>,
    ) -> StoreResult<Snapshot>;

    /// Number of stored snapshots
    async fn snapshot_count(&self) -> StoreResult<usize>;

    /// Append a sync outcome to the log
    async fn record_sync(&self, entry: &SyncLogEntry) -> StoreResult<()>;

    /// Time of the latest successful sync for `service_name`
    async fn last_successful_sync(&self, service_name: &str) -> StoreResult<Option<DateTime<Utc>>>;
}
