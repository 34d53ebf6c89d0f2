//! Snapshot storage for Hearth
//!
//! The durable store is what public-mode processes read from and what the
//! local process writes to during sweeps and write-throughs.

mod backend;
mod memory;
mod migrations;
mod sqlite_backend;

use std::sync::Arc;

pub use backend::{SnapshotStore, StoreResult};
pub use memory::{MemorySnapshotStore, UnconfiguredStore};
pub use migrations::SCHEMA_VERSION;
pub use sqlite_backend::SqliteSnapshotStore;

use crate::types::HearthConfig;

/// Build the store described by the configuration
///
/// No `db_path` means no durable store: reads fall through to "no data" and
/// sweeps are rejected.
pub fn open_store(config: &HearthConfig) -> StoreResult<Arc<dyn SnapshotStore>> {
    match config.db_path.as_deref() {
        Some(":memory:") => Ok(Arc::new(MemorySnapshotStore::new())),
        Some(path) => Ok(Arc::new(SqliteSnapshotStore::open(path, config.store_timeout())?)),
        None => {
            tracing::warn!("No snapshot database configured; sync is disabled");
            Ok(Arc::new(UnconfiguredStore))
        }
    }
}
