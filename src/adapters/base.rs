//! Mode-aware adapter wrapping one integration

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use super::{CaptureOutcome, ChangeTracker, DataAdapter, Integration};
use crate::availability::ModeClassifier;
use crate::clock::SharedClock;
use crate::error::{AdapterError, HearthError, Result, StoreError};
use crate::storage::SnapshotStore;
use crate::types::{DataSource, DeploymentMode, HearthConfig, ReadOutcome, Snapshot};

/// Timeouts and write-through policy for one adapter
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    /// Bound on a live read or capture, distinct from the probe timeout
    pub live_timeout: Duration,
    pub write_through: bool,
    pub min_write_interval: Duration,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            live_timeout: Duration::from_secs(10),
            write_through: true,
            min_write_interval: Duration::from_secs(300),
        }
    }
}

impl From<&HearthConfig> for AdapterSettings {
    fn from(config: &HearthConfig) -> Self {
        Self {
            live_timeout: config.live_timeout(),
            write_through: config.write_through,
            min_write_interval: config.min_write_interval(),
        }
    }
}

pub struct Adapter<I: Integration> {
    integration: I,
    mode: ModeClassifier,
    store: Arc<dyn SnapshotStore>,
    clock: SharedClock,
    settings: AdapterSettings,
    /// Serialises snapshot writes for this adapter across overlapping sweeps
    write_lock: AsyncMutex<()>,
    /// Bumped by every capture, under `write_lock`
    capture_generation: AtomicU64,
    changes: ChangeTracker,
}

impl<I: Integration> Adapter<I> {
    pub fn new(
        integration: I,
        mode: ModeClassifier,
        store: Arc<dyn SnapshotStore>,
        clock: SharedClock,
        settings: AdapterSettings,
    ) -> Self {
        let changes = ChangeTracker::new(settings.min_write_interval);
        Self {
            integration,
            mode,
            store,
            clock,
            settings,
            write_lock: AsyncMutex::new(()),
            capture_generation: AtomicU64::new(0),
            changes,
        }
    }

    pub fn integration(&self) -> &I {
        &self.integration
    }

    fn name(&self) -> &str {
        self.integration.service_name()
    }

    /// Latest stored snapshot for `key`
    pub async fn read_cached(&self, key: &str) -> std::result::Result<Option<Snapshot>, StoreError> {
        self.store.get(key).await
    }

    async fn read_live_bounded(&self, key: &str) -> std::result::Result<serde_json::Value, AdapterError> {
        match tokio::time::timeout(self.settings.live_timeout, self.integration.read_live(key)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::timeout(
                &format!("{} live read", self.name()),
                self.settings.live_timeout,
            )),
        }
    }

    fn cached_outcome(snapshot: Snapshot, stale: bool) -> ReadOutcome {
        ReadOutcome {
            key: snapshot.key,
            payload: snapshot.payload,
            source: DataSource::Cached,
            captured_at: Some(snapshot.captured_at),
            stale,
        }
    }

    /// Serve from the store, or fail with `missing` when nothing is cached
    async fn cached_or(&self, key: &str, missing: AdapterError) -> Result<ReadOutcome> {
        match self.read_cached(key).await? {
            Some(snapshot) => Ok(Self::cached_outcome(snapshot, false)),
            None => {
                tracing::debug!("No snapshot for {}", key);
                Err(missing.into())
            }
        }
    }

    /// Best-effort write of a live value; never fails the read.
    ///
    /// `generation` is the capture generation seen before the live fetch
    /// started. A capture that completed since then holds a newer value.
    async fn write_through(&self, key: &str, payload: &serde_json::Value, generation: u64) {
        if !self.settings.write_through || !self.store.is_configured() {
            return;
        }

        let now = self.clock.now();
        if !self.changes.should_write(key, payload, now) {
            return;
        }

        // A capture in progress will write a fresher value anyway
        let Ok(_held) = self.write_lock.try_lock() else {
            tracing::debug!("Skipping write-through for {}: capture in progress", key);
            return;
        };
        if self.capture_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Skipping write-through for {}: superseded by a capture", key);
            return;
        }

        match self.store.put(key, payload.clone(), now).await {
            Ok(_) => self.changes.record(key, payload, now),
            Err(e) => tracing::warn!("Write-through for {} failed: {}", key, e),
        }
    }
}

#[async_trait]
impl<I: Integration + 'static> DataAdapter for Adapter<I> {
    fn service_name(&self) -> &str {
        self.integration.service_name()
    }

    fn is_configured(&self) -> bool {
        self.integration.is_configured()
    }

    fn requires_interactive_auth(&self) -> bool {
        self.integration.requires_interactive_auth()
    }

    fn keys(&self) -> Vec<String> {
        self.integration.keys()
    }

    async fn read(&self, key: &str) -> Result<ReadOutcome> {
        if !self.integration.keys().iter().any(|k| k == key) {
            return Err(AdapterError::NoData(format!("{} has no key {}", self.name(), key)).into());
        }

        if self.mode.current_mode() == DeploymentMode::Public {
            return self
                .cached_or(key, AdapterError::NoData(format!("no snapshot for {}", key)))
                .await;
        }

        if !self.integration.is_configured() {
            return self
                .cached_or(key, AdapterError::NotConfigured(self.name().to_string()))
                .await;
        }

        let generation = self.capture_generation.load(Ordering::SeqCst);
        let live_error = match self.read_live_bounded(key).await {
            Ok(payload) => {
                self.write_through(key, &payload, generation).await;
                return Ok(ReadOutcome {
                    key: key.to_string(),
                    payload,
                    source: DataSource::Live,
                    captured_at: None,
                    stale: false,
                });
            }
            Err(e) => e,
        };

        tracing::warn!("Live read of {} failed, trying snapshot: {}", key, live_error);
        match self.read_cached(key).await {
            Ok(Some(snapshot)) => Ok(Self::cached_outcome(snapshot, true)),
            Ok(None) => Err(live_error.into()),
            Err(store_error) => {
                tracing::error!("Snapshot fallback for {} failed: {}", key, store_error);
                Err(live_error.into())
            }
        }
    }

    async fn capture_snapshot(&self) -> Result<CaptureOutcome> {
        self.mode
            .ensure_local_or_fail(&format!("{} snapshot capture", self.name()))?;

        if !self.store.is_configured() {
            return Err(StoreError::NotConfigured.into());
        }
        if !self.integration.is_configured() {
            return Err(AdapterError::NotConfigured(self.name().to_string()).into());
        }

        let _held = self.write_lock.lock().await;

        let fetched = tokio::time::timeout(self.settings.live_timeout, self.integration.capture_live())
            .await
            .map_err(|_| {
                AdapterError::timeout(&format!("{} capture", self.name()), self.settings.live_timeout)
            })??;
        self.capture_generation.fetch_add(1, Ordering::SeqCst);

        let captured_at = self.clock.now();
        let mut keys = Vec::with_capacity(fetched.len());
        for (key, payload) in fetched {
            self.store
                .put(&key, payload.clone(), captured_at)
                .await
                .map_err(HearthError::from)?;
            self.changes.record(&key, &payload, captured_at);
            keys.push(key);
        }

        tracing::debug!("Captured {} snapshots for {}", keys.len(), self.name());
        Ok(CaptureOutcome {
            records_written: keys.len() as u64,
            keys,
            captured_at,
        })
    }
}
