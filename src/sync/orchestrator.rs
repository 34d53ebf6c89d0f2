//! One sweep across the adapter catalogue

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::adapters::{AdapterCatalog, DataAdapter};
use crate::availability::ModeClassifier;
use crate::clock::SharedClock;
use crate::error::{AdapterError, HearthError, Result, StoreError};
use crate::storage::SnapshotStore;
use crate::types::{ServiceSyncResult, SweepRequest, SyncLogEntry, SyncReport};

/// Runs captures for a set of adapters with per-adapter failure isolation
pub struct SyncOrchestrator {
    catalog: AdapterCatalog,
    mode: ModeClassifier,
    store: Arc<dyn SnapshotStore>,
    clock: SharedClock,
    max_concurrency: usize,
}

impl SyncOrchestrator {
    pub fn new(
        catalog: AdapterCatalog,
        mode: ModeClassifier,
        store: Arc<dyn SnapshotStore>,
        clock: SharedClock,
        max_concurrency: usize,
    ) -> Self {
        Self {
            catalog,
            mode,
            store,
            clock,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn catalog(&self) -> &AdapterCatalog {
        &self.catalog
    }

    pub fn mode(&self) -> &ModeClassifier {
        &self.mode
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Whether a sweep would pass its preconditions right now
    pub fn can_sync(&self) -> bool {
        self.mode.is_local() && self.store.is_configured()
    }

    /// Adapters a request covers.
    ///
    /// Without explicit names: every configured adapter, minus the ones that
    /// need an interactive login unless `include_authenticated` is set.
    /// Explicit names are taken as given; unknown names are an input error.
    pub fn select(&self, request: &SweepRequest) -> Result<Vec<Arc<dyn DataAdapter>>> {
        match &request.services {
            Some(names) => {
                let mut selected = Vec::with_capacity(names.len());
                for name in names {
                    let adapter = self.catalog.get(name).ok_or_else(|| {
                        HearthError::InvalidInput(format!(
                            "Unknown service '{}'. Known services: {}",
                            name,
                            self.catalog.names().join(", ")
                        ))
                    })?;
                    if !selected.iter().any(|a: &Arc<dyn DataAdapter>| a.service_name() == name.as_str()) {
                        selected.push(adapter);
                    }
                }
                Ok(selected)
            }
            None => Ok(self
                .catalog
                .iter()
                .filter(|a| a.is_configured())
                .filter(|a| request.include_authenticated || !a.requires_interactive_auth())
                .cloned()
                .collect()),
        }
    }

    /// Capture snapshots for the requested adapters.
    ///
    /// Fails as a whole only when the process is not local, the store is not
    /// configured, or the request names an unknown service. Everything that
    /// goes wrong inside one adapter is recorded in that adapter's entry.
    pub async fn run_sweep(&self, request: &SweepRequest) -> Result<SyncReport> {
        self.mode.ensure_local_or_fail("Sync")?;
        if !self.store.is_configured() {
            return Err(StoreError::NotConfigured.into());
        }

        let selected = self.select(request)?;
        let sweep_id = uuid::Uuid::new_v4().to_string();
        let started_at = self.clock.now();
        let started = Instant::now();

        tracing::info!(
            "Sweep {} starting for {} adapter(s)",
            sweep_id,
            selected.len()
        );

        // Built up front: a lazy `map` here makes the sweep future !Send
        let captures: Vec<_> = selected.into_iter().map(capture_isolated).collect();
        let mut per_service: Vec<ServiceSyncResult> = stream::iter(captures)
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        per_service.sort_by(|a, b| a.service_name.cmp(&b.service_name));

        let total_records_written = per_service
            .iter()
            .filter(|r| r.success)
            .map(|r| r.records_written)
            .sum();

        let report = SyncReport {
            sweep_id,
            per_service,
            total_records_written,
            duration_ms: started.elapsed().as_millis() as u64,
            started_at,
        };

        self.append_sync_log(&report).await;

        let failed: Vec<&str> = report.failed().map(|r| r.service_name.as_str()).collect();
        if failed.is_empty() {
            tracing::info!(
                "Sweep {} completed: {} records in {}ms",
                report.sweep_id,
                report.total_records_written,
                report.duration_ms
            );
        } else {
            tracing::warn!(
                "Sweep {} completed with failures ({}): {} records in {}ms",
                report.sweep_id,
                failed.join(", "),
                report.total_records_written,
                report.duration_ms
            );
        }

        Ok(report)
    }

    async fn append_sync_log(&self, report: &SyncReport) {
        let synced_at = self.clock.now();
        for entry in &report.per_service {
            let log = SyncLogEntry {
                service_name: entry.service_name.clone(),
                success: entry.success,
                records_written: entry.records_written,
                error: entry.error.clone(),
                synced_at,
            };
            if let Err(e) = self.store.record_sync(&log).await {
                tracing::warn!("Failed to record sync log for {}: {}", entry.service_name, e);
            }
        }
    }
}

/// Run one capture on its own task so a panic stays inside this entry
async fn capture_isolated(adapter: Arc<dyn DataAdapter>) -> ServiceSyncResult {
    let service_name = adapter.service_name().to_string();
    let started = Instant::now();

    let outcome = match tokio::spawn(async move { adapter.capture_snapshot().await }).await {
        Ok(result) => result,
        Err(join_error) => Err(AdapterError::Unknown(format!("capture task failed: {}", join_error)).into()),
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(capture) => {
            tracing::debug!(
                "{} captured {} record(s) in {}ms",
                service_name,
                capture.records_written,
                duration_ms
            );
            ServiceSyncResult {
                service_name,
                success: true,
                records_written: capture.records_written,
                error: None,
                error_kind: None,
                duration_ms,
            }
        }
        Err(e) => {
            if e.is_expected() {
                tracing::info!("{} not captured: {}", service_name, e);
            } else {
                tracing::warn!("{} capture failed: {}", service_name, e);
            }
            ServiceSyncResult {
                service_name,
                success: false,
                records_written: 0,
                error: Some(e.to_string()),
                error_kind: Some(e.kind()),
                duration_ms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CaptureOutcome;
    use crate::availability::AvailabilityRegistry;
    use crate::clock::{Clock, ManualClock};
    use crate::error::ErrorKind;
    use crate::storage::{MemorySnapshotStore, UnconfiguredStore};
    use crate::types::{ReadOutcome, ServiceAvailability};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tracks how many captures are running at once
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    enum Behaviour {
        Write(u64),
        Fail(AdapterError),
        Panic,
        Slow(std::time::Duration, Arc<Gauge>),
    }

    struct StubAdapter {
        name: &'static str,
        configured: bool,
        interactive: bool,
        behaviour: Behaviour,
        captures: AtomicUsize,
    }

    impl StubAdapter {
        fn new(name: &'static str, behaviour: Behaviour) -> Self {
            Self {
                name,
                configured: true,
                interactive: false,
                behaviour,
                captures: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DataAdapter for StubAdapter {
        fn service_name(&self) -> &str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        fn requires_interactive_auth(&self) -> bool {
            self.interactive
        }

        fn keys(&self) -> Vec<String> {
            vec![format!("{}.data", self.name)]
        }

        async fn read(&self, _key: &str) -> Result<ReadOutcome> {
            Err(AdapterError::NoData(self.name.to_string()).into())
        }

        async fn capture_snapshot(&self) -> Result<CaptureOutcome> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Write(n) => Ok(CaptureOutcome {
                    records_written: *n,
                    keys: self.keys(),
                    captured_at: chrono::Utc::now(),
                }),
                Behaviour::Fail(e) => Err(e.clone().into()),
                Behaviour::Panic => panic!("integration bug"),
                Behaviour::Slow(after, gauge) => {
                    let running = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
                    gauge.peak.fetch_max(running, Ordering::SeqCst);
                    tokio::time::sleep(*after).await;
                    gauge.current.fetch_sub(1, Ordering::SeqCst);
                    Ok(CaptureOutcome {
                        records_written: 1,
                        keys: self.keys(),
                        captured_at: chrono::Utc::now(),
                    })
                }
            }
        }
    }

    fn orchestrator(adapters: Vec<StubAdapter>, local: bool) -> (SyncOrchestrator, Arc<MemorySnapshotStore>) {
        orchestrator_with_limit(adapters, local, 4)
    }

    fn orchestrator_with_limit(
        adapters: Vec<StubAdapter>,
        local: bool,
        max_concurrency: usize,
    ) -> (SyncOrchestrator, Arc<MemorySnapshotStore>) {
        let clock = ManualClock::default();
        let registry = Arc::new(AvailabilityRegistry::default());
        if local {
            registry.set("lighting", ServiceAvailability::up("lighting", clock.now()));
        }
        let mut catalog = AdapterCatalog::new();
        for adapter in adapters {
            catalog.register(Arc::new(adapter));
        }
        let store = Arc::new(MemorySnapshotStore::new());
        let orchestrator = SyncOrchestrator::new(
            catalog,
            ModeClassifier::new(registry),
            store.clone(),
            Arc::new(clock),
            max_concurrency,
        );
        (orchestrator, store)
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_sweep_future_is_send() {
        let (orchestrator, _) = orchestrator(Vec::new(), true);
        let request = SweepRequest::default();
        assert_send(orchestrator.run_sweep(&request));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_concurrency_bounds_parallel_captures() {
        let gauge = Arc::new(Gauge::default());
        let slow = |name| StubAdapter::new(name, Behaviour::Slow(std::time::Duration::from_secs(1), gauge.clone()));
        let (orchestrator, _) =
            orchestrator_with_limit(vec![slow("lighting"), slow("transit"), slow("fitness")], true, 1);

        let started = Instant::now();
        let report = orchestrator.run_sweep(&SweepRequest::default()).await.unwrap();

        assert!(report.success());
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= std::time::Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_captures_overlap_up_to_the_limit() {
        let gauge = Arc::new(Gauge::default());
        let slow = |name| StubAdapter::new(name, Behaviour::Slow(std::time::Duration::from_secs(1), gauge.clone()));
        let (orchestrator, _) =
            orchestrator_with_limit(vec![slow("lighting"), slow("transit"), slow("fitness")], true, 2);

        orchestrator.run_sweep(&SweepRequest::default()).await.unwrap();

        assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_public_mode_rejects_whole_sweep() {
        let (orchestrator, store) = orchestrator(vec![StubAdapter::new("transit", Behaviour::Write(1))], false);

        let err = orchestrator.run_sweep(&SweepRequest::default()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::GuardRejected);
        assert!(store.sync_log().is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_others() {
        let (orchestrator, store) = orchestrator(
            vec![
                StubAdapter::new("lighting", Behaviour::Write(4)),
                StubAdapter::new("transit", Behaviour::Fail(AdapterError::Unreachable("timeout".into()))),
                StubAdapter::new("fitness", Behaviour::Write(2)),
            ],
            true,
        );

        let report = orchestrator.run_sweep(&SweepRequest::default()).await.unwrap();

        assert!(!report.success());
        assert_eq!(report.total_records_written, 6);
        assert_eq!(report.per_service.len(), 3);
        let transit = report.entry("transit").unwrap();
        assert_eq!(transit.error_kind, Some(ErrorKind::Unreachable));
        assert_eq!(transit.records_written, 0);
        assert_eq!(store.sync_log().len(), 3);
    }

    #[tokio::test]
    async fn test_panicking_adapter_is_recorded_as_unknown() {
        let (orchestrator, _) = orchestrator(
            vec![
                StubAdapter::new("lighting", Behaviour::Panic),
                StubAdapter::new("transit", Behaviour::Write(1)),
            ],
            true,
        );

        let report = orchestrator.run_sweep(&SweepRequest::default()).await.unwrap();

        assert_eq!(report.entry("lighting").unwrap().error_kind, Some(ErrorKind::Unknown));
        assert!(report.entry("transit").unwrap().success);
    }

    #[tokio::test]
    async fn test_default_selection_skips_interactive_and_unconfigured() {
        let mut music = StubAdapter::new("music", Behaviour::Write(1));
        music.interactive = true;
        let mut fitness = StubAdapter::new("fitness", Behaviour::Write(1));
        fitness.configured = false;
        let (orchestrator, _) = orchestrator(
            vec![music, fitness, StubAdapter::new("transit", Behaviour::Write(1))],
            true,
        );

        let names = |req: &SweepRequest| -> Vec<String> {
            orchestrator
                .select(req)
                .unwrap()
                .iter()
                .map(|a| a.service_name().to_string())
                .collect()
        };

        assert_eq!(names(&SweepRequest::default()), vec!["transit"]);
        assert_eq!(names(&SweepRequest::with_authenticated()), vec!["music", "transit"]);
        assert_eq!(names(&SweepRequest::only("music")), vec!["music"]);
    }

    #[tokio::test]
    async fn test_unknown_service_is_invalid_input() {
        let (orchestrator, _) = orchestrator(vec![StubAdapter::new("transit", Behaviour::Write(1))], true);
        let err = orchestrator
            .run_sweep(&SweepRequest::only("sonos"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_unconfigured_store_rejects_sweep() {
        let registry = Arc::new(AvailabilityRegistry::default());
        registry.set("lighting", ServiceAvailability::up("lighting", chrono::Utc::now()));
        let orchestrator = SyncOrchestrator::new(
            AdapterCatalog::new().with(Arc::new(StubAdapter::new("transit", Behaviour::Write(1)))),
            ModeClassifier::new(registry),
            Arc::new(UnconfiguredStore),
            crate::clock::system_clock(),
            2,
        );

        assert!(!orchestrator.can_sync());
        let err = orchestrator.run_sweep(&SweepRequest::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConfigured);
    }
}
