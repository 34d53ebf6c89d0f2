//! Background sync scheduler
//!
//! One worker task owns the timer. Commands arrive over a channel; the
//! command branch is polled first so a stop request always wins over a tick
//! that became ready at the same moment.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::SyncOrchestrator;
use crate::availability::ServiceProbe;
use crate::error::{ErrorKind, HearthError, Result};
use crate::types::{SweepRequest, SyncReport};

/// Commands for the scheduler worker
#[derive(Debug)]
enum SchedulerCommand {
    /// Stop after the sweep in flight, if any
    Stop,
}

struct Worker {
    sender: mpsc::Sender<SchedulerCommand>,
    task: JoinHandle<()>,
}

struct Shared {
    orchestrator: Arc<SyncOrchestrator>,
    probe: Arc<ServiceProbe>,
    last_report: RwLock<Option<SyncReport>>,
}

impl Shared {
    async fn sweep(&self, request: &SweepRequest) -> Result<SyncReport> {
        let report = self.orchestrator.run_sweep(request).await?;
        *self.last_report.write() = Some(report.clone());
        Ok(report)
    }

    /// Refresh the local indicators, then run the default sweep
    async fn tick(&self) {
        self.probe.probe_indicators().await;

        match self.sweep(&SweepRequest::default()).await {
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::GuardRejected | ErrorKind::NotConfigured) => {
                tracing::debug!("Scheduled sweep skipped: {}", e);
            }
            Err(e) => tracing::error!("Scheduled sweep failed: {}", e),
        }
    }
}

/// Periodically runs the default sweep outside any request
pub struct SyncScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl SyncScheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, probe: Arc<ServiceProbe>) -> Self {
        Self {
            shared: Arc::new(Shared {
                orchestrator,
                probe,
                last_report: RwLock::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start ticking every `period`, first tick immediately.
    ///
    /// Returns false when already running; a second timer is never created.
    /// A zero period is a configuration error.
    pub fn start(&self, period: Duration) -> Result<bool> {
        if period.is_zero() {
            return Err(HearthError::Config("sync interval must be greater than zero".to_string()));
        }

        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.task.is_finished()) {
            tracing::debug!("Sync scheduler already running");
            return Ok(false);
        }

        let (sender, mut receiver) = mpsc::channel::<SchedulerCommand>(8);
        let shared = self.shared.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    cmd = receiver.recv() => {
                        match cmd {
                            Some(SchedulerCommand::Stop) | None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        shared.tick().await;
                    }
                }
            }

            tracing::info!("Sync scheduler stopped");
        });

        tracing::info!("Sync scheduler started, interval {}s", period.as_secs());
        *worker = Some(Worker { sender, task });
        Ok(true)
    }

    /// Stop ticking. Waits for a sweep in flight to finish; no tick runs after
    /// this returns.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        // A closed channel means the loop already exited
        let _ = worker.sender.send(SchedulerCommand::Stop).await;
        if let Err(e) = worker.task.await {
            tracing::error!("Sync scheduler task failed: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.task.is_finished())
    }

    /// Run a sweep now and wait for it
    pub async fn trigger_now(&self, request: SweepRequest) -> Result<SyncReport> {
        self.shared.sweep(&request).await
    }

    /// Run a sweep on a background task
    pub fn trigger_background(&self, request: SweepRequest) -> JoinHandle<Result<SyncReport>> {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let result = shared.sweep(&request).await;
            if let Err(e) = &result {
                log_background_failure(e);
            }
            result
        })
    }

    /// Most recent report produced by this scheduler, ticked or triggered
    pub fn last_report(&self) -> Option<SyncReport> {
        self.shared.last_report.read().clone()
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.shared.orchestrator
    }
}

fn log_background_failure(e: &HearthError) {
    if e.is_expected() {
        tracing::debug!("Background sweep rejected: {}", e);
    } else {
        tracing::warn!("Background sweep failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterCatalog, CaptureOutcome, DataAdapter};
    use crate::availability::{AvailabilityRegistry, ModeClassifier};
    use crate::clock::system_clock;
    use crate::error::AdapterError;
    use crate::storage::MemorySnapshotStore;
    use crate::types::{ReadOutcome, ServiceAvailability};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAdapter {
        captures: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl DataAdapter for CountingAdapter {
        fn service_name(&self) -> &str {
            "transit"
        }

        fn is_configured(&self) -> bool {
            true
        }

        fn requires_interactive_auth(&self) -> bool {
            false
        }

        fn keys(&self) -> Vec<String> {
            vec!["transit.predictions".to_string()]
        }

        async fn read(&self, _key: &str) -> Result<ReadOutcome> {
            Err(AdapterError::NoData("transit".into()).into())
        }

        async fn capture_snapshot(&self) -> Result<CaptureOutcome> {
            tokio::time::sleep(self.delay).await;
            self.captures.fetch_add(1, Ordering::SeqCst);
            Ok(CaptureOutcome {
                records_written: 1,
                keys: self.keys(),
                captured_at: chrono::Utc::now(),
            })
        }
    }

    fn scheduler(local: bool, delay: Duration) -> (SyncScheduler, Arc<AtomicUsize>) {
        let registry = Arc::new(AvailabilityRegistry::default());
        if local {
            registry.set("lighting", ServiceAvailability::up("lighting", chrono::Utc::now()));
        }
        let captures = Arc::new(AtomicUsize::new(0));
        let catalog = AdapterCatalog::new().with(Arc::new(CountingAdapter {
            captures: captures.clone(),
            delay,
        }));
        let clock = system_clock();
        let orchestrator = Arc::new(SyncOrchestrator::new(
            catalog,
            ModeClassifier::new(registry.clone()),
            Arc::new(MemorySnapshotStore::new()),
            clock.clone(),
            2,
        ));
        let probe = Arc::new(ServiceProbe::new(registry, clock, Duration::from_secs(2)));
        (SyncScheduler::new(orchestrator, probe), captures)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let (scheduler, captures) = scheduler(true, Duration::ZERO);

        assert!(scheduler.start(Duration::from_secs(60)).unwrap());
        assert!(!scheduler.start(Duration::from_secs(60)).unwrap());
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(150)).await;
        scheduler.stop().await;

        // ticks at 0, 60 and 120 from a single timer
        assert_eq!(captures.load(Ordering::SeqCst), 3);
        assert!(!scheduler.is_running());
        assert!(scheduler.last_report().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_sweep_in_flight_finish() {
        let (scheduler, captures) = scheduler(true, Duration::from_secs(5));

        scheduler.start(Duration::from_secs(60)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.stop().await;

        assert_eq!(captures.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(captures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_public_ticks_do_nothing() {
        let (scheduler, captures) = scheduler(false, Duration::ZERO);

        scheduler.start(Duration::from_secs(60)).unwrap();
        tokio::time::sleep(Duration::from_secs(130)).await;
        scheduler.stop().await;

        assert_eq!(captures.load(Ordering::SeqCst), 0);
        assert!(scheduler.last_report().is_none());
    }

    #[tokio::test]
    async fn test_zero_period_is_rejected() {
        let (scheduler, _) = scheduler(true, Duration::ZERO);

        let err = scheduler.start(Duration::ZERO).unwrap_err();

        assert!(matches!(err, HearthError::Config(_)));
        assert!(!scheduler.is_running());
        assert!(scheduler.start(Duration::from_secs(60)).unwrap());
        assert!(scheduler.is_running());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_trigger_now_and_background() {
        let (scheduler, captures) = scheduler(true, Duration::ZERO);

        let report = scheduler.trigger_now(SweepRequest::default()).await.unwrap();
        assert!(report.success());

        let handle = scheduler.trigger_background(SweepRequest::only("transit"));
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.total_records_written, 1);
        assert_eq!(captures.load(Ordering::SeqCst), 2);
        assert!(!scheduler.is_running());
    }
}
