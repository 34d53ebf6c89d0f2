//! Process wiring
//!
//! Every component is built exactly once here and shared by `Arc`. Tests
//! assemble their own runtime with a manual clock, an in-memory store and
//! stub adapters.

use std::sync::Arc;

use crate::adapters::{Adapter, AdapterCatalog, AdapterSettings, DataAdapter, Integration};
use crate::availability::{AvailabilityRegistry, HttpReachability, ModeClassifier, ServiceProbe};
use crate::clock::{system_clock, SharedClock};
use crate::error::Result;
use crate::integrations::{
    CalendarClient, CtaClient, FitnessExport, HueBridgeClient, SonosClient, SpotifyClient,
};
use crate::storage::{open_store, SnapshotStore};
use crate::sync::{SyncOrchestrator, SyncScheduler};
use crate::types::{services, HearthConfig, SyncStatus};

/// What an adapter needs from the runtime
pub struct AdapterContext {
    pub mode: ModeClassifier,
    pub store: Arc<dyn SnapshotStore>,
    pub clock: SharedClock,
    pub settings: AdapterSettings,
}

impl AdapterContext {
    /// Wrap an integration in the mode-aware adapter
    pub fn adapter<I: Integration + 'static>(&self, integration: I) -> Arc<dyn DataAdapter> {
        Arc::new(Adapter::new(
            integration,
            self.mode.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.settings.clone(),
        ))
    }
}

pub struct HearthRuntime {
    config: HearthConfig,
    clock: SharedClock,
    registry: Arc<AvailabilityRegistry>,
    probe: Arc<ServiceProbe>,
    mode: ModeClassifier,
    store: Arc<dyn SnapshotStore>,
    scheduler: Arc<SyncScheduler>,
}

impl HearthRuntime {
    /// Build the full runtime: durable store, every integration, and the
    /// reachability checks for the local indicators
    pub fn from_config(config: HearthConfig) -> Result<Self> {
        let store = open_store(&config)?;
        let runtime = Self::assemble(config, system_clock(), store, Self::default_catalog);
        runtime.register_default_checks();

        tracing::info!(
            "Runtime ready: store={}, adapters=[{}], probes=[{}]",
            runtime.store.backend_name(),
            runtime.orchestrator().catalog().names().join(", "),
            runtime.probe.registered_names().join(", ")
        );
        Ok(runtime)
    }

    /// Wire components around a given clock, store and adapter set
    pub fn assemble(
        config: HearthConfig,
        clock: SharedClock,
        store: Arc<dyn SnapshotStore>,
        build_catalog: impl FnOnce(&HearthConfig, &AdapterContext) -> AdapterCatalog,
    ) -> Self {
        let registry = Arc::new(AvailabilityRegistry::with_default_indicators());
        let probe = Arc::new(ServiceProbe::new(
            registry.clone(),
            clock.clone(),
            config.probe_timeout(),
        ));
        let mode = ModeClassifier::new(registry.clone());

        let context = AdapterContext {
            mode: mode.clone(),
            store: store.clone(),
            clock: clock.clone(),
            settings: AdapterSettings::from(&config),
        };
        let catalog = build_catalog(&config, &context);

        let orchestrator = Arc::new(SyncOrchestrator::new(
            catalog,
            mode.clone(),
            store.clone(),
            clock.clone(),
            config.max_concurrency,
        ));
        let scheduler = Arc::new(SyncScheduler::new(orchestrator, probe.clone()));

        Self {
            config,
            clock,
            registry,
            probe,
            mode,
            store,
            scheduler,
        }
    }

    /// Every known integration, configured or not
    pub fn default_catalog(config: &HearthConfig, context: &AdapterContext) -> AdapterCatalog {
        let timeout = config.live_timeout();
        AdapterCatalog::new()
            .with(context.adapter(HueBridgeClient::new(&config.hue, timeout)))
            .with(context.adapter(CtaClient::new(config.cta.clone(), timeout)))
            .with(context.adapter(FitnessExport::new(&config.fitness)))
            .with(context.adapter(SpotifyClient::new(&config.spotify, timeout)))
            .with(context.adapter(CalendarClient::new(config.calendar.clone(), timeout)))
            .with(context.adapter(SonosClient::new(&config.sonos, timeout)))
    }

    /// Register reachability checks for the configured local indicators
    pub fn register_default_checks(&self) {
        let ttl = self.config.probe_ttl();
        let timeout = self.config.probe_timeout();

        if let (Some(ip), Some(user)) = (&self.config.hue.bridge_ip, &self.config.hue.username) {
            self.probe.register(
                services::LIGHTING,
                Arc::new(HttpReachability::hue_bridge(ip, user, timeout)),
                ttl,
            );
        }
        if let Some(url) = &self.config.desktop.agent_url {
            self.probe.register(
                services::DESKTOP,
                Arc::new(HttpReachability::new(url.clone(), timeout)),
                ttl,
            );
        }
        if self.probe.registered_names().is_empty() {
            tracing::warn!("No local indicator configured; this process will always run in public mode");
        }
    }

    pub fn config(&self) -> &HearthConfig {
        &self.config
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn registry(&self) -> &Arc<AvailabilityRegistry> {
        &self.registry
    }

    pub fn probe(&self) -> &Arc<ServiceProbe> {
        &self.probe
    }

    pub fn mode(&self) -> &ModeClassifier {
        &self.mode
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<SyncScheduler> {
        &self.scheduler
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        self.scheduler.orchestrator()
    }

    pub fn adapters(&self) -> &AdapterCatalog {
        self.orchestrator().catalog()
    }

    /// Snapshot of sync readiness. Reads only; never probes.
    pub async fn sync_status(&self) -> SyncStatus {
        let mut last_successful_sync = std::collections::BTreeMap::new();
        for name in self.adapters().names() {
            let last = match self.store.last_successful_sync(&name).await {
                Ok(last) => last,
                Err(e) => {
                    tracing::warn!("Could not read sync log for {}: {}", name, e);
                    None
                }
            };
            last_successful_sync.insert(name, last);
        }

        SyncStatus {
            mode: self.mode.current_mode(),
            can_sync: self.orchestrator().can_sync(),
            available_service_names: self.registry.available_service_names(),
            store_configured: self.store.is_configured(),
            scheduler_running: self.scheduler.is_running(),
            last_sweep: self.scheduler.last_report(),
            last_successful_sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemorySnapshotStore;
    use crate::types::{DeploymentMode, HueConfig};

    #[test]
    fn test_default_catalog_has_every_service() {
        let runtime = HearthRuntime::assemble(
            HearthConfig::default(),
            Arc::new(ManualClock::default()),
            Arc::new(MemorySnapshotStore::new()),
            HearthRuntime::default_catalog,
        );

        assert_eq!(
            runtime.adapters().names(),
            vec!["calendar", "fitness", "lighting", "music", "speakers", "transit"]
        );
        assert!(runtime.adapters().iter().all(|a| !a.is_configured()));
        assert_eq!(runtime.mode().current_mode(), DeploymentMode::Public);
    }

    #[test]
    fn test_checks_registered_only_when_configured() {
        let config = HearthConfig {
            hue: HueConfig {
                bridge_ip: Some("192.168.1.2".into()),
                username: Some("user".into()),
            },
            ..Default::default()
        };
        let runtime = HearthRuntime::assemble(
            config,
            Arc::new(ManualClock::default()),
            Arc::new(MemorySnapshotStore::new()),
            HearthRuntime::default_catalog,
        );
        runtime.register_default_checks();

        assert_eq!(runtime.probe().registered_names(), vec!["lighting"]);
    }

    #[tokio::test]
    async fn test_sync_status_without_side_effects() {
        let runtime = HearthRuntime::assemble(
            HearthConfig::default(),
            Arc::new(ManualClock::default()),
            Arc::new(MemorySnapshotStore::new()),
            HearthRuntime::default_catalog,
        );

        let status = runtime.sync_status().await;

        assert!(!status.can_sync);
        assert!(status.store_configured);
        assert!(status.last_sweep.is_none());
        assert_eq!(status.last_successful_sync.len(), 6);
        assert!(runtime.registry().all().is_empty());
    }
}
