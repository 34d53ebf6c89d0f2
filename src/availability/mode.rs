//! Local / public mode derivation and the mutation guard

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::AvailabilityRegistry;
use crate::error::GuardError;
use crate::types::{DeploymentMode, ModeInfo};

const MODE_UNSEEN: u8 = 0;
const MODE_LOCAL: u8 = 1;
const MODE_PUBLIC: u8 = 2;

/// Derives the deployment mode from the registry on every call.
///
/// Holds no mode state of its own; the only field besides the registry
/// remembers the last observed mode so flips are logged once.
#[derive(Clone)]
pub struct ModeClassifier {
    registry: Arc<AvailabilityRegistry>,
    last_seen: Arc<AtomicU8>,
}

impl ModeClassifier {
    pub fn new(registry: Arc<AvailabilityRegistry>) -> Self {
        Self {
            registry,
            last_seen: Arc::new(AtomicU8::new(MODE_UNSEEN)),
        }
    }

    pub fn registry(&self) -> &Arc<AvailabilityRegistry> {
        &self.registry
    }

    /// Local iff a local-capability indicator was last seen available.
    /// No I/O; never triggers a probe.
    pub fn current_mode(&self) -> DeploymentMode {
        let mode = if self.registry.any_local_service_available() {
            DeploymentMode::Local
        } else {
            DeploymentMode::Public
        };
        self.note_transition(mode);
        mode
    }

    pub fn is_local(&self) -> bool {
        self.current_mode().is_local()
    }

    /// Mutation guard: fails closed unless the process is in local mode
    pub fn ensure_local_or_fail(&self, operation: &str) -> std::result::Result<(), GuardError> {
        match self.current_mode() {
            DeploymentMode::Local => Ok(()),
            DeploymentMode::Public => {
                tracing::debug!("Guard rejected {} in public mode", operation);
                Err(GuardError::new(operation))
            }
        }
    }

    pub fn mode_info(&self) -> ModeInfo {
        let mode = self.current_mode();
        let is_local = mode.is_local();
        ModeInfo {
            mode,
            is_local,
            controls_enabled: is_local,
            display_name: if is_local { "Local Mode" } else { "Live View" }.to_string(),
            description: if is_local {
                "Connected to real devices"
            } else {
                "Showing the latest captured snapshots"
            }
            .to_string(),
            services: self.registry.all(),
        }
    }

    fn note_transition(&self, mode: DeploymentMode) {
        let code = match mode {
            DeploymentMode::Local => MODE_LOCAL,
            DeploymentMode::Public => MODE_PUBLIC,
        };
        let previous = self.last_seen.swap(code, Ordering::Relaxed);
        if previous != MODE_UNSEEN && previous != code {
            tracing::info!("Deployment mode changed to {}", mode);
        }
    }
}
