//! Snapshot synchronisation
//!
//! The orchestrator runs one sweep; the scheduler runs sweeps on a timer and
//! on demand. Only a local process can sweep.

mod orchestrator;
mod scheduler;

pub use orchestrator::SyncOrchestrator;
pub use scheduler::SyncScheduler;
