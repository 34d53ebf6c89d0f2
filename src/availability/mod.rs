//! Service availability and deployment mode
//!
//! A process decides at runtime whether it sits on the home network (local
//! mode, can reach the lighting bridge or desktop agent) or is a publicly
//! hosted instance (public mode, snapshots only). The decision is a pure
//! projection of the last probe results held in the registry.
//!
//! Operational assumption: exactly one local process exists at a time. Two
//! processes that both see local hardware will both write snapshots, last
//! write wins; nothing here elects a leader.

mod mode;
mod probe;
mod registry;

pub use mode::ModeClassifier;
pub use probe::{HttpReachability, ReachabilityCheck, ServiceProbe};
pub use registry::AvailabilityRegistry;
