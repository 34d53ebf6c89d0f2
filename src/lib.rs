//! Hearth - dual-mode data access for a home dashboard
//!
//! The same binary runs on the home network, where it can reach the lighting
//! bridge and other local hardware, and on a public host, where it cannot.
//! Which role it plays is decided at runtime from probe results. The local
//! process captures snapshots of every integration into a durable store; the
//! public process serves those snapshots and rejects anything that would
//! need the hardware.

pub mod adapters;
pub mod api;
pub mod availability;
pub mod clock;
pub mod config;
pub mod error;
pub mod integrations;
pub mod runtime;
pub mod storage;
pub mod sync;
pub mod types;

pub use error::{HearthError, Result};
pub use runtime::HearthRuntime;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
