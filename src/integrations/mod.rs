//! Live clients for the external services behind each adapter
//!
//! Each client implements the capability traits from [`crate::adapters`] and
//! knows nothing about modes or snapshots.

pub mod calendar;
pub mod cta;
pub mod fitness;
pub mod http;
pub mod hue;
pub mod sonos;
pub mod spotify;

pub use calendar::CalendarClient;
pub use cta::CtaClient;
pub use fitness::FitnessExport;
pub use hue::HueBridgeClient;
pub use sonos::SonosClient;
pub use spotify::SpotifyClient;
