//! Core types for Hearth

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

// =============================================================================
// Service names
// =============================================================================

/// Well-known service names
pub mod services {
    pub const LIGHTING: &str = "lighting";
    pub const MUSIC: &str = "music";
    pub const CALENDAR: &str = "calendar";
    pub const TRANSIT: &str = "transit";
    pub const FITNESS: &str = "fitness";
    pub const SPEAKERS: &str = "speakers";
    pub const DESKTOP: &str = "desktop";

    /// Services whose reachability proves the process runs on the home network.
    /// Transit is a cloud API reachable from anywhere, so it never counts.
    pub const LOCAL_INDICATORS: &[&str] = &[LIGHTING, DESKTOP];
}

// =============================================================================
// Availability
// =============================================================================

/// Last known reachability of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAvailability {
    pub service_name: String,
    pub available: bool,
    /// None only before the first probe
    pub checked_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ServiceAvailability {
    /// Placeholder for a service that has never been probed
    pub fn unchecked(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            available: false,
            checked_at: None,
            error: None,
        }
    }

    pub fn up(service_name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            service_name: service_name.into(),
            available: true,
            checked_at: Some(at),
            error: None,
        }
    }

    pub fn down(service_name: impl Into<String>, at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            available: false,
            checked_at: Some(at),
            error: Some(error.into()),
        }
    }

    /// Whether this record is younger than `ttl` at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.checked_at {
            Some(at) => {
                let age = now.signed_duration_since(at);
                age.to_std().map(|age| age < ttl).unwrap_or(true)
            }
            None => false,
        }
    }
}

/// Which role the process is currently playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Local,
    Public,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Local => "local",
            DeploymentMode::Public => "public",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, DeploymentMode::Local)
    }
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode summary for the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeInfo {
    pub mode: DeploymentMode,
    pub is_local: bool,
    pub controls_enabled: bool,
    pub display_name: String,
    pub description: String,
    pub services: BTreeMap<String, ServiceAvailability>,
}

// =============================================================================
// Snapshots
// =============================================================================

/// Role of the writer that produced a snapshot. Only local writers exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Local,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        "local"
    }
}

/// Latest captured value for one logical key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub key: String,
    pub payload: serde_json::Value,
    pub captured_at: DateTime<Utc>,
    pub source_mode: SourceMode,
}

impl Snapshot {
    pub fn new(key: impl Into<String>, payload: serde_json::Value, captured_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            payload,
            captured_at,
            source_mode: SourceMode::Local,
        }
    }
}

/// Where a read was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Cached,
}

/// Result of an adapter read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOutcome {
    pub key: String,
    pub payload: serde_json::Value,
    pub source: DataSource,
    /// Capture time of the snapshot when served from cache
    pub captured_at: Option<DateTime<Utc>>,
    /// True when a local process fell back to cache because the live call failed
    pub stale: bool,
}

// =============================================================================
// Sync
// =============================================================================

/// Which adapters a sweep should cover
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepRequest {
    /// Explicit service names; `None` selects the default set
    #[serde(default)]
    pub services: Option<Vec<String>>,
    /// Also run adapters that need an interactive login
    #[serde(default)]
    pub include_authenticated: bool,
}

impl SweepRequest {
    pub fn only(service: impl Into<String>) -> Self {
        Self {
            services: Some(vec![service.into()]),
            include_authenticated: false,
        }
    }

    pub fn with_authenticated() -> Self {
        Self {
            services: None,
            include_authenticated: true,
        }
    }
}

/// Per-adapter entry of a sweep report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSyncResult {
    pub service_name: String,
    pub success: bool,
    pub records_written: u64,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub duration_ms: u64,
}

/// Outcome of one sweep; never persisted by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub sweep_id: String,
    pub per_service: Vec<ServiceSyncResult>,
    pub total_records_written: u64,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl SyncReport {
    /// True iff every selected adapter succeeded
    pub fn success(&self) -> bool {
        self.per_service.iter().all(|r| r.success)
    }

    pub fn entry(&self, service_name: &str) -> Option<&ServiceSyncResult> {
        self.per_service.iter().find(|r| r.service_name == service_name)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ServiceSyncResult> {
        self.per_service.iter().filter(|r| !r.success)
    }
}

/// Row of the store's sync log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub service_name: String,
    pub success: bool,
    pub records_written: u64,
    pub error: Option<String>,
    pub synced_at: DateTime<Utc>,
}

/// Side-effect-free view for `/sync-status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub mode: DeploymentMode,
    pub can_sync: bool,
    pub available_service_names: Vec<String>,
    pub store_configured: bool,
    pub scheduler_running: bool,
    pub last_sweep: Option<SyncReport>,
    pub last_successful_sync: BTreeMap<String, Option<DateTime<Utc>>>,
}

// =============================================================================
// Configuration
// =============================================================================

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HearthConfig {
    /// SQLite snapshot database; absent means the store is unconfigured
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_probe_ttl")]
    pub probe_ttl_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_live_timeout")]
    pub live_timeout_ms: u64,
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Write live reads through to the store
    #[serde(default = "default_true")]
    pub write_through: bool,
    #[serde(default = "default_min_write_interval")]
    pub min_write_interval_secs: u64,
    #[serde(default)]
    pub hue: HueConfig,
    #[serde(default)]
    pub cta: CtaConfig,
    #[serde(default)]
    pub fitness: FitnessConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub sonos: SonosConfig,
    #[serde(default)]
    pub desktop: DesktopConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3030".to_string()
}

fn default_sync_interval() -> u64 {
    300
}

fn default_probe_ttl() -> u64 {
    300 // 5 minutes
}

fn default_probe_timeout() -> u64 {
    2000
}

fn default_live_timeout() -> u64 {
    10_000
}

fn default_store_timeout() -> u64 {
    5000
}

fn default_max_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_min_write_interval() -> u64 {
    300
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            listen_addr: default_listen_addr(),
            sync_interval_secs: default_sync_interval(),
            probe_ttl_secs: default_probe_ttl(),
            probe_timeout_ms: default_probe_timeout(),
            live_timeout_ms: default_live_timeout(),
            store_timeout_ms: default_store_timeout(),
            max_concurrency: default_max_concurrency(),
            write_through: true,
            min_write_interval_secs: default_min_write_interval(),
            hue: HueConfig::default(),
            cta: CtaConfig::default(),
            fitness: FitnessConfig::default(),
            spotify: SpotifyConfig::default(),
            calendar: CalendarConfig::default(),
            sonos: SonosConfig::default(),
            desktop: DesktopConfig::default(),
        }
    }
}

impl HearthConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn probe_ttl(&self) -> Duration {
        Duration::from_secs(self.probe_ttl_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn live_timeout(&self) -> Duration {
        Duration::from_millis(self.live_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn min_write_interval(&self) -> Duration {
        Duration::from_secs(self.min_write_interval_secs)
    }
}

/// Lighting bridge on the home network
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HueConfig {
    pub bridge_ip: Option<String>,
    pub username: Option<String>,
}

impl HueConfig {
    pub fn is_configured(&self) -> bool {
        self.bridge_ip.is_some() && self.username.is_some()
    }
}

/// Transit prediction API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CtaConfig {
    pub api_key: Option<String>,
    #[serde(default)]
    pub stop_ids: Vec<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl CtaConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && !self.stop_ids.is_empty()
    }
}

/// Workout export written by the phone sync on the home machine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitnessConfig {
    pub export_path: Option<String>,
}

impl FitnessConfig {
    pub fn is_configured(&self) -> bool {
        self.export_path.is_some()
    }
}

/// Music playback; the token comes from an interactive login elsewhere
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub access_token: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl SpotifyConfig {
    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub access_token: Option<String>,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            calendar_id: default_calendar_id(),
            base_url: None,
        }
    }
}

impl CalendarConfig {
    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Speaker HTTP bridge on the home network
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SonosConfig {
    pub api_url: Option<String>,
}

impl SonosConfig {
    pub fn is_configured(&self) -> bool {
        self.api_url.is_some()
    }
}

/// Desktop control agent; only used as a local-capability probe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesktopConfig {
    pub agent_url: Option<String>,
}
