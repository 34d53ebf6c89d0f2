//! Command-line / environment configuration shared by the binaries

use clap::Args;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::types::{
    CalendarConfig, CtaConfig, DesktopConfig, FitnessConfig, HearthConfig, HueConfig, SonosConfig,
    SpotifyConfig,
};

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Snapshot database path (":memory:" for an in-process store). Unset disables sync.
    #[arg(long, env = "HEARTH_DB_PATH")]
    pub db_path: Option<String>,

    /// Seconds between scheduled sweeps
    #[arg(
        long,
        env = "HEARTH_SYNC_INTERVAL_SECS",
        default_value = "300",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sync_interval_secs: u64,

    /// How long a probe result stays fresh
    #[arg(long, env = "HEARTH_PROBE_TTL_SECS", default_value = "300")]
    pub probe_ttl_secs: u64,

    #[arg(long, env = "HEARTH_PROBE_TIMEOUT_MS", default_value = "2000")]
    pub probe_timeout_ms: u64,

    /// Timeout for live reads and captures
    #[arg(long, env = "HEARTH_LIVE_TIMEOUT_MS", default_value = "10000")]
    pub live_timeout_ms: u64,

    #[arg(long, env = "HEARTH_STORE_TIMEOUT_MS", default_value = "5000")]
    pub store_timeout_ms: u64,

    /// Adapters captured concurrently during a sweep
    #[arg(long, env = "HEARTH_MAX_CONCURRENCY", default_value = "4")]
    pub max_concurrency: usize,

    /// Do not write live reads back to the store
    #[arg(long, env = "HEARTH_NO_WRITE_THROUGH")]
    pub no_write_through: bool,

    #[arg(long, env = "HEARTH_MIN_WRITE_INTERVAL_SECS", default_value = "300")]
    pub min_write_interval_secs: u64,

    #[arg(long, env = "HUE_BRIDGE_IP")]
    pub hue_bridge_ip: Option<String>,

    #[arg(long, env = "HUE_USERNAME")]
    pub hue_username: Option<String>,

    #[arg(long, env = "CTA_API_KEY")]
    pub cta_api_key: Option<String>,

    /// Comma-separated bus stop ids
    #[arg(long, env = "CTA_STOP_IDS", value_delimiter = ',')]
    pub cta_stop_ids: Vec<String>,

    /// Workout export JSON on this machine
    #[arg(long, env = "HEARTH_FITNESS_EXPORT")]
    pub fitness_export: Option<String>,

    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN")]
    pub spotify_access_token: Option<String>,

    #[arg(long, env = "GOOGLE_CALENDAR_ACCESS_TOKEN")]
    pub calendar_access_token: Option<String>,

    #[arg(long, env = "GOOGLE_CALENDAR_ID", default_value = "primary")]
    pub calendar_id: String,

    /// Speaker HTTP bridge, e.g. http://localhost:5005
    #[arg(long, env = "SONOS_API_URL")]
    pub sonos_api_url: Option<String>,

    /// Status URL of the desktop control agent
    #[arg(long, env = "DESKTOP_AGENT_URL")]
    pub desktop_agent_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "HEARTH_LOG_JSON")]
    pub log_json: bool,
}

impl ConfigArgs {
    pub fn into_config(self, listen_addr: Option<String>) -> HearthConfig {
        let defaults = HearthConfig::default();
        HearthConfig {
            db_path: self.db_path.map(|p| expand(&p)),
            listen_addr: listen_addr.unwrap_or(defaults.listen_addr),
            sync_interval_secs: self.sync_interval_secs,
            probe_ttl_secs: self.probe_ttl_secs,
            probe_timeout_ms: self.probe_timeout_ms,
            live_timeout_ms: self.live_timeout_ms,
            store_timeout_ms: self.store_timeout_ms,
            max_concurrency: self.max_concurrency,
            write_through: !self.no_write_through,
            min_write_interval_secs: self.min_write_interval_secs,
            hue: HueConfig {
                bridge_ip: self.hue_bridge_ip,
                username: self.hue_username,
            },
            cta: CtaConfig {
                api_key: self.cta_api_key,
                stop_ids: self.cta_stop_ids,
                base_url: None,
            },
            fitness: FitnessConfig {
                export_path: self.fitness_export.map(|p| expand(&p)),
            },
            spotify: SpotifyConfig {
                access_token: self.spotify_access_token,
                base_url: None,
            },
            calendar: CalendarConfig {
                access_token: self.calendar_access_token,
                calendar_id: self.calendar_id,
                base_url: None,
            },
            sonos: SonosConfig {
                api_url: self.sonos_api_url,
            },
            desktop: DesktopConfig {
                agent_url: self.desktop_agent_url,
            },
        }
    }
}

fn expand(path: &str) -> String {
    if path == ":memory:" {
        return path.to_string();
    }
    shellexpand::tilde(path).to_string()
}

/// Install the global subscriber: stderr, `RUST_LOG` filter (default `info`)
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
