//! Speaker client
//!
//! Talks to a speaker HTTP bridge on the home network. The bridge groups
//! speakers into zones; snapshots store one entry per speaker.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::http::send_json;
use crate::adapters::{Configurable, LiveReadable, SnapshotCapturable};
use crate::error::AdapterError;
use crate::types::{services, SonosConfig};

pub const KEY_PLAYERS: &str = "speakers.players";
pub const KEY_NOW_PLAYING: &str = "speakers.now-playing";

pub struct SonosClient {
    client: reqwest::Client,
    api_url: Option<String>,
    timeout: Duration,
}

impl SonosClient {
    pub fn new(config: &SonosConfig, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config
                .api_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            timeout,
        }
    }

    async fn zones(&self) -> Result<Value, AdapterError> {
        let api_url = self
            .api_url
            .as_deref()
            .ok_or_else(|| AdapterError::NotConfigured(services::SPEAKERS.to_string()))?;
        let request = self.client.get(format!("{}/zones", api_url));
        send_json(services::SPEAKERS, request, self.timeout).await
    }

    /// Every speaker across all zones
    pub async fn players(&self) -> Result<Value, AdapterError> {
        Ok(players_from_zones(&self.zones().await?))
    }

    pub async fn now_playing(&self) -> Result<Value, AdapterError> {
        Ok(now_playing(&self.players().await?))
    }
}

pub fn players_from_zones(zones: &Value) -> Value {
    let Some(zones) = zones.as_array() else {
        return json!([]);
    };

    let players = zones
        .iter()
        .flat_map(|zone| {
            let coordinator = zone.pointer("/coordinator/uuid").cloned().unwrap_or(Value::Null);
            zone.get("members")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .map(move |member| {
                    json!({
                        "uuid": member.get("uuid"),
                        "name": member.get("roomName"),
                        "roomName": member.get("roomName"),
                        "coordinator": coordinator,
                        "state": member.get("state"),
                    })
                })
        })
        .collect();
    Value::Array(players)
}

/// Condensed per-speaker view for the dashboard tile
pub fn now_playing(players: &Value) -> Value {
    let Some(players) = players.as_array() else {
        return json!([]);
    };

    let entries = players
        .iter()
        .map(|player| {
            let track = player.pointer("/state/currentTrack").filter(|t| {
                t.get("title")
                    .and_then(Value::as_str)
                    .is_some_and(|title| !title.is_empty())
            });
            json!({
                "playerId": player.get("uuid"),
                "playerName": player.get("name"),
                "roomName": player.get("roomName"),
                "isPlaying": player.pointer("/state/playbackState").and_then(Value::as_str) == Some("PLAYING"),
                "track": track.map(|t| json!({
                    "title": t.get("title"),
                    "artist": t.get("artist"),
                    "album": t.get("album"),
                    "albumArtUri": t.get("absoluteAlbumArtUri").or_else(|| t.get("albumArtUri")),
                })),
                "volume": player.pointer("/state/volume").and_then(Value::as_u64).unwrap_or(0),
            })
        })
        .collect();
    Value::Array(entries)
}

impl Configurable for SonosClient {
    fn service_name(&self) -> &str {
        services::SPEAKERS
    }

    fn is_configured(&self) -> bool {
        self.api_url.is_some()
    }
}

#[async_trait]
impl LiveReadable for SonosClient {
    fn keys(&self) -> Vec<String> {
        vec![KEY_PLAYERS.to_string(), KEY_NOW_PLAYING.to_string()]
    }

    async fn read_live(&self, key: &str) -> Result<Value, AdapterError> {
        match key {
            KEY_PLAYERS => self.players().await,
            KEY_NOW_PLAYING => self.now_playing().await,
            other => Err(AdapterError::NoData(format!("speakers has no key {}", other))),
        }
    }
}

#[async_trait]
impl SnapshotCapturable for SonosClient {
    /// One bridge call feeds both keys
    async fn capture_live(&self) -> Result<Vec<(String, Value)>, AdapterError> {
        let players = self.players().await?;
        let summary = now_playing(&players);
        Ok(vec![(KEY_PLAYERS.to_string(), players), (KEY_NOW_PLAYING.to_string(), summary)])
    }
}
