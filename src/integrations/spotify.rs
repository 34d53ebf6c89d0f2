//! Music playback client
//!
//! Uses a bearer token obtained through an interactive login elsewhere, so
//! headless sweeps leave it out unless asked.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::http::send_json;
use crate::adapters::{Configurable, LiveReadable, SnapshotCapturable};
use crate::error::AdapterError;
use crate::types::{services, SpotifyConfig};

pub const KEY_PLAYBACK: &str = "music.playback";
pub const KEY_RECENT: &str = "music.recent";

const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";
const RECENT_LIMIT: u32 = 20;

pub struct SpotifyClient {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: config.access_token.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout,
        }
    }

    async fn get(&self, path: &str) -> Result<Value, AdapterError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| AdapterError::NotConfigured(services::MUSIC.to_string()))?;
        let request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token);
        send_json(services::MUSIC, request, self.timeout).await
    }

    /// Current playback; `{"isPlaying": false}` when nothing is active
    pub async fn playback(&self) -> Result<Value, AdapterError> {
        let body = self.get("/me/player").await?;
        if body.is_null() {
            return Ok(json!({"isPlaying": false}));
        }
        Ok(json!({
            "isPlaying": body.get("is_playing").and_then(Value::as_bool).unwrap_or(false),
            "progressMs": body.get("progress_ms"),
            "device": body.pointer("/device/name"),
            "track": body.pointer("/item/name"),
            "artists": body
                .pointer("/item/artists")
                .and_then(Value::as_array)
                .map(|artists| artists.iter().filter_map(|a| a.get("name")).cloned().collect::<Vec<_>>())
                .unwrap_or_default(),
        }))
    }

    pub async fn recent(&self) -> Result<Value, AdapterError> {
        let body = self
            .get(&format!("/me/player/recently-played?limit={}", RECENT_LIMIT))
            .await?;
        Ok(body.get("items").cloned().unwrap_or_else(|| json!([])))
    }
}

impl Configurable for SpotifyClient {
    fn service_name(&self) -> &str {
        services::MUSIC
    }

    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn requires_interactive_auth(&self) -> bool {
        true
    }
}

#[async_trait]
impl LiveReadable for SpotifyClient {
    fn keys(&self) -> Vec<String> {
        vec![KEY_PLAYBACK.to_string(), KEY_RECENT.to_string()]
    }

    async fn read_live(&self, key: &str) -> Result<Value, AdapterError> {
        match key {
            KEY_PLAYBACK => self.playback().await,
            KEY_RECENT => self.recent().await,
            other => Err(AdapterError::NoData(format!("music has no key {}", other))),
        }
    }
}

#[async_trait]
impl SnapshotCapturable for SpotifyClient {
    async fn capture_live(&self) -> Result<Vec<(String, Value)>, AdapterError> {
        let (playback, recent) = tokio::try_join!(self.playback(), self.recent())?;
        Ok(vec![(KEY_PLAYBACK.to_string(), playback), (KEY_RECENT.to_string(), recent)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::http::StatusCode;
    use axum::{routing::get, Json, Router};

    async fn serve(router: Router) -> SpotifyClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let config = SpotifyConfig {
            access_token: Some("token".into()),
            base_url: Some(format!("http://{}/v1", addr)),
        };
        SpotifyClient::new(&config, Duration::from_secs(2))
    }

    #[test]
    fn test_requires_interactive_auth() {
        let client = SpotifyClient::new(&SpotifyConfig::default(), Duration::from_secs(1));
        assert!(client.requires_interactive_auth());
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn test_no_active_device_is_not_playing() {
        let client = serve(Router::new().route("/v1/me/player", get(|| async { StatusCode::NO_CONTENT }))).await;
        assert_eq!(client.playback().await.unwrap(), json!({"isPlaying": false}));
    }

    #[tokio::test]
    async fn test_playback_is_flattened() {
        let client = serve(Router::new().route(
            "/v1/me/player",
            get(|| async {
                Json(json!({
                    "is_playing": true,
                    "progress_ms": 1200,
                    "device": {"name": "Kitchen"},
                    "item": {"name": "Song", "artists": [{"name": "A"}, {"name": "B"}]}
                }))
            }),
        ))
        .await;

        let playback = client.playback().await.unwrap();
        assert_eq!(playback["track"], "Song");
        assert_eq!(playback["artists"], json!(["A", "B"]));
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let client = serve(Router::new().route("/v1/me/player", get(|| async { StatusCode::UNAUTHORIZED }))).await;
        assert_eq!(client.playback().await.unwrap_err().kind(), ErrorKind::Unauthorized);
    }
}
