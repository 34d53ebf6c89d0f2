//! Lighting bridge client
//!
//! The bridge speaks plain HTTP on the home network at
//! `http://<bridge>/api/<username>/...`. It reports authentication problems
//! with a `200 OK` carrying an error envelope rather than a 401.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::http::send_json;
use crate::adapters::{Configurable, LiveReadable, SnapshotCapturable};
use crate::error::AdapterError;
use crate::types::{services, HueConfig};

pub const KEY_LIGHTS: &str = "lighting.lights";
pub const KEY_GROUPS: &str = "lighting.groups";
pub const KEY_SCENES: &str = "lighting.scenes";
pub const KEY_ALL_STATUS: &str = "lighting.all-status";

/// Bridge error type for "unauthorized user"
const HUE_ERROR_UNAUTHORIZED: u64 = 1;

pub struct HueBridgeClient {
    client: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl HueBridgeClient {
    pub fn new(config: &HueConfig, timeout: Duration) -> Self {
        let base_url = match (&config.bridge_ip, &config.username) {
            (Some(ip), Some(user)) => Some(format!("http://{}/api/{}", ip, user)),
            _ => None,
        };
        Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }

    /// Point at an arbitrary base URL (`.../api/<username>`)
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Some(base_url.into()),
            timeout,
        }
    }

    async fn get(&self, resource: &str) -> Result<Value, AdapterError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| AdapterError::NotConfigured(services::LIGHTING.to_string()))?;
        let url = format!("{}/{}", base, resource);
        let body = send_json(services::LIGHTING, self.client.get(&url), self.timeout).await?;
        check_envelope(body)
    }

    pub async fn lights(&self) -> Result<Value, AdapterError> {
        self.get("lights").await
    }

    /// Rooms and zones as an array, each with its bridge id
    pub async fn groups(&self) -> Result<Value, AdapterError> {
        let groups = self.get("groups").await?;
        Ok(rooms_and_zones(&groups))
    }

    pub async fn scenes(&self) -> Result<Value, AdapterError> {
        let scenes = self.get("scenes").await?;
        Ok(with_ids(&scenes, |_| true))
    }

    pub async fn all_status(&self) -> Result<Value, AdapterError> {
        let lights = self.lights().await?;
        Ok(summarize_lights(&lights))
    }
}

impl Configurable for HueBridgeClient {
    fn service_name(&self) -> &str {
        services::LIGHTING
    }

    fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

#[async_trait]
impl LiveReadable for HueBridgeClient {
    fn keys(&self) -> Vec<String> {
        [KEY_LIGHTS, KEY_GROUPS, KEY_SCENES, KEY_ALL_STATUS]
            .iter()
            .map(|k| k.to_string())
            .collect()
    }

    async fn read_live(&self, key: &str) -> Result<Value, AdapterError> {
        match key {
            KEY_LIGHTS => self.lights().await,
            KEY_GROUPS => self.groups().await,
            KEY_SCENES => self.scenes().await,
            KEY_ALL_STATUS => self.all_status().await,
            other => Err(AdapterError::NoData(format!("lighting has no key {}", other))),
        }
    }
}

#[async_trait]
impl SnapshotCapturable for HueBridgeClient {
    async fn capture_live(&self) -> Result<Vec<(String, Value)>, AdapterError> {
        let (lights, groups, scenes) = tokio::try_join!(self.lights(), self.groups(), self.scenes())?;
        let status = summarize_lights(&lights);

        Ok(vec![
            (KEY_LIGHTS.to_string(), lights),
            (KEY_GROUPS.to_string(), groups),
            (KEY_SCENES.to_string(), scenes),
            (KEY_ALL_STATUS.to_string(), status),
        ])
    }
}

/// Turn a bridge error envelope into an [`AdapterError`]
pub fn check_envelope(body: Value) -> Result<Value, AdapterError> {
    let error = body
        .as_array()
        .and_then(|items| items.first())
        .and_then(|first| first.get("error"));

    let Some(error) = error else {
        return Ok(body);
    };

    let description = error
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("bridge error")
        .to_string();
    match error.get("type").and_then(Value::as_u64) {
        Some(HUE_ERROR_UNAUTHORIZED) => Err(AdapterError::Unauthorized(format!("lighting: {}", description))),
        _ => Err(AdapterError::Unknown(format!("lighting: {}", description))),
    }
}

fn with_ids(objects: &Value, keep: impl Fn(&Map<String, Value>) -> bool) -> Value {
    let Some(map) = objects.as_object() else {
        return Value::Array(Vec::new());
    };

    let items = map
        .iter()
        .filter_map(|(id, value)| {
            let mut entry = value.as_object()?.clone();
            if !keep(&entry) {
                return None;
            }
            entry.insert("id".to_string(), Value::String(id.clone()));
            Some(Value::Object(entry))
        })
        .collect();
    Value::Array(items)
}

fn rooms_and_zones(groups: &Value) -> Value {
    with_ids(groups, |group| {
        matches!(group.get("type").and_then(Value::as_str), Some("Room") | Some("Zone"))
    })
}

/// Aggregate on/off and brightness across all lights
pub fn summarize_lights(lights: &Value) -> Value {
    let states: Vec<&Value> = lights
        .as_object()
        .map(|m| m.values().filter_map(|l| l.get("state")).collect())
        .unwrap_or_default();

    let on: Vec<&Value> = states
        .iter()
        .copied()
        .filter(|s| s.get("on").and_then(Value::as_bool).unwrap_or(false))
        .collect();

    let average_brightness = if on.is_empty() {
        0
    } else {
        let total: u64 = on.iter().filter_map(|s| s.get("bri").and_then(Value::as_u64)).sum();
        (total as f64 / on.len() as f64).round() as u64
    };

    json!({
        "totalLights": states.len(),
        "lightsOn": on.len(),
        "anyOn": !on.is_empty(),
        "allOn": !states.is_empty() && on.len() == states.len(),
        "averageBrightness": average_brightness,
    })
}
