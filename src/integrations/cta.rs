//! Transit prediction client (bus tracker API)
//!
//! A cloud API reachable from both roles. It still runs through the adapter
//! so public processes serve the snapshot instead of spending API quota.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::http::send_json;
use crate::adapters::{Configurable, LiveReadable, SnapshotCapturable};
use crate::error::AdapterError;
use crate::types::{services, CtaConfig};

pub const KEY_PREDICTIONS: &str = "transit.predictions";

const DEFAULT_BASE_URL: &str = "http://www.ctabustracker.com/bustime/api/v2";

/// The API accepts at most this many stop ids per request
const MAX_STOPS_PER_REQUEST: usize = 10;

pub struct CtaClient {
    client: reqwest::Client,
    config: CtaConfig,
    base_url: String,
    timeout: Duration,
}

impl CtaClient {
    pub fn new(config: CtaConfig, timeout: Duration) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            client: reqwest::Client::new(),
            config,
            base_url,
            timeout,
        }
    }

    /// Upcoming arrivals for every configured stop
    pub async fn predictions(&self) -> Result<Value, AdapterError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AdapterError::NotConfigured(services::TRANSIT.to_string()))?;

        let mut arrivals = Vec::new();
        for chunk in self.config.stop_ids.chunks(MAX_STOPS_PER_REQUEST) {
            let stops = chunk.join(",");
            let request = self
                .client
                .get(format!("{}/getpredictions", self.base_url))
                .query(&[("key", api_key), ("stpid", stops.as_str()), ("format", "json")]);
            let body = send_json(services::TRANSIT, request, self.timeout).await?;
            arrivals.extend(parse_predictions(&body)?);
        }

        Ok(json!({
            "stops": self.config.stop_ids,
            "predictions": arrivals,
        }))
    }
}

impl Configurable for CtaClient {
    fn service_name(&self) -> &str {
        services::TRANSIT
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}

#[async_trait]
impl LiveReadable for CtaClient {
    fn keys(&self) -> Vec<String> {
        vec![KEY_PREDICTIONS.to_string()]
    }

    async fn read_live(&self, key: &str) -> Result<Value, AdapterError> {
        match key {
            KEY_PREDICTIONS => self.predictions().await,
            other => Err(AdapterError::NoData(format!("transit has no key {}", other))),
        }
    }
}

#[async_trait]
impl SnapshotCapturable for CtaClient {
    async fn capture_live(&self) -> Result<Vec<(String, Value)>, AdapterError> {
        Ok(vec![(KEY_PREDICTIONS.to_string(), self.predictions().await?)])
    }
}

/// Pull the prediction list out of a `bustime-response` body.
///
/// "No arrival times" is an empty result, not a failure.
pub fn parse_predictions(body: &Value) -> Result<Vec<Value>, AdapterError> {
    let response = body
        .get("bustime-response")
        .ok_or_else(|| AdapterError::Unknown("transit: missing bustime-response".to_string()))?;

    if let Some(prd) = response.get("prd").and_then(Value::as_array) {
        return Ok(prd.clone());
    }

    let messages: Vec<&str> = response
        .get("error")
        .and_then(Value::as_array)
        .map(|errors| errors.iter().filter_map(|e| e.get("msg").and_then(Value::as_str)).collect())
        .unwrap_or_default();

    if messages.iter().all(|m| m.contains("No arrival times") || m.contains("No service")) {
        return Ok(Vec::new());
    }
    if messages.iter().any(|m| m.contains("Invalid API access key")) {
        return Err(AdapterError::Unauthorized(format!("transit: {}", messages.join("; "))));
    }
    Err(AdapterError::Unknown(format!("transit: {}", messages.join("; "))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_predictions_are_extracted() {
        let body = json!({"bustime-response": {"prd": [{"rt": "22", "prdctdn": "4"}]}});
        let prd = parse_predictions(&body).unwrap();
        assert_eq!(prd.len(), 1);
        assert_eq!(prd[0]["rt"], "22");
    }

    #[test]
    fn test_no_arrivals_is_empty_not_error() {
        let body = json!({"bustime-response": {"error": [{"stpid": "1", "msg": "No arrival times"}]}});
        assert!(parse_predictions(&body).unwrap().is_empty());
    }

    #[test]
    fn test_bad_key_is_unauthorized() {
        let body = json!({"bustime-response": {"error": [{"msg": "Invalid API access key supplied"}]}});
        assert_eq!(parse_predictions(&body).unwrap_err().kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_requires_key_and_stops() {
        let mut config = CtaConfig {
            api_key: Some("k".into()),
            ..Default::default()
        };
        assert!(!CtaClient::new(config.clone(), Duration::from_secs(1)).is_configured());
        config.stop_ids = vec!["1836".into()];
        assert!(CtaClient::new(config, Duration::from_secs(1)).is_configured());
    }
}
