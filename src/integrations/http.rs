//! Shared HTTP plumbing for live clients

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;

use crate::error::AdapterError;

/// Map a transport failure onto the adapter taxonomy
pub fn classify_transport(service: &str, error: &reqwest::Error, timeout: Duration) -> AdapterError {
    if error.is_timeout() {
        AdapterError::timeout(service, timeout)
    } else if error.is_connect() {
        AdapterError::Unreachable(format!("{}: connection failed: {}", service, error))
    } else if error.is_decode() {
        AdapterError::Unknown(format!("{}: malformed response: {}", service, error))
    } else {
        AdapterError::Unreachable(format!("{}: {}", service, error))
    }
}

/// Map a non-success status onto the adapter taxonomy
pub fn classify_status(service: &str, status: StatusCode, body: &str) -> AdapterError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AdapterError::Unauthorized(format!("{}: {}", service, status))
        }
        StatusCode::NOT_FOUND => AdapterError::NoData(format!("{}: {}", service, status)),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            AdapterError::Unreachable(format!("{}: {}", service, status))
        }
        s => AdapterError::Unknown(format!("{}: status {}: {}", service, s, truncate(body, 200))),
    }
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Send a request and decode its JSON body. `204 No Content` yields `Value::Null`.
pub async fn send_json(service: &str, request: RequestBuilder, timeout: Duration) -> Result<Value, AdapterError> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| classify_transport(service, &e, timeout))?;

    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(service, status, &body));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| classify_transport(service, &e, timeout))
}
