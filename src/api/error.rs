//! JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::error::HearthError;

/// Wraps [`HearthError`] so handlers can use `?`
#[derive(Debug)]
pub struct ApiError(pub HearthError);

impl<E: Into<HearthError>> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.0.is_expected() {
            tracing::debug!("Request rejected ({}): {}", status, self.0);
        } else if status.is_server_error() {
            tracing::error!("Request failed ({}): {}", status, self.0);
        } else {
            tracing::warn!("Request failed ({}): {}", status, self.0);
        }

        let kind = self.0.kind();
        let mut body = json!({
            "error": kind.as_str(),
            "kind": kind,
            "message": self.0.to_string(),
        });
        if let HearthError::Guard(guard) = &self.0 {
            body["operation"] = json!(guard.operation);
            body["readOnly"] = json!(true);
        }

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
