//! Operator HTTP surface
//!
//! - `GET  /health`              probe the local indicators (TTL-bounded), report mode
//! - `GET  /sync-status`         readiness and last sweep, no side effects
//! - `POST /sync`                run a sweep now (local mode only)
//! - `GET  /mode`                mode summary for the UI
//! - `GET  /data/:service/:key`  adapter read, live or cached

mod error;
mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::{ApiError, ApiResult};
pub use handlers::SyncRequestBody;

use crate::runtime::HearthRuntime;

pub type AppState = Arc<HearthRuntime>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/sync-status", get(handlers::sync_status))
        .route("/sync", post(handlers::trigger_sync))
        .route("/mode", get(handlers::mode))
        .route("/data/:service/:key", get(handlers::read_data))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
