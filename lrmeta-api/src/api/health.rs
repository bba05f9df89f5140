//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Module name ("lrmeta-api")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// `git describe` output at build time
    pub git_revision: String,
    pub uptime_seconds: u64,
    /// "memory" or "disk" (no-cache mode)
    pub cache_mode: String,
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    tag = "MISC",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "lrmeta-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_revision: env!("LRMETA_GIT_REVISION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        cache_mode: if state.cache.is_disk_mode() { "disk" } else { "memory" }.to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
