//! lrmeta-api library interface
//!
//! Serves the normalized metadata over HTTP from an in-process cache and runs
//! cache renewals in the background. Exposed as a library for integration
//! testing.

pub mod api;
pub mod cache;
pub mod citation;
pub mod error;
pub mod notify;
pub mod tasks;

pub use crate::cache::MetadataCache;
pub use crate::error::{ApiError, ApiResult};
pub use crate::notify::Notifier;
pub use crate::tasks::{renewal_queue, RenewalRequest, RenewalRunner, RenewalWorker};

use axum::Router;
use chrono::{DateTime, Utc};
use lrmeta_common::config::TomlConfig;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Published documents, read by every handler
    pub cache: Arc<MetadataCache>,
    /// Submits renewals to the background worker
    pub runner: RenewalRunner,
    /// Chat-ops channel for webhook problems
    pub notifier: Notifier,
    pub config: Arc<TomlConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Arc<TomlConfig>,
        cache: Arc<MetadataCache>,
        runner: RenewalRunner,
        notifier: Notifier,
    ) -> Self {
        Self {
            cache,
            runner,
            notifier,
            config,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::resource_routes())
        .merge(api::id_routes())
        .merge(api::citation_routes())
        .merge(api::schema_routes())
        .merge(api::doc_routes())
        .merge(api::renew_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
