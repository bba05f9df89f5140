//! HTTP API handlers for lrmeta-api
//!
//! JSON only; errors use the [`crate::ApiError`] body.

pub mod citation;
pub mod docs;
pub mod extract;
pub mod health;
pub mod ids;
pub mod renew;
pub mod resources;
pub mod schema;

pub use citation::citation_routes;
pub use docs::doc_routes;
pub use extract::ApiQuery;
pub use health::health_routes;
pub use ids::id_routes;
pub use renew::renew_routes;
pub use resources::resource_routes;
pub use schema::schema_routes;

use crate::error::{ApiError, ApiResult};
use lrmeta_common::config::parse_flag;

/// Interpret an optional boolean query parameter
pub(crate) fn flag(name: &str, value: Option<&str>, default: bool) -> ApiResult<bool> {
    match value {
        None => Ok(default),
        Some(raw) => parse_flag(raw).ok_or_else(|| {
            ApiError::BadRequest(format!("Invalid value '{}' for '{}', expected true or false", raw, name))
        }),
    }
}
