//! Published JSON schema, read from disk on every request

use axum::{extract::State, routing::get, Json, Router};
use lrmeta_ingest::schema::{adapt_schema, load_schema};
use serde_json::Value;
use tracing::warn;

use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::AppState;

/// GET /schema
///
/// The source schema adapted to normalized documents; the copy published by
/// the last renewal is served when the metadata checkout is unavailable.
#[utoipa::path(
    get,
    path = "/schema",
    tag = "MISC",
    responses(
        (status = 200, description = "JSON schema of the resource documents", body = Value),
        (status = 500, description = "No schema available", body = ErrorBody),
    )
)]
pub async fn get_schema(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    match load_schema(&state.config.schema_path()) {
        Ok(schema) => Ok(Json(adapt_schema(schema))),
        Err(e) => {
            warn!("Serving published schema: {}", e);
            load_schema(&state.cache.layout().schema())
                .map(Json)
                .map_err(|_| ApiError::Internal("JSON schema is not available".to_string()))
        }
    }
}

pub fn schema_routes() -> Router<AppState> {
    Router::new().route("/schema", get(get_schema))
}
