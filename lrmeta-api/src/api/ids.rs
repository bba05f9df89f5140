//! Resource ID listing and availability

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use lrmeta_common::CacheKey;
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::IntoParams;

use super::ApiQuery;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    /// Candidate resource ID
    pub id: Option<String>,
}

async fn published_ids(state: &AppState) -> ApiResult<Vec<String>> {
    let ids = state.cache.get(&CacheKey::ResourceIds).await?;
    Ok(ids
        .as_deref()
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

/// GET /list-ids
#[utoipa::path(
    get,
    path = "/list-ids",
    tag = "Metadata retrieval",
    responses((status = 200, description = "Sorted IDs of every published resource", body = [String]))
)]
pub async fn list_ids(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(published_ids(&state).await?))
}

/// GET /check-id-availability?id=X
///
/// Exact, case-sensitive match against the published ID list.
#[utoipa::path(
    get,
    path = "/check-id-availability",
    tag = "MISC",
    params(AvailabilityQuery),
    responses((status = 200, description = "`{id, available}`, or `{id: null, error}` without an ID", body = Value))
)]
pub async fn check_id_availability(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> ApiResult<Json<Value>> {
    let Some(id) = query.id.filter(|id| !id.is_empty()) else {
        return Ok(Json(json!({"id": null, "error": "No ID provided"})));
    };
    let taken = published_ids(&state).await?.contains(&id);
    Ok(Json(json!({"id": id, "available": !taken})))
}

pub fn id_routes() -> Router<AppState> {
    Router::new()
        .route("/list-ids", get(list_ids))
        .route("/check-id-availability", get(check_id_availability))
}
