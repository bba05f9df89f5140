//! BibTeX citation endpoint

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::IntoParams;

use super::resources::single_resource;
use super::ApiQuery;
use crate::citation::bibtex;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BibtexQuery {
    /// Resource ID
    pub resource: Option<String>,
}

/// GET /bibtex?resource=X
///
/// Failures that concern the requested resource, including an unknown ID,
/// are reported as `{bibtex: null, error}` with status 200.
#[utoipa::path(
    get,
    path = "/bibtex",
    tag = "Metadata retrieval",
    params(BibtexQuery),
    responses((status = 200, description = "`{bibtex}` or `{bibtex: null, error}`", body = Value))
)]
pub async fn get_bibtex(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BibtexQuery>,
) -> ApiResult<Json<Value>> {
    let Some(id) = query.resource.filter(|id| !id.is_empty()) else {
        return Ok(Json(json!({
            "bibtex": null,
            "error": "No resource provided. Format: /bibtex?resource=<id>",
        })));
    };

    let document = match single_resource(&state, &id).await {
        Ok(document) => document,
        Err(ApiError::NotFound(_)) => {
            return Ok(Json(json!({
                "bibtex": null,
                "error": format!("Resource '{}' not found", id),
            })))
        }
        Err(e) => return Err(e),
    };
    Ok(Json(match bibtex(&document, &state.config.citation) {
        Ok(entry) => json!({ "bibtex": entry }),
        Err(e) => json!({ "bibtex": null, "error": e }),
    }))
}

pub fn citation_routes() -> Router<AppState> {
    Router::new().route("/bibtex", get(get_bibtex))
}
