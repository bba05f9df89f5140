//! Metadata retrieval: aggregates, single resources and the legacy listings

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use lrmeta_common::{CacheKey, ResourceType};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use utoipa::IntoParams;

use super::{flag, ApiQuery};
use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::AppState;

/// Query parameters for `GET /`
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Resource type: corpus, lexicon, model, analysis, utility or collection
    #[serde(rename = "resource-type")]
    pub resource_type: Option<String>,
    /// Resource ID
    pub resource: Option<String>,
    /// Plural keys (`corpora`, `lexicons`, ...) when listing everything
    #[param(value_type = Option<bool>)]
    pub legacy: Option<String>,
}

/// GET /
///
/// One aggregate (`resource-type`), one resource (`resource`) or every
/// aggregate keyed by type.
#[utoipa::path(
    get,
    path = "/",
    tag = "Metadata retrieval",
    params(ListQuery),
    responses(
        (status = 200, description = "Resource metadata; see /schema for the document shape", body = Value),
        (status = 400, description = "Both 'resource' and 'resource-type' given, or an invalid parameter", body = ErrorBody),
        (status = 404, description = "Unknown resource", body = ErrorBody),
    )
)]
pub async fn list_resources(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Value>> {
    let resource_type = query.resource_type.as_deref().filter(|s| !s.is_empty());
    let resource = query.resource.as_deref().filter(|s| !s.is_empty());

    match (resource_type, resource) {
        (Some(_), Some(_)) => Err(ApiError::BadRequest(
            "Specify either 'resource' or 'resource-type', not both.".to_string(),
        )),
        (Some(name), None) => {
            let resource_type: ResourceType = name.parse()?;
            Ok(Json(aggregate(&state, resource_type).await?))
        }
        (None, Some(id)) => Ok(Json(single_resource(&state, id).await?)),
        (None, None) => {
            let legacy = flag("legacy", query.legacy.as_deref(), true)?;
            let mut all = Map::new();
            for resource_type in ResourceType::ALL {
                let key = if legacy {
                    resource_type.legacy_name()
                } else {
                    resource_type.as_str()
                };
                let listing = aggregate(&state, resource_type).await?;
                all.insert(key.to_string(), listing["resources"].clone());
            }
            Ok(Json(Value::Object(all)))
        }
    }
}

/// `{resource_type, hits, resources}` of one type, empty before the first renewal
async fn aggregate(state: &AppState, resource_type: ResourceType) -> ApiResult<Value> {
    let cached = state
        .cache
        .get(&CacheKey::Aggregate(resource_type))
        .await?;
    Ok(match cached {
        Some(value) => (*value).clone(),
        None => json!({
            "resource_type": resource_type.as_str(),
            "hits": 0,
            "resources": [],
        }),
    })
}

/// One resource document with its long description attached
pub(crate) async fn single_resource(state: &AppState, id: &str) -> ApiResult<Value> {
    let Some(document) = state
        .cache
        .get(&CacheKey::Resource(id.to_string()))
        .await?
    else {
        debug!(resource = %id, "Unknown resource requested");
        return Err(ApiError::NotFound(format!("Resource '{}' not found", id)));
    };

    let mut document = (*document).clone();
    let description = state
        .cache
        .get(&CacheKey::Description(id.to_string()))
        .await?;
    if let (Some(description), Value::Object(fields)) = (description, &mut document) {
        if description.as_object().is_some_and(|d| !d.is_empty()) {
            fields.insert("description".to_string(), (*description).clone());
        }
    }
    Ok(document)
}

async fn legacy_listing(state: AppState, resource_type: ResourceType) -> ApiResult<Json<Value>> {
    let mut listing = aggregate(&state, resource_type).await?;
    if let Value::Object(fields) = &mut listing {
        if resource_type == ResourceType::Collection {
            fields.remove("resource_type");
        } else {
            fields.insert(
                "resource_type".to_string(),
                json!(resource_type.legacy_name()),
            );
        }
    }
    Ok(Json(listing))
}

/// Build metadata retrieval routes
///
/// The per-type routes (`/corpora`, `/lexicons`, ...) are deprecated aliases
/// of `/?resource-type=<type>`.
pub fn resource_routes() -> Router<AppState> {
    let mut router = Router::new().route("/", get(list_resources));
    for resource_type in ResourceType::ALL {
        let path = format!("/{}", resource_type.legacy_name());
        router = router.route(
            &path,
            get(move |State(state): State<AppState>| legacy_listing(state, resource_type)),
        );
    }
    router
}
