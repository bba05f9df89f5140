//! OpenAPI description of the service
//!
//! Generated with utoipa from the handler annotations. The per-type listing
//! routes are closures over [`ResourceType`], so [`LegacyListings`] adds
//! their entries.

use axum::{routing::get, Json, Router};
use lrmeta_common::ResourceType;
use utoipa::openapi::path::{HttpMethod, OperationBuilder, PathItem};
use utoipa::openapi::{Deprecated, ResponseBuilder};
use utoipa::{Modify, OpenApi};

use super::{citation, health, ids, renew, resources, schema};
use crate::error::{ErrorBody, ErrorDetail};
use crate::tasks::{JobState, JobStatus};
use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Language resource metadata API",
        description = "Metadata of the language resources: corpora, lexicons, models, \
                       analyses, utilities and collections."
    ),
    tags(
        (name = "Metadata retrieval", description = "Resource documents, listings, IDs and citations"),
        (name = "Cache management", description = "Background renewal of the normalized metadata"),
        (name = "MISC", description = "Schema, ID availability and health")
    ),
    paths(
        resources::list_resources,
        ids::list_ids,
        ids::check_id_availability,
        citation::get_bibtex,
        schema::get_schema,
        renew::renew_cache,
        renew::renew_cache_webhook,
        renew::renewal_status,
        health::health_check,
    ),
    components(schemas(
        ErrorBody,
        ErrorDetail,
        renew::RenewResponse,
        renew::PushPayload,
        renew::PushCommit,
        JobStatus,
        JobState,
        health::HealthResponse,
    )),
    modifiers(&LegacyListings)
)]
pub struct ApiDoc;

/// Deprecated `/corpora`, `/lexicons`, ... listings
pub struct LegacyListings;

impl Modify for LegacyListings {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        for resource_type in ResourceType::ALL {
            let operation = OperationBuilder::new()
                .tag("Metadata retrieval")
                .summary(Some(format!("List {}", resource_type.legacy_name())))
                .description(Some(format!(
                    "Please use /?resource-type={} instead.",
                    resource_type
                )))
                .deprecated(Some(Deprecated::True))
                .response(
                    "200",
                    ResponseBuilder::new()
                        .description("`{resource_type, hits, resources}` listing")
                        .build(),
                )
                .build();
            openapi.paths.paths.insert(
                format!("/{}", resource_type.legacy_name()),
                PathItem::new(HttpMethod::Get, operation),
            );
        }
    }
}

/// GET /openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build documentation routes; `/doc` is the older alias
pub fn doc_routes() -> Router<AppState> {
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/doc", get(openapi_json))
}
