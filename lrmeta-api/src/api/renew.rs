//! Cache renewal triggers and job status
//!
//! `GET /renew-cache` renews the whole store or the given `resource-paths`.
//! `POST /renew-cache` takes a GitHub push webhook payload and renews the
//! records whose YAML files the push touched.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use lrmeta_common::{ResourcePath, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{flag, ApiQuery};
use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::tasks::{JobStatus, RenewalRequest};
use crate::AppState;

/// Only pushes to this ref trigger a renewal
pub const MAIN_REF: &str = "refs/heads/main";

/// Query parameters shared by both renewal triggers
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RenewQuery {
    /// Comma-separated `<resource_type>/<resource_id>` list; ignored by POST
    #[serde(rename = "resource-paths")]
    pub resource_paths: Option<String>,
    /// Log debug info while parsing YAML files
    #[param(value_type = Option<bool>)]
    pub debug: Option<String>,
    /// Skip getting file info for downloadables
    #[param(value_type = Option<bool>)]
    pub offline: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RenewResponse {
    /// `null` when the trigger did not queue anything
    pub task_id: Option<Uuid>,
    pub message: String,
}

/// GitHub push event, reduced to what selects the renewal scope
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PushPayload {
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PushCommit {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

/// What a push asks for
#[derive(Debug, PartialEq, Eq)]
pub enum PushScope {
    /// Not a push to main
    Ignored,
    /// Too many files changed for the list to be complete
    Full,
    Paths(Vec<ResourcePath>),
}

/// Derive the renewal scope from a push
///
/// GitHub truncates the changed-file lists of large pushes, so anything over
/// `file_limit` files renews the whole store.
pub fn push_scope(payload: &PushPayload, file_limit: usize) -> ApiResult<PushScope> {
    if payload.git_ref != MAIN_REF {
        return Ok(PushScope::Ignored);
    }
    if payload.commits.is_empty() {
        return Err(ApiError::BadRequest("No commits detected in payload".to_string()));
    }

    let changed: Vec<&str> = payload
        .commits
        .iter()
        .flat_map(|c| c.added.iter().chain(&c.modified).chain(&c.removed))
        .map(String::as_str)
        .collect();
    if changed.len() > file_limit {
        return Ok(PushScope::Full);
    }

    let paths: BTreeSet<ResourcePath> = changed.into_iter().filter_map(record_path).collect();
    Ok(PushScope::Paths(paths.into_iter().collect()))
}

/// `yaml/<type>/<id>.yaml` to `<type>/<id>`; other files are not records
fn record_path(file: &str) -> Option<ResourcePath> {
    let mut parts = file.split('/');
    let (Some("yaml"), Some(type_dir), Some(name), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let id = name.strip_suffix(".yaml")?;
    let resource_type = ResourceType::ALL
        .into_iter()
        .find(|t| t.as_str() == type_dir)?;
    format!("{}/{}", resource_type, id).parse().ok()
}

async fn queue(state: &AppState, request: RenewalRequest) -> ApiResult<(StatusCode, Json<RenewResponse>)> {
    let task_id = state.runner.submit(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RenewResponse {
            task_id: Some(task_id),
            message: "Cache renewal triggered in background.".to_string(),
        }),
    ))
}

fn nothing_to_do(message: &str) -> (StatusCode, Json<RenewResponse>) {
    info!("{}", message);
    (
        StatusCode::OK,
        Json(RenewResponse {
            task_id: None,
            message: message.to_string(),
        }),
    )
}

/// GET /renew-cache
#[utoipa::path(
    get,
    path = "/renew-cache",
    tag = "Cache management",
    params(RenewQuery),
    responses(
        (status = 202, description = "Renewal queued", body = RenewResponse),
        (status = 400, description = "Invalid resource path or flag", body = ErrorBody),
        (status = 409, description = "Renewal queue is full", body = ErrorBody),
    )
)]
pub async fn renew_cache(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RenewQuery>,
) -> ApiResult<(StatusCode, Json<RenewResponse>)> {
    let scope = match query.resource_paths.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(list) => Some(ResourcePath::parse_list(list)?).filter(|paths| !paths.is_empty()),
    };
    let request = RenewalRequest {
        scope,
        debug: flag("debug", query.debug.as_deref(), false)?,
        offline: flag("offline", query.offline.as_deref(), false)?,
    };
    queue(&state, request).await
}

/// POST /renew-cache
///
/// An empty body renews the whole store.
#[utoipa::path(
    post,
    path = "/renew-cache",
    tag = "Cache management",
    params(RenewQuery),
    request_body(content = PushPayload, description = "GitHub push event; an empty body renews the whole store"),
    responses(
        (status = 200, description = "Nothing to do", body = RenewResponse),
        (status = 202, description = "Renewal queued", body = RenewResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "Renewal queue is full", body = ErrorBody),
    )
)]
pub async fn renew_cache_webhook(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RenewQuery>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<RenewResponse>)> {
    let debug = flag("debug", query.debug.as_deref(), false)?;
    let offline = flag("offline", query.offline.as_deref(), false)?;

    let scope = if body.iter().all(u8::is_ascii_whitespace) {
        PushScope::Full
    } else {
        let parsed = serde_json::from_slice::<PushPayload>(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {}", e)))
            .and_then(|payload| push_scope(&payload, state.config.github_file_limit));
        match parsed {
            Ok(scope) => scope,
            Err(e) => {
                warn!("Rejected webhook payload: {}", e);
                let notifier = state.notifier.clone();
                let text = format!("Cache renewal webhook rejected: {}", e);
                tokio::spawn(async move { notifier.send(&text).await });
                return Err(e);
            }
        }
    };
    debug!(scope = ?scope, "Webhook renewal scope");

    let scope = match scope {
        PushScope::Ignored => {
            return Ok(nothing_to_do(
                "GitHub webhook triggered, but not on main branch. Nothing to do.",
            ))
        }
        PushScope::Paths(paths) if paths.is_empty() => {
            return Ok(nothing_to_do("No resource metadata files changed. Nothing to do."))
        }
        PushScope::Full => None,
        PushScope::Paths(paths) => Some(paths),
    };
    queue(&state, RenewalRequest { scope, debug, offline }).await
}

/// GET /renew-cache/status/:task_id
#[utoipa::path(
    get,
    path = "/renew-cache/status/{task_id}",
    tag = "Cache management",
    params(("task_id" = Uuid, Path, description = "ID returned by the renewal trigger")),
    responses(
        (status = 200, description = "Job status record", body = JobStatus),
        (status = 400, description = "Malformed task ID", body = ErrorBody),
        (status = 404, description = "Unknown or expired task", body = ErrorBody),
    )
)]
pub async fn renewal_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<JobStatus>> {
    let task_id = Uuid::parse_str(&task_id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid task ID: {}", task_id)))?;
    state
        .runner
        .status(task_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Renewal task not found: {}", task_id)))
}

pub fn renew_routes() -> Router<AppState> {
    Router::new()
        .route("/renew-cache", get(renew_cache).post(renew_cache_webhook))
        .route("/renew-cache/status/:task_id", get(renewal_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(git_ref: &str, files: &[&str]) -> PushPayload {
        PushPayload {
            git_ref: git_ref.to_string(),
            commits: vec![PushCommit {
                modified: files.iter().map(|f| f.to_string()).collect(),
                ..PushCommit::default()
            }],
        }
    }

    #[test]
    fn test_only_main_branch_triggers() {
        let payload = push("refs/heads/feature", &["yaml/corpus/attasidor.yaml"]);
        assert_eq!(push_scope(&payload, 3000).unwrap(), PushScope::Ignored);
    }

    #[test]
    fn test_no_commits_is_rejected() {
        let payload = PushPayload {
            git_ref: MAIN_REF.to_string(),
            commits: Vec::new(),
        };
        assert!(matches!(push_scope(&payload, 3000), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_changed_files_become_scope() {
        let mut payload = push(
            MAIN_REF,
            &[
                "yaml/corpus/attasidor.yaml",
                "yaml/lexicon/saldo.yaml",
                "README.md",
                "yaml/corpora/old-layout.yaml",
                "schema/metadata.json",
            ],
        );
        payload.commits.push(PushCommit {
            removed: vec!["yaml/corpus/attasidor.yaml".to_string()],
            ..PushCommit::default()
        });

        let PushScope::Paths(paths) = push_scope(&payload, 3000).unwrap() else {
            panic!("expected paths");
        };
        let paths: Vec<String> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(paths, vec!["corpus/attasidor", "lexicon/saldo"]);
    }

    #[test]
    fn test_file_limit_forces_full_renewal() {
        let payload = push(MAIN_REF, &["yaml/corpus/a.yaml", "yaml/corpus/b.yaml"]);
        assert_eq!(push_scope(&payload, 1).unwrap(), PushScope::Full);
    }
}
