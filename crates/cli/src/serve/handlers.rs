//! HTTP route handlers: one per workflow operation.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use shelter_adoption::{
    CompleteFollowUpRequest, CreateAdoptionRequest, CreateApplicationRequest, ErrorKind,
    ListAdoptionsRequest, ListApplicationsRequest, WorkflowError,
};
use shelter_core::{
    ActorId, AdoptionApplication, AdoptionPatch, AdoptionRecord, ApplicationPatch,
};
use shelter_storage::{AdoptionStatistics, Page};

use super::json_error;
use super::state::AppState;

/// Header carrying the id of the acting user on mutating requests.
pub(crate) const ACTOR_HEADER: &str = "x-actor-id";

/// Look-ahead window for `GET /adoptions/follow-ups` without `days`.
const DEFAULT_FOLLOW_UP_DAYS: i64 = 7;

// ── Errors ───────────────────────────────────────────────────────────────────

pub(crate) enum ApiError {
    Workflow(WorkflowError),
    /// The request could not be decoded.
    Rejected(StatusCode, String),
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        ApiError::Workflow(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Workflow(e) => {
                let status = match e.kind() {
                    ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(error = %e, "request failed");
                }
                json_error(status, &e.to_string()).into_response()
            }
            ApiError::Rejected(status, message) => json_error(status, &message).into_response(),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── Actor header ─────────────────────────────────────────────────────────────

/// The acting user, taken from the `X-Actor-Id` header.
pub(crate) struct Actor(pub(crate) ActorId);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                json_error(StatusCode::BAD_REQUEST, "missing X-Actor-Id header").into_response()
            })?;
        ActorId::parse(raw)
            .map(Actor)
            .map_err(|e| json_error(StatusCode::BAD_REQUEST, &e.to_string()).into_response())
    }
}

// ── Service ──────────────────────────────────────────────────────────────────

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

// ── Applications ─────────────────────────────────────────────────────────────

/// POST /applications
pub(crate) async fn handle_create_application(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    payload: Result<Json<CreateApplicationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AdoptionApplication>)> {
    let Json(req) = payload?;
    let application = state.workflow.create_application(req, actor).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /applications
pub(crate) async fn handle_list_applications(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListApplicationsRequest>, QueryRejection>,
) -> ApiResult<Json<Page<AdoptionApplication>>> {
    let Query(req) = query?;
    Ok(Json(state.workflow.list_applications(&req).await?))
}

/// GET /applications/pending
pub(crate) async fn handle_pending_applications(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<AdoptionApplication>>> {
    Ok(Json(state.workflow.pending_applications().await?))
}

/// GET /applications/{id}
pub(crate) async fn handle_get_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<AdoptionApplication>> {
    Ok(Json(state.workflow.get_application(&id).await?))
}

/// PATCH /applications/{id}
pub(crate) async fn handle_update_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    payload: Result<Json<ApplicationPatch>, JsonRejection>,
) -> ApiResult<Json<AdoptionApplication>> {
    let Json(patch) = payload?;
    Ok(Json(
        state.workflow.update_application(&id, patch, actor).await?,
    ))
}

/// DELETE /applications/{id}
pub(crate) async fn handle_delete_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> ApiResult<StatusCode> {
    state.workflow.delete_application(&id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /applications/{id}/adoption
pub(crate) async fn handle_adoption_by_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<AdoptionRecord>> {
    Ok(Json(state.workflow.adoption_by_application(&id).await?))
}

/// GET /animals/{id}/applications
pub(crate) async fn handle_applications_by_animal(
    State(state): State<Arc<AppState>>,
    Path(animal_id): Path<String>,
) -> ApiResult<Json<Vec<AdoptionApplication>>> {
    Ok(Json(state.workflow.applications_by_animal(&animal_id).await?))
}

/// GET /animals/{id}/adoption
pub(crate) async fn handle_adoption_by_animal(
    State(state): State<Arc<AppState>>,
    Path(animal_id): Path<String>,
) -> ApiResult<Json<AdoptionRecord>> {
    Ok(Json(state.workflow.adoption_by_animal(&animal_id).await?))
}

// ── Adoptions ────────────────────────────────────────────────────────────────

/// POST /adoptions
pub(crate) async fn handle_create_adoption(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    payload: Result<Json<CreateAdoptionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AdoptionRecord>)> {
    let Json(req) = payload?;
    let record = state.workflow.create_adoption(req, actor).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /adoptions
pub(crate) async fn handle_list_adoptions(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListAdoptionsRequest>, QueryRejection>,
) -> ApiResult<Json<Page<AdoptionRecord>>> {
    let Query(req) = query?;
    Ok(Json(state.workflow.list_adoptions(&req).await?))
}

/// GET /adoptions/{id}
pub(crate) async fn handle_get_adoption(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<AdoptionRecord>> {
    Ok(Json(state.workflow.get_adoption(&id).await?))
}

/// PATCH /adoptions/{id}
pub(crate) async fn handle_update_adoption(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    payload: Result<Json<AdoptionPatch>, JsonRejection>,
) -> ApiResult<Json<AdoptionRecord>> {
    let Json(patch) = payload?;
    Ok(Json(state.workflow.update_adoption(&id, patch, actor).await?))
}

/// DELETE /adoptions/{id}
pub(crate) async fn handle_delete_adoption(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> ApiResult<StatusCode> {
    state.workflow.delete_adoption(&id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /adoptions/{id}/follow-ups/complete
pub(crate) async fn handle_complete_follow_up(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    payload: Result<Json<CompleteFollowUpRequest>, JsonRejection>,
) -> ApiResult<Json<AdoptionRecord>> {
    let Json(req) = payload?;
    Ok(Json(
        state.workflow.complete_follow_up(&id, req, actor).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct FollowUpQuery {
    days: Option<i64>,
}

/// GET /adoptions/follow-ups?days=N
pub(crate) async fn handle_pending_follow_ups(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FollowUpQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<AdoptionRecord>>> {
    let Query(q) = query?;
    let days = q.days.unwrap_or(DEFAULT_FOLLOW_UP_DAYS);
    Ok(Json(state.workflow.pending_follow_ups(days).await?))
}

/// GET /adoptions/statistics
pub(crate) async fn handle_adoption_statistics(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<AdoptionStatistics>> {
    Ok(Json(state.workflow.adoption_statistics().await?))
}
