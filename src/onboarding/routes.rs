//! REST endpoints for onboarding progress, profile edits and status.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::OnboardingError;

use super::access::{AccessPolicy, AllowAll};
use super::engine::OnboardingEngine;
use super::profile::ProfileUpdate;

/// Header carrying the id of the user making the request.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub engine: Arc<OnboardingEngine>,
    pub access: Arc<dyn AccessPolicy>,
}

impl OnboardingRouteState {
    pub fn new(engine: Arc<OnboardingEngine>) -> Self {
        Self {
            engine,
            access: Arc::new(AllowAll),
        }
    }

    pub fn with_access(mut self, access: Arc<dyn AccessPolicy>) -> Self {
        self.access = access;
        self
    }
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/statuses", get(list_statuses))
        .route(
            "/api/employees/{employee_id}/onboarding",
            post(initialize).delete(remove),
        )
        .route(
            "/api/employees/{employee_id}/onboarding-status",
            get(get_status),
        )
        .route(
            "/api/employees/{employee_id}/onboarding/steps/{step_id}/advance",
            post(advance_step),
        )
        .route("/api/employees/{employee_id}/profile", put(update_profile))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "hr-onboarding"
    }))
}

/// GET /api/onboarding/statuses
async fn list_statuses(State(state): State<OnboardingRouteState>) -> Response {
    match state.engine.list_statuses().await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/employees/{employee_id}/onboarding
///
/// Employee-created hook. Returns the initial status.
async fn initialize(
    State(state): State<OnboardingRouteState>,
    Path(employee_id): Path<String>,
) -> Response {
    let Some(employee_id) = parse_employee_id(&employee_id) else {
        return invalid_employee_id();
    };
    match state.engine.on_employee_created(employee_id).await {
        Ok(status) => (StatusCode::CREATED, Json(status)).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/employees/{employee_id}/onboarding
///
/// Employee-removed hook.
async fn remove(
    State(state): State<OnboardingRouteState>,
    Path(employee_id): Path<String>,
) -> Response {
    let Some(employee_id) = parse_employee_id(&employee_id) else {
        return invalid_employee_id();
    };
    match state.engine.on_employee_removed(employee_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/employees/{employee_id}/onboarding-status
async fn get_status(
    State(state): State<OnboardingRouteState>,
    Path(employee_id): Path<String>,
) -> Response {
    let Some(employee_id) = parse_employee_id(&employee_id) else {
        return invalid_employee_id();
    };
    match state.engine.status(employee_id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/employees/{employee_id}/onboarding/steps/{step_id}/advance
async fn advance_step(
    State(state): State<OnboardingRouteState>,
    Path((employee_id, step_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let Some(employee_id) = parse_employee_id(&employee_id) else {
        return invalid_employee_id();
    };
    let actor = headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Err(e) = state.access.authorize_step_advance(actor, employee_id) {
        return error_response(e);
    }

    match state.engine.advance(employee_id, &step_id).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /api/employees/{employee_id}/profile
async fn update_profile(
    State(state): State<OnboardingRouteState>,
    Path(employee_id): Path<String>,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Response {
    let Some(employee_id) = parse_employee_id(&employee_id) else {
        return invalid_employee_id();
    };
    let update = match body {
        Ok(Json(update)) => update,
        Err(rejection) => {
            warn!(%employee_id, error = %rejection.body_text(), "Rejected profile body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": rejection.body_text()})),
            )
                .into_response();
        }
    };
    match state.engine.update_profile(employee_id, &update).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(e),
    }
}

fn parse_employee_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn invalid_employee_id() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "Invalid employee ID"})),
    )
        .into_response()
}

fn status_code(err: &OnboardingError) -> StatusCode {
    match err {
        OnboardingError::UnknownStep { .. } | OnboardingError::NotInitialized { .. } => {
            StatusCode::NOT_FOUND
        }
        OnboardingError::AlreadyInitialized { .. } => StatusCode::CONFLICT,
        OnboardingError::NotAuthorized { .. } => StatusCode::FORBIDDEN,
        OnboardingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: OnboardingError) -> Response {
    let status = status_code(&err);
    if status.is_server_error() {
        error!(error = %err, "Onboarding request failed");
    } else {
        warn!(error = %err, "Onboarding request rejected");
    }
    (status, Json(json!({"error": err.to_string()}))).into_response()
}
