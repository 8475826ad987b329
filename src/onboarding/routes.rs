//! REST endpoints for onboarding status, profile and intake submission.
//!
//! The participant identity comes from the `x-participant-id` header set by
//! the upstream auth proxy.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use super::model::{MentorForm, ParticipantId, RoleForm, StudentForm};
use super::registry::{ParticipantSession, SessionRegistry};
use super::roles::Role;
use super::session::CacheEntry;
use crate::error::{DatabaseError, OnboardingError};

pub const IDENTITY_HEADER: &str = "x-participant-id";

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub registry: Arc<SessionRegistry>,
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/status", get(get_status))
        .route("/api/profile", get(get_profile))
        .route("/api/onboarding/student", post(submit_student))
        .route("/api/onboarding/mentor", post(submit_mentor))
        .route("/api/session/refresh", post(refresh_session))
        .route("/api/session", delete(sign_out))
        .with_state(state)
}

/// CORS for the configured origins; `*` anywhere in the list allows any.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn participant(headers: &HeaderMap) -> Result<ParticipantId, Response> {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ParticipantId::new)
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "Missing participant identity"})),
            )
                .into_response()
        })
}

async fn open_session(
    state: &OnboardingRouteState,
    headers: &HeaderMap,
) -> Result<Arc<ParticipantSession>, Response> {
    let identity = participant(headers)?;
    state
        .registry
        .open(&identity)
        .await
        .map_err(|e| error_response(&e))
}

fn error_response(err: &OnboardingError) -> Response {
    let status = match err {
        OnboardingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OnboardingError::SubmissionInFlight | OnboardingError::Transition(_) => {
            StatusCode::CONFLICT
        }
        OnboardingError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        OnboardingError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        OnboardingError::Store(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
        OnboardingError::Store(_) => StatusCode::BAD_GATEWAY,
        OnboardingError::InconsistentState { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = match err {
        OnboardingError::Validation(errors) => serde_json::json!({
            "error": err.user_message(),
            "fields": errors,
        }),
        _ => serde_json::json!({"error": err.user_message()}),
    };
    (status, Json(body)).into_response()
}

fn status_body(entry: &CacheEntry, loading: bool) -> serde_json::Value {
    serde_json::json!({
        "roles": entry.role_set(),
        "status": entry.status(),
        "access_granted": entry.status().grants_access(),
        "onboarded_roles": entry.onboarded_roles(),
        "requires_onboarding": {
            "student": entry.requires_onboarding(Role::Student),
            "mentor": entry.requires_onboarding(Role::Mentor),
        },
        "loading": loading,
        "fetched_at": entry.fetched_at,
    })
}

// ── Handlers ────────────────────────────────────────────────────────────

/// GET /api/onboarding/status
async fn get_status(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Response {
    let session = match open_session(&state, &headers).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let entry = session.cache.current();
    Json(status_body(&entry, session.cache.is_loading())).into_response()
}

/// GET /api/profile
///
/// The cached profile, or 404 before the first submission.
async fn get_profile(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Response {
    let session = match open_session(&state, &headers).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let entry = session.cache.current();
    match entry.profile.as_ref() {
        Some(_) => (StatusCode::OK, Json(serde_json::json!(*entry))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "No profile exists yet"})),
        )
            .into_response(),
    }
}

/// POST /api/onboarding/student
async fn submit_student(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
    Json(form): Json<StudentForm>,
) -> Response {
    submit(&state, &headers, RoleForm::Student(form)).await
}

/// POST /api/onboarding/mentor
async fn submit_mentor(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
    Json(form): Json<MentorForm>,
) -> Response {
    submit(&state, &headers, RoleForm::Mentor(form)).await
}

async fn submit(state: &OnboardingRouteState, headers: &HeaderMap, form: RoleForm) -> Response {
    let session = match open_session(state, headers).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match session
        .orchestrator
        .submit(&form, session.cancel_token())
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "profile": outcome.profile,
                "role": outcome.role,
                "created": outcome.created,
                "landing": outcome.landing.path(),
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /api/session/refresh
async fn refresh_session(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Response {
    let session = match open_session(&state, &headers).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match session.cache.refresh(session.cancel_token()).await {
        Ok(entry) => Json(status_body(&entry, false)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/session
async fn sign_out(State(state): State<OnboardingRouteState>, headers: HeaderMap) -> Response {
    let identity = match participant(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if state.registry.sign_out(&identity).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "No active session"})),
        )
            .into_response()
    }
}
