//! Integration tests for the onboarding REST surface.
//!
//! Each test builds the router over an in-memory store and drives it with
//! `oneshot` requests.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use mentorship_onboarding::onboarding::{
    ModerationDecision, OnboardingRouteState, ParticipantId, SessionRegistry, cors_layer,
    onboarding_routes, record_moderation,
};
use mentorship_onboarding::store::{Database, LibSqlBackend};

async fn app() -> (Router, Arc<SessionRegistry>) {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let registry = Arc::new(SessionRegistry::new(db, Duration::from_secs(5)));
    let router = onboarding_routes(OnboardingRouteState {
        registry: Arc::clone(&registry),
    })
    .layer(cors_layer(&["*".to_string()]));
    (router, registry)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    identity: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = identity {
        builder = builder.header("x-participant-id", id);
    }
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn student_body() -> Value {
    json!({
        "school": "HEC Paris",
        "degree_level": "M1",
        "field_of_study": "Finance",
        "internship_type": "Stage Obligatoire",
        "internship_duration": "6 mois",
        "linkedin_url": "https://linkedin.com/in/u1",
    })
}

fn mentor_body() -> Value {
    json!({
        "company": "Acme",
        "current_position": "Head of M&A",
        "experience_years": 8,
        "linkedin_url": "https://linkedin.com/in/mentor",
        "contact_types": ["email"],
        "coaching_formats": ["mock_interview", "application_review"],
        "monthly_capacity": 2,
    })
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let (app, _) = app().await;
    let (status, body) = send(&app, "GET", "/api/onboarding/status", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn fresh_participant_needs_onboarding() {
    let (app, _) = app().await;
    let (status, body) = send(&app, "GET", "/api/onboarding/status", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "none");
    assert_eq!(body["access_granted"], false);
    assert_eq!(body["roles"], json!([]));
    assert_eq!(body["requires_onboarding"]["student"], true);
    assert_eq!(body["requires_onboarding"]["mentor"], true);

    let (status, _) = send(&app, "GET", "/api/profile", Some("u1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn student_then_mentor_submission() {
    let (app, _) = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/onboarding/student",
        Some("u1"),
        Some(student_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["landing"], "/student/home");
    assert_eq!(body["created"], true);
    assert_eq!(body["profile"]["role_set"], json!(["student"]));
    assert_eq!(body["profile"]["status"], "under_review");

    let (status, body) = send(
        &app,
        "POST",
        "/api/onboarding/mentor",
        Some("u1"),
        Some(mentor_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["landing"], "/mentor/home");
    assert_eq!(body["created"], false);
    assert_eq!(body["profile"]["role_set"], json!(["student", "mentor"]));

    let (status, body) = send(&app, "GET", "/api/onboarding/status", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requires_onboarding"]["student"], false);
    assert_eq!(body["requires_onboarding"]["mentor"], false);

    let (status, body) = send(&app, "GET", "/api/profile", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student"]["school"], "HEC Paris");
    assert_eq!(body["mentor"]["company"], "Acme");
}

#[tokio::test]
async fn invalid_form_returns_field_errors() {
    let (app, _) = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/onboarding/mentor",
        Some("u1"),
        Some(json!({"company": "Acme", "monthly_capacity": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["field"].as_str())
        .collect();
    assert!(fields.contains(&"monthly_capacity"));
    assert!(fields.contains(&"current_position"));

    let (_, body) = send(&app, "GET", "/api/onboarding/status", Some("u1"), None).await;
    assert_eq!(body["status"], "none");
}

#[tokio::test]
async fn refresh_and_sign_out() {
    let (app, registry) = app().await;
    send(
        &app,
        "POST",
        "/api/onboarding/student",
        Some("u1"),
        Some(student_body()),
    )
    .await;

    let (status, body) = send(&app, "POST", "/api/session/refresh", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], json!(["student"]));
    assert_eq!(body["loading"], false);

    let (status, _) = send(&app, "DELETE", "/api/session", Some("u1"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(registry.len().await, 0);

    let (status, _) = send(&app, "DELETE", "/api/session", Some("u1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A new session reloads what the store holds.
    let (status, body) = send(&app, "GET", "/api/onboarding/status", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "under_review");
}

#[tokio::test]
async fn approval_grants_access_after_refresh() {
    let (app, registry) = app().await;
    send(
        &app,
        "POST",
        "/api/onboarding/student",
        Some("u1"),
        Some(student_body()),
    )
    .await;
    record_moderation(
        registry.database().as_ref(),
        &ParticipantId::new("u1"),
        ModerationDecision::Approved,
    )
    .await
    .unwrap();

    // Cached until refreshed.
    let (_, body) = send(&app, "GET", "/api/onboarding/status", Some("u1"), None).await;
    assert_eq!(body["access_granted"], false);

    let (status, body) = send(&app, "POST", "/api/session/refresh", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "verified");
    assert_eq!(body["access_granted"], true);
}
