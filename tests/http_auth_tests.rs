//! HTTP-level auth tests
//!
//! Drive the real router with oneshot requests and assert on status codes,
//! error codes and response shapes.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{test_config, MemoryAuthRepo};
use lifeline_server::auth::AuthService;
use lifeline_server::routes;
use lifeline_server::state::AppState;

fn test_app() -> (MemoryAuthRepo, Router) {
    let repo = MemoryAuthRepo::new();
    let auth_service = Arc::new(AuthService::new(Arc::new(repo.clone()), &test_config()));

    // Lazy pool: constructed but never connected; these routes only touch
    // the auth service.
    let db_pool = sqlx::PgPool::connect_lazy("postgres://localhost/lifeline_test")
        .expect("lazy pool construction");

    let app = routes::auth_routes()
        .with_state(AppState::new(auth_service, db_pool))
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

    (repo, app)
}

async fn send_json(
    app: &Router,
    method: &str,
    path: &str,
    bearer: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

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

async fn post(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    send_json(app, "POST", path, None, body).await
}

fn register_body(email: &str) -> Value {
    json!({
        "email": email,
        "password": "password123",
        "full_name": "Test User",
        "phone": "+15551234567"
    })
}

#[tokio::test]
async fn register_returns_created_with_tokens() {
    let (_repo, app) = test_app();

    let (status, body) = post(&app, "/auth/register", register_body("new@example.com")).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "new@example.com");
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    // Test config exposes the raw verification token.
    assert!(body["email_verification_token"].is_string());
    assert!(body["message"].as_str().unwrap().contains("verify"));
}

#[tokio::test]
async fn register_duplicate_email_returns_conflict() {
    let (repo, app) = test_app();

    post(&app, "/auth/register", register_body("dup@example.com")).await;
    let (status, body) = post(&app, "/auth/register", register_body("dup@example.com")).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(repo.user_count(), 1);
}

#[tokio::test]
async fn register_rejects_invalid_payloads() {
    let (repo, app) = test_app();

    let (status, body) = post(
        &app,
        "/auth/register",
        json!({ "email": "not-an-email", "password": "password123", "full_name": "X" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = post(
        &app,
        "/auth/register",
        json!({ "email": "a@example.com", "password": "short", "full_name": "X" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(repo.user_count(), 0);
}

#[tokio::test]
async fn login_succeeds_with_valid_credentials() {
    let (_repo, app) = test_app();
    post(&app, "/auth/register", register_body("a@example.com")).await;

    let (status, body) = post(
        &app,
        "/auth/login",
        json!({ "email": "a@example.com", "password": "password123", "device_id": "device-1" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "a@example.com");
    assert_eq!(body["user"]["email_verified"], false);
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let (_repo, app) = test_app();
    post(&app, "/auth/register", register_body("a@example.com")).await;

    let (wrong_status, wrong_body) = post(
        &app,
        "/auth/login",
        json!({ "email": "a@example.com", "password": "wrong-password" }),
    )
    .await;
    let (unknown_status, unknown_body) = post(
        &app,
        "/auth/login",
        json!({ "email": "ghost@example.com", "password": "password123" }),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    // Identical bodies: no oracle for which emails exist.
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn repeated_failures_lock_the_account() {
    let (_repo, app) = test_app();
    post(&app, "/auth/register", register_body("a@example.com")).await;

    let bad_login = json!({ "email": "a@example.com", "password": "wrong-password" });
    for _ in 0..4 {
        let (status, _) = post(&app, "/auth/login", bad_login.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = post(&app, "/auth/login", bad_login.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "ACCOUNT_LOCKED");
    assert!(body["error"]["message"].as_str().unwrap().contains("locked"));

    // Correct credentials are rejected the same way while the lock holds.
    let (status, body) = post(
        &app,
        "/auth/login",
        json!({ "email": "a@example.com", "password": "password123" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "ACCOUNT_LOCKED");
}

#[tokio::test]
async fn refresh_rotates_and_replay_is_unauthorized() {
    let (repo, app) = test_app();
    let (_, registered) = post(&app, "/auth/register", register_body("a@example.com")).await;
    let original = registered["refresh_token"].as_str().unwrap().to_string();

    let (status, rotated) = post(
        &app,
        "/auth/refresh-token",
        json!({ "refresh_token": original }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(rotated["refresh_token"].is_string());
    assert_ne!(rotated["refresh_token"].as_str().unwrap(), original);

    // Replaying the consumed token: generic 401, with full containment.
    let (status, body) = post(
        &app,
        "/auth/refresh-token",
        json!({ "refresh_token": original }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let user = repo.user_by_email("a@example.com").unwrap();
    assert!(repo
        .sessions_for_user(user.id)
        .iter()
        .all(|s| s.revoked_at.is_some()));
}

#[tokio::test]
async fn logout_always_returns_ok() {
    let (_repo, app) = test_app();

    let (status, body) = post(
        &app,
        "/auth/logout",
        json!({ "refresh_token": "garbage-token" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn verify_email_flow_over_http() {
    let (_repo, app) = test_app();
    let (_, registered) = post(&app, "/auth/register", register_body("a@example.com")).await;
    let token = registered["email_verification_token"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, body) = post(&app, "/auth/verify-email", json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["user"]["email_verified"], true);

    let (status, body) = post(&app, "/auth/verify-email", json!({ "token": token })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "ALREADY_VERIFIED");
}

#[tokio::test]
async fn resend_verification_is_quiet_about_unknown_emails() {
    let (_repo, app) = test_app();

    let (status, body) = post(
        &app,
        "/auth/resend-verification",
        json!({ "email": "ghost@example.com" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("If the email exists"));
}

#[tokio::test]
async fn fcm_token_update_requires_bearer_auth() {
    let (repo, app) = test_app();
    let (_, registered) = post(&app, "/auth/register", register_body("a@example.com")).await;
    let access_token = registered["access_token"].as_str().unwrap().to_string();

    let user = repo.user_by_email("a@example.com").unwrap();
    let session = repo.sessions_for_user(user.id).pop().unwrap();

    // No token: rejected by the extractor.
    let (status, body) = send_json(
        &app,
        "PUT",
        "/auth/fcm-token",
        None,
        json!({ "session_id": session.id, "fcm_token": "fcm-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "MISSING_TOKEN");

    // With a valid access token: binding updated in place.
    let (status, body) = send_json(
        &app,
        "PUT",
        "/auth/fcm-token",
        Some(&access_token),
        json!({ "session_id": session.id, "fcm_token": "fcm-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(
        repo.session_by_id(session.id).unwrap().fcm_token.as_deref(),
        Some("fcm-1")
    );
}
