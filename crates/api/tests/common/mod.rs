//! Shared helpers for HTTP-level integration tests.
//!
//! `build_test_app` mirrors the production router construction in
//! `main.rs` (via `router::build_app_router`) so tests exercise the same
//! middleware stack, audit-trail ingestion included. Email delivery is
//! disabled; everything else is real.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use mdc_api::auth::jwt::JwtConfig;
use mdc_api::auth::password::hash_password;
use mdc_api::config::{RetentionConfig, ServerConfig};
use mdc_api::router::build_app_router;
use mdc_api::state::AppState;
use mdc_db::models::user::{CreateUser, User};
use mdc_db::repositories::{RoleRepo, UserRepo};
use mdc_notify::Notifier;

/// Password used for every seeded test user.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with safe defaults.
///
/// The JWT secret is fixed so tokens stay valid across helper calls, and
/// the retention sweeper is disabled (tests drive purges explicitly).
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret-0123456789".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
        retention: RetentionConfig {
            enabled: false,
            days: 365,
            sweep_hours: 24,
        },
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        notifier: Arc::new(Notifier::disabled()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a GET request.
pub async fn get(app: Router, path: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a GET request with a bearer token.
pub async fn get_auth(app: Router, path: &str, token: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method("GET")
            .uri(path)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, path: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body and a bearer token.
pub async fn post_json_auth(
    app: Router,
    path: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a bodyless POST request with a bearer token.
pub async fn post_auth(app: Router, path: &str, token: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body into JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        panic!("response body is not JSON: {e}: {}", String::from_utf8_lossy(&bytes))
    })
}

/// Collect a response body into a string.
pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).expect("response body is not UTF-8")
}

// ---------------------------------------------------------------------------
// Seeding helpers
// ---------------------------------------------------------------------------

/// Create a user with [`TEST_PASSWORD`] and the given role name.
///
/// Roles are seeded by the migrations, so lookup by name always succeeds.
pub async fn seed_user(pool: &PgPool, username: &str, role_name: &str) -> User {
    let role = RoleRepo::find_by_name(pool, role_name)
        .await
        .expect("role lookup should succeed")
        .unwrap_or_else(|| panic!("role {role_name} must be seeded by migrations"));

    let hashed = hash_password(TEST_PASSWORD).expect("hashing should succeed");
    let input = CreateUser {
        username: username.to_string(),
        email: format!("{username}@test.com"),
        password_hash: hashed,
        role_id: role.id,
    };
    UserRepo::create(pool, &input)
        .await
        .expect("user creation should succeed")
}

/// Log a user in via the API and return the full auth response JSON.
pub async fn login(app: Router, username: &str, password: &str) -> serde_json::Value {
    let body = serde_json::json!({ "username": username, "password": password });
    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::OK, "login must succeed");
    body_json(response).await
}

/// Log a user in and return just the access token.
pub async fn login_token(app: Router, username: &str) -> String {
    let json = login(app, username, TEST_PASSWORD).await;
    json["access_token"]
        .as_str()
        .expect("login response must contain access_token")
        .to_string()
}
