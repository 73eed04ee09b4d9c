//! HTTP-level integration tests for authentication and admin user
//! management: login, lockout, token refresh, logout, password changes,
//! and RBAC enforcement.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, get_auth, login, login_token, post_json, post_json_auth, seed_user, TEST_PASSWORD,
};
use mdc_db::repositories::UserRepo;
use sqlx::PgPool;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn login_returns_tokens_and_user_info(pool: PgPool) {
    let user = seed_user(&pool, "frieda", "admin").await;
    let app = common::build_test_app(pool);

    let json = login(app, "frieda", TEST_PASSWORD).await;

    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert!(json["expires_in"].is_number());
    assert_eq!(json["user"]["id"], user.id);
    assert_eq!(json["user"]["username"], "frieda");
    assert_eq!(json["user"]["email"], "frieda@test.com");
    assert_eq!(json["user"]["role"], "admin");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn login_with_wrong_password_returns_401(pool: PgPool) {
    seed_user(&pool, "hasan", "editor").await;
    let app = common::build_test_app(pool);

    let body = serde_json::json!({ "username": "hasan", "password": "not-the-password" });
    let response = post_json(app, "/api/v1/auth/login", body).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["message"].is_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn login_with_unknown_username_returns_401(pool: PgPool) {
    let app = common::build_test_app(pool);

    let body = serde_json::json!({ "username": "nobody", "password": "whatever-at-all" });
    let response = post_json(app, "/api/v1/auth/login", body).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn login_to_deactivated_account_returns_403(pool: PgPool) {
    let user = seed_user(&pool, "ghost", "editor").await;
    UserRepo::deactivate(&pool, user.id).await.unwrap();
    let app = common::build_test_app(pool);

    let body = serde_json::json!({ "username": "ghost", "password": TEST_PASSWORD });
    let response = post_json(app, "/api/v1/auth/login", body).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert!(json["message"].as_str().unwrap().contains("deactivated"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn five_failures_lock_the_account(pool: PgPool) {
    seed_user(&pool, "clumsy", "editor").await;
    let app = common::build_test_app(pool);

    let wrong = serde_json::json!({ "username": "clumsy", "password": "wrong-every-time" });
    for _ in 0..5 {
        let response = post_json(app.clone(), "/api/v1/auth/login", wrong.clone()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Even the correct password is refused while the lock holds.
    let right = serde_json::json!({ "username": "clumsy", "password": TEST_PASSWORD });
    let response = post_json(app, "/api/v1/auth/login", right).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert!(json["message"].as_str().unwrap().contains("locked"));
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn refresh_rotates_the_token(pool: PgPool) {
    seed_user(&pool, "rotator", "editor").await;
    let app = common::build_test_app(pool);

    let json = login(app.clone(), "rotator", TEST_PASSWORD).await;
    let first_refresh = json["refresh_token"].as_str().unwrap().to_string();

    let body = serde_json::json!({ "refresh_token": first_refresh });
    let response = post_json(app.clone(), "/api/v1/auth/refresh", body.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = body_json(response).await;
    assert!(rotated["access_token"].is_string());
    assert_ne!(rotated["refresh_token"].as_str().unwrap(), first_refresh);

    // The spent token is dead.
    let replay = post_json(app, "/api/v1/auth/refresh", body).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn refresh_with_garbage_token_returns_401(pool: PgPool) {
    let app = common::build_test_app(pool);

    let body = serde_json::json!({ "refresh_token": "not-a-real-token" });
    let response = post_json(app, "/api/v1/auth/refresh", body).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn logout_revokes_every_session(pool: PgPool) {
    seed_user(&pool, "leaver", "editor").await;
    let app = common::build_test_app(pool);

    let json = login(app.clone(), "leaver", TEST_PASSWORD).await;
    let access = json["access_token"].as_str().unwrap();
    let refresh = json["refresh_token"].as_str().unwrap();

    let response = post_json_auth(
        app.clone(),
        "/api/v1/auth/logout",
        serde_json::json!({}),
        access,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = serde_json::json!({ "refresh_token": refresh });
    let replay = post_json(app, "/api/v1/auth/refresh", body).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Password change
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn change_password_requires_the_current_one(pool: PgPool) {
    seed_user(&pool, "memory", "editor").await;
    let app = common::build_test_app(pool);
    let token = login_token(app.clone(), "memory").await;

    let body = serde_json::json!({
        "current_password": "not-what-it-was",
        "new_password": "anObviouslyFine1!"
    });
    let response = post_json_auth(app, "/api/v1/auth/change-password", body, &token).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn change_password_rejects_weak_replacement(pool: PgPool) {
    seed_user(&pool, "weakling", "editor").await;
    let app = common::build_test_app(pool);
    let token = login_token(app.clone(), "weakling").await;

    let body = serde_json::json!({
        "current_password": TEST_PASSWORD,
        "new_password": "short"
    });
    let response = post_json_auth(app, "/api/v1/auth/change-password", body, &token).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["errors"]["new_password"].is_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn change_password_swaps_credentials_and_kills_sessions(pool: PgPool) {
    seed_user(&pool, "renewer", "editor").await;
    let app = common::build_test_app(pool);

    let json = login(app.clone(), "renewer", TEST_PASSWORD).await;
    let token = json["access_token"].as_str().unwrap().to_string();
    let old_refresh = json["refresh_token"].as_str().unwrap().to_string();

    let new_password = "aMuchBetterSecret9";
    let body = serde_json::json!({
        "current_password": TEST_PASSWORD,
        "new_password": new_password
    });
    let response =
        post_json_auth(app.clone(), "/api/v1/auth/change-password", body, &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Old refresh token revoked.
    let replay = post_json(
        app.clone(),
        "/api/v1/auth/refresh",
        serde_json::json!({ "refresh_token": old_refresh }),
    )
    .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    // Old password refused, new password accepted.
    let old = post_json(
        app.clone(),
        "/api/v1/auth/login",
        serde_json::json!({ "username": "renewer", "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    login(app, "renewer", new_password).await;
}

// ---------------------------------------------------------------------------
// Current user
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn me_returns_the_authenticated_user(pool: PgPool) {
    let user = seed_user(&pool, "selfie", "editor").await;
    let app = common::build_test_app(pool);
    let token = login_token(app.clone(), "selfie").await;

    let response = get_auth(app, "/api/v1/auth/me", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["id"], user.id);
    assert_eq!(json["data"]["username"], "selfie");
    assert_eq!(json["data"]["role"], "editor");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn me_without_token_returns_401(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = common::get(app, "/api/v1/auth/me").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// RBAC + admin user management
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_routes_reject_non_admins(pool: PgPool) {
    seed_user(&pool, "plain", "editor").await;
    let app = common::build_test_app(pool);

    let response = common::get(app.clone(), "/api/v1/admin/users").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = login_token(app.clone(), "plain").await;
    let response = get_auth(app, "/api/v1/admin/users", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_lists_users_with_role_names(pool: PgPool) {
    seed_user(&pool, "boss", "admin").await;
    seed_user(&pool, "worker", "editor").await;
    let app = common::build_test_app(pool);
    let token = login_token(app.clone(), "boss").await;

    let response = get_auth(app, "/api/v1/admin/users", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let users = json["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    let worker = users
        .iter()
        .find(|u| u["username"] == "worker")
        .expect("worker must be listed");
    assert_eq!(worker["role"], "editor");
    assert_eq!(worker["is_active"], true);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_resets_a_password(pool: PgPool) {
    seed_user(&pool, "boss", "admin").await;
    let target = seed_user(&pool, "forgetful", "editor").await;
    let app = common::build_test_app(pool);

    // The target holds a live session that must die with the reset.
    let session = login(app.clone(), "forgetful", TEST_PASSWORD).await;
    let old_refresh = session["refresh_token"].as_str().unwrap().to_string();

    let admin_token = login_token(app.clone(), "boss").await;
    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/admin/users/{}/reset-password", target.id),
        serde_json::json!({ "new_password": "freshStartToday42" }),
        &admin_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let replay = post_json(
        app.clone(),
        "/api/v1/auth/refresh",
        serde_json::json!({ "refresh_token": old_refresh }),
    )
    .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    login(app, "forgetful", "freshStartToday42").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reset_password_for_unknown_user_returns_404(pool: PgPool) {
    seed_user(&pool, "boss", "admin").await;
    let app = common::build_test_app(pool);
    let token = login_token(app.clone(), "boss").await;

    let response = post_json_auth(
        app,
        "/api/v1/admin/users/999999/reset-password",
        serde_json::json!({ "new_password": "freshStartToday42" }),
        &token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Malformed bodies
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn malformed_json_body_returns_400(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}
