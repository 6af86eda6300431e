//! Authentication & Security Tests
//!
//! Covers login, the refresh token lifecycle and bearer authentication.

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD};
use serde_json::json;

use tutorly::domain::user::Role;

// ===========================================================================
// Login
// ===========================================================================

#[tokio::test]
async fn login_valid_credentials() {
    let app = app().await;
    app.create_user_with_password("hoa@example.edu.vn", Role::Student)
        .await;

    let resp = app
        .post_json(
            "/v1/auth/login",
            json!({ "email": "Hoa@Example.edu.vn", "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert!(data["accessToken"].as_str().unwrap().starts_with("v4.local."));
    assert!(data["refreshToken"].is_string());
    assert!(data["accessExpiresAt"].is_string());
    assert!(data["refreshExpiresAt"].is_string());
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = app().await;
    app.create_user_with_password("hoa@example.edu.vn", Role::Student)
        .await;

    let resp = app
        .post_json(
            "/v1/auth/login",
            json!({ "email": "hoa@example.edu.vn", "password": "wrong_password" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid credentials");

    // Unknown emails get the same answer as wrong passwords.
    let resp = app
        .post_json(
            "/v1/auth/login",
            json!({ "email": "nobody@example.edu.vn", "password": "whatever123" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid credentials");
}

#[tokio::test]
async fn passwordless_accounts_cannot_login() {
    let app = app().await;
    let user = app.student("an").await;

    let resp = app
        .post_json(
            "/v1/auth/login",
            json!({ "email": user.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_validates_input() {
    let app = app().await;

    let resp = app
        .post_json(
            "/v1/auth/login",
            json!({ "email": "", "password": "somepassword" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post_json(
            "/v1/auth/login",
            json!({ "email": "hoa@example.edu.vn", "password": "" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post_json(
            "/v1/auth/login",
            json!({ "email": "hoa@example.edu.vn", "password": "a".repeat(129) }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_sql_injection_email() {
    let app = app().await;
    app.create_user_with_password("hoa@example.edu.vn", Role::Student)
        .await;

    let resp = app
        .post_json(
            "/v1/auth/login",
            json!({ "email": "' OR '1'='1", "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Refresh tokens
// ===========================================================================

#[tokio::test]
async fn refresh_rotates_token() {
    let app = app().await;
    let user = app.student("an").await;

    let resp = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refreshToken": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    let rotated = data["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, user.refresh_token);

    // The old token was consumed by the rotation.
    let resp = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refreshToken": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .post_json("/v1/auth/refresh", json!({ "refreshToken": rotated }), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_rejects_bad_tokens() {
    let app = app().await;
    let user = app.student("an").await;

    let resp = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refreshToken": "not-a-valid-token" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .post_json("/v1/auth/refresh", json!({ "refreshToken": "" }), None)
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // Access tokens are sealed with a different key.
    let resp = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refreshToken": user.access_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn revoked_token_cannot_refresh() {
    let app = app().await;
    let user = app.student("an").await;

    let resp = app
        .post_json(
            "/v1/auth/revoke",
            json!({ "refreshToken": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["revoked"], true);

    let resp = app
        .post_json(
            "/v1/auth/revoke",
            json!({ "refreshToken": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["revoked"], false);

    let resp = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refreshToken": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Bearer authentication
// ===========================================================================

#[tokio::test]
async fn current_user_requires_valid_token() {
    let app = app().await;
    let tutor = app.tutor("binh").await;

    let resp = app.get("/v1/auth/me", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.get("/v1/auth/me", Some("garbage")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    // Refresh tokens are not accepted as bearer tokens.
    let resp = app
        .get("/v1/auth/me", Some(tutor.refresh_token.as_str()))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.get("/v1/auth/me", tutor.token()).await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["id"], tutor.id.as_str());
    assert_eq!(data["email"], tutor.email.as_str());
    assert_eq!(data["role"], "tutor");
}

#[tokio::test]
async fn protected_routes_need_auth() {
    let app = app().await;

    for path in ["/v1/sessions", "/v1/classes", "/v1/approvals", "/v1/notifications"] {
        let resp = app.get(path, None).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{}", path);
        assert_eq!(resp.json()["success"], false);
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;

    let resp = app.get("/health", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}
