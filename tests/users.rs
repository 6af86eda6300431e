//! User Tests
//!
//! Covers admin-provisioned accounts, public profiles and the tutor directory.

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD, TEST_ADMIN_TOKEN};
use serde_json::{json, Value};

fn new_user(email: &str, role: &str) -> Value {
    json!({
        "email": email,
        "fullName": "Nguyễn Văn Hùng",
        "role": role,
        "password": DEFAULT_PASSWORD,
    })
}

// ===========================================================================
// Provisioning
// ===========================================================================

#[tokio::test]
async fn admin_creates_user() {
    let app = app().await;

    let resp = app
        .post_admin(
            "/v1/users",
            new_user("Hung@Example.edu.vn", "tutor"),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let data = resp.data();
    assert!(data["id"].as_str().unwrap().starts_with("usr_"));
    assert_eq!(data["email"], "hung@example.edu.vn");
    assert_eq!(data["fullName"], "Nguyễn Văn Hùng");
    assert_eq!(data["role"], "tutor");
    assert!(data.get("passwordHash").is_none());

    let resp = app
        .post_json(
            "/v1/auth/login",
            json!({ "email": "hung@example.edu.vn", "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn admin_token_is_required() {
    let app = app().await;

    let resp = app
        .post_admin("/v1/users", new_user("a@example.edu.vn", "student"), None)
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "missing admin token");

    let resp = app
        .post_admin(
            "/v1/users",
            new_user("a@example.edu.vn", "student"),
            Some("wrong-token"),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "invalid admin token");

    assert_eq!(app.count("users").await, 0);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = app().await;

    let resp = app
        .post_admin(
            "/v1/users",
            new_user("dup@example.edu.vn", "student"),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .post_admin(
            "/v1/users",
            new_user("DUP@example.edu.vn", "tutor"),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "Email already taken");
}

#[tokio::test]
async fn invalid_users_are_rejected() {
    let app = app().await;

    let cases = [
        json!({ "email": "not-an-email", "fullName": "A", "role": "student", "password": DEFAULT_PASSWORD }),
        json!({ "email": "a@example.edu.vn", "fullName": "  ", "role": "student", "password": DEFAULT_PASSWORD }),
        json!({ "email": "a@example.edu.vn", "fullName": "A", "role": "student", "password": "short" }),
        json!({ "email": "a@example.edu.vn", "fullName": "A", "role": "student", "password": "x".repeat(129) }),
    ];

    for body in cases {
        let resp = app
            .post_admin("/v1/users", body.clone(), Some(TEST_ADMIN_TOKEN))
            .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{}", body);
    }
    assert_eq!(app.count("users").await, 0);
}

// ===========================================================================
// Profiles
// ===========================================================================

#[tokio::test]
async fn public_profile_hides_email() {
    let app = app().await;
    let tutor = app.tutor("binh").await;

    let resp = app.get(&format!("/v1/users/{}", tutor.id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["id"], tutor.id.as_str());
    assert_eq!(data["role"], "tutor");
    assert!(data.get("email").is_none());

    let resp = app.get("/v1/users/usr_missing", None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tutor_directory_lists_only_tutors() {
    let app = app().await;
    let student = app.student("an").await;
    app.tutor("binh").await;
    app.tutor("cuong").await;
    app.manager("chi").await;

    let resp = app.get("/v1/tutors", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.get("/v1/tutors", student.token()).await;
    assert_eq!(resp.status, StatusCode::OK);
    let tutors = resp.data();
    let tutors = tutors.as_array().unwrap();
    assert_eq!(tutors.len(), 2);
    assert!(tutors.iter().all(|tutor| tutor["role"] == "tutor"));

    let resp = app.get("/v1/tutors?limit=1", student.token()).await;
    assert_eq!(resp.data().as_array().unwrap().len(), 1);
}
