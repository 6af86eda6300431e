use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/revoke", post(handlers::revoke_token))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::create_user))
        .route("/users/:id", get(handlers::get_user))
        .route("/tutors", get(handlers::list_tutors))
}

pub fn sessions() -> Router<AppState> {
    Router::new()
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/sessions/:id",
            get(handlers::get_session).patch(handlers::update_session),
        )
        .route("/sessions/:id/cancel", post(handlers::cancel_session))
        .route(
            "/sessions/:id/reschedule",
            post(handlers::reschedule_session),
        )
}

pub fn classes() -> Router<AppState> {
    Router::new()
        .route(
            "/classes",
            get(handlers::list_classes).post(handlers::create_class),
        )
        .route("/classes/:id", get(handlers::get_class))
        .route("/classes/:id/enroll", post(handlers::enroll_class))
        .route(
            "/classes/:id/sessions",
            post(handlers::generate_class_sessions),
        )
}

pub fn approvals() -> Router<AppState> {
    Router::new()
        .route(
            "/approvals",
            get(handlers::list_approvals).post(handlers::create_approval),
        )
        .route("/approvals/:id", get(handlers::get_approval))
        .route("/approvals/:id/approve", post(handlers::approve_request))
        .route("/approvals/:id/reject", post(handlers::reject_request))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/queue", get(handlers::list_notification_queue))
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
}

pub fn moderation() -> Router<AppState> {
    Router::new().route("/moderation/audit", get(handlers::list_moderation_audit))
}
