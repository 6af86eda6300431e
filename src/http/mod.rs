use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{AdminToken, AuthUser};
pub use error::{ApiResponse, AppError};

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::sessions())
        .merge(routes::classes())
        .merge(routes::approvals())
        .merge(routes::notifications())
        .merge(routes::moderation());

    Router::new()
        .merge(routes::health())
        .nest("/v1", api)
        .with_state(state)
}
