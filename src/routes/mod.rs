use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod courses;
pub mod doc;
pub mod enrollments;
pub mod health;
pub mod lessons;
pub mod params;
pub mod payments;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/courses", courses::router())
        .nest("/lessons", lessons::router())
        .nest("/enrollments", enrollments::router())
        .nest("/payments", payments::router())
        .nest("/admin", admin::router())
}
