use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod auth_routes;
pub mod home_routes;
pub mod inbox_routes;
pub mod medical_record_routes;
pub mod pet_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1", appointment_routes::router())
        .nest("/api/v1", pet_routes::router())
        .nest("/api/v1", medical_record_routes::router())
        .nest("/api/v1", inbox_routes::router())
        .merge(home_routes::router())
        .with_state(state)
}
