//! # authsvc_api
//!
//! HTTP transport for the authsvc token lifecycle.

pub mod client_ip;
pub mod error;
pub mod handlers;
pub mod json;
pub mod models;

use std::sync::Arc;

use authsvc_core::AuthService;
use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::auth;

/// Route paths.
pub mod routes {
    pub const POST_REGISTER: &str = "/register";
    pub const GET_LOGIN: &str = "/login";
    pub const PATCH_REFRESH: &str = "/refresh";
    pub const POST_LOGOUT: &str = "/logout";
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AuthService>,
}

/// Run embedded database migrations.
///
/// Delegates to `authsvc_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    authsvc_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(routes::POST_REGISTER, post(auth::register_handler))
        .route(routes::GET_LOGIN, get(auth::login_handler))
        .route(routes::PATCH_REFRESH, patch(auth::refresh_handler))
        .route(routes::POST_LOGOUT, post(auth::logout_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
