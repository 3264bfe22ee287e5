use axum::{
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub mod auth;
pub mod backend;
pub mod blocks;
pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod users;
pub mod validation;

use auth::{cookies::SessionCookies, handlers, middleware::require_page_access};
use backend::Backend;
use config::Config;
use error::error_response;

// Shared by every handler; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn Backend>,
    pub cookies: SessionCookies,
}

// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

async fn page_not_found() -> impl IntoResponse {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

// Create the app with the given configuration
pub fn create_app(config: Arc<Config>, backend: Arc<dyn Backend>) -> Router {
    let state = AppState {
        cookies: SessionCookies::new(&config.project_ref, config.secure_cookies),
        config,
        backend,
    };

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let auth_routes = Router::new()
        .route("/api/auth/session", post(handlers::create_session))
        .route("/api/auth/refresh", post(handlers::refresh_session))
        .route("/api/auth/signout", post(handlers::sign_out))
        .route("/api/auth/user", get(handlers::current_user))
        .route("/api/auth/signin", post(handlers::sign_in))
        .route("/api/auth/signup", post(handlers::sign_up))
        .route("/api/auth/reset-password", post(handlers::reset_password))
        .route("/api/auth/update-password", post(handlers::update_password));

    // Each handler resolves its caller through `RequestContext`
    let data_routes = Router::new()
        .route(
            "/api/blocked-users",
            get(blocks::list_blocked_users).post(blocks::block_user),
        )
        .route(
            "/api/blocked-users/:id",
            delete(blocks::unblock_user).patch(blocks::update_block),
        )
        .route("/api/blocked-users/check/:user_id", get(blocks::check_blocked))
        .route("/api/users", get(users::list_users))
        .route("/api/users/search", get(users::search_users))
        .route(
            "/api/profile",
            get(users::get_profile).patch(users::update_profile),
        );

    // Dashboard pages sit behind the gate
    let pages: Router<AppState> = match &state.config.dashboard_dir {
        Some(dir) => Router::new()
            .fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => Router::new().fallback(page_not_found),
    };
    let pages = pages.layer(middleware::from_fn_with_state(state.clone(), require_page_access));

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes)
        .merge(data_routes)
        .merge(pages)
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
