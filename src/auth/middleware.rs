use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;

use super::{access_token, gate, verify_token};
use crate::AppState;

/// Redirects page requests that lack a session, or an admin role for `/admin`.
pub async fn require_page_access(
    State(state): State<AppState>,
    cookies: Cookies,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = gate::normalize_path(req.uri().path());
    let query = req.uri().query().map(str::to_string);

    let claims = if gate::is_public(&path) {
        None
    } else {
        access_token(&state, req.headers(), &cookies).and_then(|token| {
            verify_token(&token, &state.config.jwt_secret, &state.config.jwt_audience).ok()
        })
    };

    let decision = gate::decide(&path, query.as_deref(), claims.as_ref());
    match decision.redirect_target() {
        None => next.run(req).await,
        Some(target) => {
            tracing::debug!(path = %path, ?decision, "page request redirected");
            Redirect::temporary(&target).into_response()
        }
    }
}
