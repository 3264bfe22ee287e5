//! `/api/auth/*`: the session bridge and the account endpoints around it.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_cookies::Cookies;

use super::{access_token, gate::safe_redirect, RequestContext, Role};
use crate::{
    backend::{BackendError, SignUp},
    error::{friendly_auth_message, ApiError},
    validation::{
        validate_email, validate_full_name, validate_password, validate_password_confirmation,
    },
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default, rename = "keepLoggedIn", alias = "keep_logged_in")]
    pub keep_logged_in: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct KeepLoggedIn {
    #[serde(default, rename = "keepLoggedIn", alias = "keep_logged_in")]
    pub keep_logged_in: bool,
}

#[derive(Debug, Deserialize)]
pub struct RedirectParams {
    pub from: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "keepLoggedIn", alias = "keep_logged_in")]
    pub keep_logged_in: bool,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Serialize)]
struct UserInfo {
    id: String,
    email: Option<String>,
    roles: Vec<Role>,
    user_metadata: Value,
    app_metadata: Value,
}

/// Any unreadable JSON body is a plain 400.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| {
            ApiError::validation(format!("Invalid request body: {}", rejection.body_text()))
        })
}

fn auth_failure(err: BackendError) -> ApiError {
    match err {
        BackendError::Unauthorized(message) => {
            ApiError::Unauthorized(friendly_auth_message(&message))
        }
        other => other.into(),
    }
}

/// Mirrors a browser-held token pair into HTTP-only cookies.
pub async fn create_session(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<RedirectParams>,
    body: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(body)?;
    if request.access_token.trim().is_empty() || request.refresh_token.trim().is_empty() {
        return Err(ApiError::validation("access_token and refresh_token are required"));
    }

    let session = state
        .backend
        .set_session(&request.access_token, &request.refresh_token)
        .await
        .map_err(|e| {
            tracing::error!("session bridge rejected by auth service: {}", e);
            ApiError::Upstream(e.message())
        })?;

    state.cookies.issue(&cookies, &session, request.keep_logged_in);
    tracing::info!(
        user_id = %session.user.id,
        keep_logged_in = request.keep_logged_in,
        "session cookies issued"
    );

    let redirect_to = safe_redirect(params.from.as_deref(), &state.config.default_redirect);
    Ok(Json(json!({ "redirectTo": redirect_to })))
}

pub async fn refresh_session(
    State(state): State<AppState>,
    cookies: Cookies,
    body: Option<Json<KeepLoggedIn>>,
) -> Result<impl IntoResponse, ApiError> {
    let keep = body.map(|Json(b)| b).unwrap_or_default().keep_logged_in;
    let refresh_token = state
        .cookies
        .read_refresh(&cookies)
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let session = state
        .backend
        .refresh_session(&refresh_token)
        .await
        .map_err(auth_failure)?;

    state.cookies.issue(&cookies, &session, keep);
    Ok(Json(json!({ "expires_in": session.expires_in })))
}

pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
) -> impl IntoResponse {
    if let Some(token) = access_token(&state, &headers, &cookies) {
        // the cookies go regardless
        if let Err(e) = state.backend.sign_out(&token).await {
            tracing::warn!("auth service sign-out failed: {}", e);
        }
    }
    state.cookies.clear(&cookies);
    Json(json!({ "success": true }))
}

/// Re-validates the caller with the auth service rather than trusting the JWT alone.
pub async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
) -> Result<impl IntoResponse, ApiError> {
    let token = access_token(&state, &headers, &cookies)
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let user = state.backend.get_user(&token).await.map_err(|e| match e {
        BackendError::Unauthorized(message) => ApiError::Unauthorized(message),
        other => other.into(),
    })?;

    Ok(Json(UserInfo {
        roles: user.roles(),
        id: user.id,
        email: user.email,
        user_metadata: user.user_metadata,
        app_metadata: user.app_metadata,
    }))
}

pub async fn sign_in(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<RedirectParams>,
    body: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(body)?;
    let email = request.email.trim();
    validate_email(email)?;
    if request.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let session = state
        .backend
        .sign_in_with_password(email, &request.password)
        .await
        .map_err(auth_failure)?;

    state.cookies.issue(&cookies, &session, request.keep_logged_in);
    tracing::info!(user_id = %session.user.id, "signed in with password");

    let redirect_to = safe_redirect(params.from.as_deref(), &state.config.default_redirect);
    Ok(Json(json!({ "redirectTo": redirect_to })))
}

pub async fn sign_up(
    State(state): State<AppState>,
    cookies: Cookies,
    body: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(body)?;
    let email = request.email.trim();
    validate_email(email)?;
    validate_password(&request.password)?;
    validate_password_confirmation(&request.password, &request.confirm_password)?;
    validate_full_name(&request.full_name)?;

    let session = state
        .backend
        .sign_up(SignUp {
            email,
            password: &request.password,
            full_name: request.full_name.trim(),
        })
        .await
        .map_err(auth_failure)?;

    let confirmation_required = match &session {
        Some(session) => {
            state.cookies.issue(&cookies, session, false);
            false
        }
        None => true,
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "confirmation_required": confirmation_required })),
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(body)?;
    let email = request.email.trim();
    validate_email(email)?;

    state
        .backend
        .send_password_reset(email)
        .await
        .map_err(auth_failure)?;

    Ok(Json(json!({
        "message": "If an account exists for that address, a reset link is on its way."
    })))
}

pub async fn update_password(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(body)?;
    validate_password(&request.password)?;
    validate_password_confirmation(&request.password, &request.confirm_password)?;

    state
        .backend
        .update_password(&ctx.access_token, &request.password)
        .await
        .map_err(auth_failure)?;

    tracing::info!(user_id = %ctx.user_id, "password updated");
    Ok(Json(json!({ "success": true })))
}
