use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{handlers::json_body, RequestContext, Role},
    backend::postgrest::clean_pattern,
    blocks::{page_request, parse_number},
    error::ApiError,
    models::{Pagination, ProfileUpdate},
    validation::{sanitize_input, validate_avatar_url, validate_full_name},
    AppState,
};

/// Queries shorter than this return nothing without asking the backend.
pub const MIN_SEARCH_CHARS: usize = 2;
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const MAX_SEARCH_LIMIT: u32 = 50;
const MAX_USERS_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

pub async fn search_users(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    // length is judged on what the pattern matcher will actually see
    let query = params
        .get("q")
        .map(|q| clean_pattern(&sanitize_input(q)))
        .unwrap_or_default();
    if query.chars().count() < MIN_SEARCH_CHARS {
        return Ok(Json(json!({ "data": [] })));
    }
    let limit = parse_number(&params, "limit", DEFAULT_SEARCH_LIMIT)?.clamp(1, MAX_SEARCH_LIMIT);

    let users = state
        .backend
        .search_profiles(&ctx.access_token, &query, &ctx.user_id, limit)
        .await?;
    Ok(Json(json!({ "data": users })))
}

pub async fn list_users(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require_any(&[Role::Admin])?;
    let page = page_request(&params, MAX_USERS_PAGE)?;
    let users = state.backend.list_profiles(&ctx.access_token, page).await?;

    Ok(Json(json!({
        "data": users.items,
        "pagination": Pagination::new(page.page, page.limit, users.total),
    })))
}

pub async fn get_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .backend
        .get_profile(&ctx.access_token, &ctx.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;
    Ok(Json(json!({ "data": profile })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(body)?;

    let full_name = match request.full_name {
        Some(name) => {
            let name = sanitize_input(&name);
            validate_full_name(&name)?;
            Some(name)
        }
        None => None,
    };
    let avatar_url = match request.avatar_url.map(|url| url.trim().to_string()) {
        Some(url) if !url.is_empty() => {
            validate_avatar_url(&url)?;
            Some(url)
        }
        _ => None,
    };
    if full_name.is_none() && avatar_url.is_none() {
        return Err(ApiError::validation("Nothing to update"));
    }

    // a missing row would make the PATCH a silent no-op
    if state
        .backend
        .get_profile(&ctx.access_token, &ctx.user_id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound("Profile not found".to_string()));
    }

    let update = ProfileUpdate {
        full_name,
        avatar_url,
        updated_at: Utc::now(),
    };
    let profile = state
        .backend
        .update_profile(&ctx.access_token, &ctx.user_id, &update)
        .await?;

    tracing::info!(user_id = %ctx.user_id, "profile updated");
    Ok(Json(json!({ "data": profile })))
}
