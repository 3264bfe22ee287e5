//! `/api/blocked-users`: listing, blocking, unblocking and block reasons.

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{handlers::json_body, RequestContext, Role},
    error::ApiError,
    models::{BlockColumn, BlockListQuery, BlockRecord, NewBlock, PageRequest, Pagination, SortSpec},
    validation::{sanitize_input, validate_block_reason},
    AppState,
};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Roles that may create blocks and see every block.
const MODERATION_ROLES: [Role; 2] = [Role::Admin, Role::Moderator];

#[derive(Debug, Deserialize)]
pub struct CreateBlockRequest {
    pub blocked_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBlockRequest {
    pub reason: Option<String>,
}

pub(crate) fn parse_number(
    params: &HashMap<String, String>,
    key: &str,
    default: u32,
) -> Result<u32, ApiError> {
    match params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| ApiError::validation(format!("{} must be a positive number", key))),
    }
}

pub(crate) fn page_request(
    params: &HashMap<String, String>,
    max_limit: u32,
) -> Result<PageRequest, ApiError> {
    let page = parse_number(params, "page", 1)?;
    let limit = parse_number(params, "limit", DEFAULT_PAGE_SIZE)?;
    if page == 0 {
        return Err(ApiError::validation("page must be at least 1"));
    }
    if limit == 0 || limit > max_limit {
        return Err(ApiError::validation(format!("limit must be between 1 and {}", max_limit)));
    }
    Ok(PageRequest { page, limit })
}

/// Turns query parameters into a listing request for `ctx`.
pub fn list_query(
    params: &HashMap<String, String>,
    ctx: &RequestContext,
) -> Result<BlockListQuery, ApiError> {
    let page = page_request(params, MAX_PAGE_SIZE)?;

    let column = match params.get("sort").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => SortSpec::default().column,
        Some(name) => BlockColumn::parse(name)
            .ok_or_else(|| ApiError::validation(format!("Cannot sort by {}", name)))?,
    };
    let descending = match params.get("order").map(|s| s.trim().to_ascii_lowercase()) {
        None => true,
        Some(order) if order.is_empty() || order == "desc" => true,
        Some(order) if order == "asc" => false,
        Some(order) => return Err(ApiError::validation(format!("Unknown sort order {}", order))),
    };

    let mut filters = Vec::new();
    for column in BlockColumn::ALL {
        let Some(value) = params.get(column.as_str()) else {
            continue;
        };
        if !column.is_filterable() {
            return Err(ApiError::validation(format!("Cannot filter by {}", column.as_str())));
        }
        let value = sanitize_input(value);
        if !value.is_empty() {
            filters.push((column, value));
        }
    }

    let search = params
        .get("search")
        .map(|s| sanitize_input(s))
        .filter(|s| !s.is_empty());

    let blocker_scope = if MODERATION_ROLES.iter().any(|role| ctx.has_role(*role)) {
        None
    } else {
        Some(ctx.user_id.clone())
    };

    Ok(BlockListQuery {
        page,
        sort: SortSpec { column, descending },
        filters,
        search,
        blocker_scope,
    })
}

fn clean_reason(reason: Option<&str>) -> Result<Option<String>, ApiError> {
    let reason = reason.map(sanitize_input).filter(|r| !r.is_empty());
    if let Some(reason) = &reason {
        validate_block_reason(reason)?;
    }
    Ok(reason)
}

/// Loads a block and checks the caller created it.
async fn owned_block(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
) -> Result<BlockRecord, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::validation("Block ID is required"));
    }
    let block = state
        .backend
        .find_block(&ctx.access_token, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Block not found".to_string()))?;
    if block.blocker_id != ctx.user_id {
        return Err(ApiError::Forbidden("Forbidden".to_string()));
    }
    Ok(block)
}

pub async fn list_blocked_users(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = list_query(&params, &ctx)?;
    let page = state.backend.list_blocks(&ctx.access_token, &query).await?;

    Ok(Json(json!({
        "data": page.items,
        "pagination": Pagination::new(query.page.page, query.page.limit, page.total),
        "columns": BlockColumn::visible_for(&ctx.roles),
    })))
}

pub async fn block_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Json<CreateBlockRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(body)?;
    let blocked_id = request
        .blocked_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::validation("blocked_id is required"))?;

    if blocked_id == ctx.user_id {
        return Err(ApiError::validation("Cannot block yourself"));
    }
    ctx.require_any(&MODERATION_ROLES)?;
    let reason = clean_reason(request.reason.as_deref())?;

    if state
        .backend
        .find_block_between(&ctx.access_token, &ctx.user_id, &blocked_id)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("User is already blocked".to_string()));
    }

    let block = NewBlock {
        blocker_id: ctx.user_id.clone(),
        blocked_id,
        reason,
    };
    let created = state
        .backend
        .insert_block(&ctx.access_token, &block)
        .await
        .map_err(|e| match ApiError::from(e) {
            // lost a race with another insert of the same pair
            ApiError::Conflict(_) => ApiError::Conflict("User is already blocked".to_string()),
            other => other,
        })?;

    tracing::info!(
        blocker = %ctx.user_id,
        blocked = %created.blocked_id,
        block_id = %created.id,
        "user blocked"
    );
    Ok((StatusCode::CREATED, Json(json!({ "data": created }))))
}

pub async fn unblock_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let block = owned_block(&state, &ctx, &id).await?;
    state
        .backend
        .delete_block(&ctx.access_token, &block.id, &ctx.user_id)
        .await?;

    tracing::info!(
        blocker = %ctx.user_id,
        blocked = %block.blocked_id,
        block_id = %block.id,
        "user unblocked"
    );
    Ok(Json(json!({ "message": "Block removed successfully" })))
}

pub async fn update_block(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    body: Result<Json<UpdateBlockRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(body)?;
    let block = owned_block(&state, &ctx, &id).await?;
    let reason = clean_reason(request.reason.as_deref())?;

    let updated = state
        .backend
        .update_block_reason(&ctx.access_token, &block.id, reason.as_deref())
        .await?;
    Ok(Json(json!({ "data": updated })))
}

pub async fn check_blocked(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blocked = state
        .backend
        .find_block_between(&ctx.access_token, &ctx.user_id, &user_id)
        .await?
        .is_some();
    Ok(Json(json!({ "blocked": blocked })))
}
