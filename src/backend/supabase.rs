use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::{postgrest, Backend, BackendError, SignUp};
use crate::config::{Config, Tables};
use crate::models::{
    AuthUser, BlockListQuery, BlockRecord, NewBlock, Page, PageRequest, Profile, ProfileSummary,
    ProfileUpdate, Session,
};

/// Talks to the auth (`/auth/v1`) and table (`/rest/v1`) APIs over HTTP.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    tables: Tables,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: &str, tables: Tables) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            tables,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.supabase_url, &config.supabase_anon_key, config.tables.clone())
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Request carrying the project key, authorised as `token` (or anonymously).
    fn request(&self, method: Method, url: String, token: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token.unwrap_or(&self.anon_key))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status.canonical_reason().unwrap_or("request failed").to_string()
        });
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
            // the token endpoint answers bad credentials with 400
            StatusCode::BAD_REQUEST if is_credential_error(&body) => {
                BackendError::Unauthorized(message)
            }
            StatusCode::CONFLICT => BackendError::Conflict(message),
            _ => BackendError::Status {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// GET returning rows and the exact total from `Content-Range`.
    async fn fetch_page<T: DeserializeOwned>(
        &self,
        access_token: &str,
        table: &str,
        params: &[(String, String)],
    ) -> Result<Page<T>, BackendError> {
        let builder = self
            .request(Method::GET, self.rest_url(table), Some(access_token))
            .header("Prefer", "count=exact")
            .query(params);
        let response = self.send(builder).await?;
        let total = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(postgrest::parse_content_range);
        let items: Vec<T> = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        let total = total.unwrap_or(items.len() as u64);
        Ok(Page { items, total })
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        access_token: &str,
        table: &str,
        params: &[(String, String)],
    ) -> Result<Vec<T>, BackendError> {
        let builder = self
            .request(Method::GET, self.rest_url(table), Some(access_token))
            .query(params);
        self.send_json(builder).await
    }

    /// Write with `return=representation`, yielding the first affected row.
    async fn write_one<T: DeserializeOwned>(
        &self,
        method: Method,
        access_token: &str,
        table: &str,
        params: &[(String, String)],
        body: &Value,
    ) -> Result<T, BackendError> {
        let builder = self
            .request(method, self.rest_url(table), Some(access_token))
            .header("Prefer", "return=representation")
            .query(params)
            .json(body);
        let rows: Vec<T> = self.send_json(builder).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode("no row returned".to_string()))
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, BackendError> {
        let builder = self
            .request(Method::POST, self.auth_url("token"), None)
            .query(&[("grant_type", grant_type)])
            .json(&body);
        self.send_json(builder).await
    }

    fn select_block(&self) -> (String, String) {
        ("select".to_string(), postgrest::block_select(&self.tables.profiles))
    }
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn is_credential_error(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .or_else(|| value.get("error_code"))
                .and_then(Value::as_str)
                .map(|code| matches!(code, "invalid_grant" | "invalid_credentials"))
        })
        .unwrap_or(false)
}

fn param(key: &str, value: String) -> (String, String) {
    (key.to_string(), value)
}

#[async_trait]
impl Backend for SupabaseClient {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let builder = self.request(Method::GET, self.auth_url("user"), Some(access_token));
        self.send_json(builder).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn sign_up(&self, request: SignUp<'_>) -> Result<Option<Session>, BackendError> {
        let builder = self
            .request(Method::POST, self.auth_url("signup"), None)
            .json(&json!({
                "email": request.email,
                "password": request.password,
                "data": { "full_name": request.full_name },
            }));
        let body: Value = self.send_json(builder).await?;
        if body.get("access_token").is_some() {
            serde_json::from_value(body)
                .map(Some)
                .map_err(|e| BackendError::Decode(e.to_string()))
        } else {
            Ok(None)
        }
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), BackendError> {
        let builder = self
            .request(Method::POST, self.auth_url("recover"), None)
            .json(&json!({ "email": email }));
        self.send(builder).await.map(|_| ())
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<(), BackendError> {
        let builder = self
            .request(Method::PUT, self.auth_url("user"), Some(access_token))
            .json(&json!({ "password": password }));
        self.send(builder).await.map(|_| ())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let builder = self.request(Method::POST, self.auth_url("logout"), Some(access_token));
        self.send(builder).await.map(|_| ())
    }

    async fn get_profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<Profile>, BackendError> {
        let params = [param("select", "*".into()), param("id", postgrest::eq(user_id))];
        let rows: Vec<Profile> = self
            .fetch_rows(access_token, &self.tables.profiles, &params)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn update_profile(
        &self,
        access_token: &str,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, BackendError> {
        let body = serde_json::to_value(update).map_err(|e| BackendError::Decode(e.to_string()))?;
        let params = [param("id", postgrest::eq(user_id))];
        self.write_one(Method::PATCH, access_token, &self.tables.profiles, &params, &body)
            .await
    }

    async fn list_profiles(
        &self,
        access_token: &str,
        page: PageRequest,
    ) -> Result<Page<Profile>, BackendError> {
        let params = [
            param("select", "*".into()),
            param("order", "updated_at.desc.nullslast".into()),
            param("offset", page.offset().to_string()),
            param("limit", page.limit.to_string()),
        ];
        self.fetch_page(access_token, &self.tables.profiles, &params).await
    }

    async fn search_profiles(
        &self,
        access_token: &str,
        query: &str,
        exclude_id: &str,
        limit: u32,
    ) -> Result<Vec<ProfileSummary>, BackendError> {
        let pattern = postgrest::clean_pattern(query);
        let params = [
            param("select", "id,full_name,email,avatar_url".into()),
            param(
                "or",
                format!("(full_name.ilike.*{p}*,email.ilike.*{p}*)", p = pattern),
            ),
            param("id", format!("neq.{}", exclude_id)),
            param("limit", limit.to_string()),
        ];
        self.fetch_rows(access_token, &self.tables.profiles, &params).await
    }

    async fn list_blocks(
        &self,
        access_token: &str,
        query: &BlockListQuery,
    ) -> Result<Page<BlockRecord>, BackendError> {
        let params = postgrest::block_list_params(query, &self.tables.profiles);
        self.fetch_page(access_token, &self.tables.blocks, &params).await
    }

    async fn find_block(
        &self,
        access_token: &str,
        id: &str,
    ) -> Result<Option<BlockRecord>, BackendError> {
        let params = [self.select_block(), param("id", postgrest::eq(id))];
        let rows: Vec<BlockRecord> = self
            .fetch_rows(access_token, &self.tables.blocks, &params)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_block_between(
        &self,
        access_token: &str,
        blocker_id: &str,
        blocked_id: &str,
    ) -> Result<Option<BlockRecord>, BackendError> {
        let params = [
            self.select_block(),
            param("blocker_id", postgrest::eq(blocker_id)),
            param("blocked_id", postgrest::eq(blocked_id)),
            param("limit", "1".into()),
        ];
        let rows: Vec<BlockRecord> = self
            .fetch_rows(access_token, &self.tables.blocks, &params)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_block(
        &self,
        access_token: &str,
        block: &NewBlock,
    ) -> Result<BlockRecord, BackendError> {
        let body = serde_json::to_value(block).map_err(|e| BackendError::Decode(e.to_string()))?;
        let params = [self.select_block()];
        self.write_one(Method::POST, access_token, &self.tables.blocks, &params, &body)
            .await
    }

    async fn update_block_reason(
        &self,
        access_token: &str,
        id: &str,
        reason: Option<&str>,
    ) -> Result<BlockRecord, BackendError> {
        let params = [self.select_block(), param("id", postgrest::eq(id))];
        self.write_one(
            Method::PATCH,
            access_token,
            &self.tables.blocks,
            &params,
            &json!({ "reason": reason }),
        )
        .await
    }

    async fn delete_block(
        &self,
        access_token: &str,
        id: &str,
        blocker_id: &str,
    ) -> Result<(), BackendError> {
        let params = [
            param("id", postgrest::eq(id)),
            param("blocker_id", postgrest::eq(blocker_id)),
        ];
        let builder = self
            .request(Method::DELETE, self.rest_url(&self.tables.blocks), Some(access_token))
            .query(&params);
        self.send(builder).await.map(|_| ())
    }
}
