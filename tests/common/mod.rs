#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use rusty_warden::{
    auth::Claims,
    backend::{Backend, BackendError, SignUp},
    config::{Config, Tables},
    create_app,
    models::{
        AuthUser, BlockColumn, BlockListQuery, BlockRecord, NewBlock, Page, PageRequest, Profile,
        ProfileSummary, ProfileUpdate, Session,
    },
};

pub const SECRET: &str = "test_jwt_secret";
pub const PROJECT_REF: &str = "testref";
pub const AUTH_COOKIE: &str = "sb-testref-auth-token";
pub const REFRESH_COOKIE: &str = "sb-testref-refresh-token";

pub fn config() -> Config {
    Config {
        supabase_url: "http://localhost:54321".into(),
        supabase_anon_key: "anon".into(),
        jwt_secret: SECRET.into(),
        jwt_audience: "authenticated".into(),
        project_ref: PROJECT_REF.into(),
        port: 0,
        secure_cookies: false,
        dashboard_dir: None,
        tables: Tables::default(),
        default_redirect: "/admin".into(),
    }
}

pub fn app(backend: Arc<MemoryBackend>) -> Router {
    app_with(config(), backend)
}

pub fn app_with(config: Config, backend: Arc<MemoryBackend>) -> Router {
    create_app(Arc::new(config), backend)
}

/// HS256 access token the app will accept.
pub fn token_for(user_id: &str, role: Option<&str>) -> String {
    let claims = Claims {
        sub: user_id.into(),
        email: Some(format!("{}@example.com", user_id)),
        role: Some("authenticated".into()),
        exp: (Utc::now().timestamp() + 3600) as usize,
        aud: Some("authenticated".into()),
        iss: None,
        user_metadata: role.map(|r| json!({ "role": r })).unwrap_or(Value::Null),
        app_metadata: Value::Null,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

pub fn auth_user(id: &str, role: Option<&str>) -> AuthUser {
    AuthUser {
        id: id.into(),
        email: Some(format!("{}@example.com", id)),
        user_metadata: role.map(|r| json!({ "role": r })).unwrap_or(Value::Null),
        app_metadata: Value::Null,
    }
}

pub fn profile(id: &str, name: &str) -> Profile {
    Profile {
        id: id.into(),
        email: Some(format!("{}@example.com", id)),
        full_name: Some(name.into()),
        avatar_url: None,
        updated_at: None,
    }
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

pub fn cookie_for<'a>(cookies: &'a [String], name: &str) -> &'a str {
    cookies
        .iter()
        .find(|c| c.starts_with(&format!("{}=", name)))
        .unwrap_or_else(|| panic!("no {} cookie in {:?}", name, cookies))
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, AuthUser>,
    refresh: HashMap<String, Session>,
    passwords: HashMap<String, (String, Session)>,
    profiles: Vec<Profile>,
    blocks: Vec<BlockRecord>,
    next_id: u64,
    search_calls: usize,
    signed_out: Vec<String>,
    password_updates: Vec<String>,
}

/// Stand-in for the hosted service, keyed by access token.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn accept_token(&self, token: &str, user: AuthUser) {
        self.inner.lock().unwrap().users.insert(token.into(), user);
    }

    pub fn accept_refresh(&self, refresh_token: &str, session: Session) {
        self.inner
            .lock()
            .unwrap()
            .refresh
            .insert(refresh_token.into(), session);
    }

    pub fn accept_password(&self, email: &str, password: &str, session: Session) {
        self.inner
            .lock()
            .unwrap()
            .passwords
            .insert(email.into(), (password.into(), session));
    }

    pub fn add_profile(&self, profile: Profile) {
        self.inner.lock().unwrap().profiles.push(profile);
    }

    pub fn add_block(&self, blocker_id: &str, blocked_id: &str, reason: Option<&str>) -> String {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.make_block(blocker_id, blocked_id, reason.map(str::to_string));
        let id = record.id.clone();
        inner.blocks.push(record);
        id
    }

    pub fn block_count(&self) -> usize {
        self.inner.lock().unwrap().blocks.len()
    }

    pub fn search_calls(&self) -> usize {
        self.inner.lock().unwrap().search_calls
    }

    pub fn signed_out(&self) -> Vec<String> {
        self.inner.lock().unwrap().signed_out.clone()
    }

    pub fn password_updates(&self) -> Vec<String> {
        self.inner.lock().unwrap().password_updates.clone()
    }
}

impl Inner {
    fn summary(&self, id: &str) -> Option<ProfileSummary> {
        self.profiles.iter().find(|p| p.id == id).map(ProfileSummary::from)
    }

    fn make_block(
        &mut self,
        blocker_id: &str,
        blocked_id: &str,
        reason: Option<String>,
    ) -> BlockRecord {
        self.next_id += 1;
        BlockRecord {
            id: format!("block-{}", self.next_id),
            blocker_id: blocker_id.into(),
            blocked_id: blocked_id.into(),
            reason,
            created_at: Utc::now() + Duration::seconds(self.next_id as i64),
            blocker: self.summary(blocker_id),
            blocked: self.summary(blocked_id),
        }
    }
}

fn column_value(block: &BlockRecord, column: BlockColumn) -> String {
    let name = |p: &Option<ProfileSummary>| p.as_ref().and_then(|p| p.full_name.clone());
    let email = |p: &Option<ProfileSummary>| p.as_ref().and_then(|p| p.email.clone());
    match column {
        BlockColumn::BlockerName => name(&block.blocker),
        BlockColumn::BlockerEmail => email(&block.blocker),
        BlockColumn::BlockedName => name(&block.blocked),
        BlockColumn::BlockedEmail => email(&block.blocked),
        BlockColumn::Reason => block.reason.clone(),
        BlockColumn::CreatedAt => Some(block.created_at.to_rfc3339()),
    }
    .unwrap_or_default()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn rejected(message: &str) -> BackendError {
    BackendError::Unauthorized(message.into())
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        self.inner
            .lock()
            .unwrap()
            .users
            .get(access_token)
            .cloned()
            .ok_or_else(|| rejected("invalid JWT: token is expired"))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        self.inner
            .lock()
            .unwrap()
            .refresh
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| rejected("Invalid Refresh Token: Refresh Token Not Found"))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        match self.inner.lock().unwrap().passwords.get(email) {
            Some((expected, session)) if expected == password => Ok(session.clone()),
            _ => Err(rejected("Invalid login credentials")),
        }
    }

    async fn sign_up(&self, request: SignUp<'_>) -> Result<Option<Session>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.passwords.contains_key(request.email) {
            return Err(rejected("User already registered"));
        }
        inner.profiles.push(Profile {
            id: format!("new-{}", request.email),
            email: Some(request.email.into()),
            full_name: Some(request.full_name.into()),
            avatar_url: None,
            updated_at: None,
        });
        Ok(None)
    }

    async fn send_password_reset(&self, _email: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        _password: &str,
    ) -> Result<(), BackendError> {
        self.inner
            .lock()
            .unwrap()
            .password_updates
            .push(access_token.into());
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        self.inner.lock().unwrap().signed_out.push(access_token.into());
        Ok(())
    }

    async fn get_profile(
        &self,
        _access_token: &str,
        user_id: &str,
    ) -> Result<Option<Profile>, BackendError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .profiles
            .iter()
            .find(|p| p.id == user_id)
            .cloned())
    }

    async fn update_profile(
        &self,
        _access_token: &str,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        let profile = inner
            .profiles
            .iter_mut()
            .find(|p| p.id == user_id)
            .ok_or_else(|| BackendError::Decode("no row returned".into()))?;
        if let Some(name) = &update.full_name {
            profile.full_name = Some(name.clone());
        }
        if let Some(url) = &update.avatar_url {
            profile.avatar_url = Some(url.clone());
        }
        profile.updated_at = Some(update.updated_at);
        Ok(profile.clone())
    }

    async fn list_profiles(
        &self,
        _access_token: &str,
        page: PageRequest,
    ) -> Result<Page<Profile>, BackendError> {
        let inner = self.inner.lock().unwrap();
        let items = inner
            .profiles
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(Page {
            items,
            total: inner.profiles.len() as u64,
        })
    }

    async fn search_profiles(
        &self,
        _access_token: &str,
        query: &str,
        exclude_id: &str,
        limit: u32,
    ) -> Result<Vec<ProfileSummary>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.search_calls += 1;
        Ok(inner
            .profiles
            .iter()
            .filter(|p| p.id != exclude_id)
            .filter(|p| {
                p.full_name.as_deref().is_some_and(|n| contains_ci(n, query))
                    || p.email.as_deref().is_some_and(|e| contains_ci(e, query))
            })
            .take(limit as usize)
            .map(ProfileSummary::from)
            .collect())
    }

    async fn list_blocks(
        &self,
        _access_token: &str,
        query: &BlockListQuery,
    ) -> Result<Page<BlockRecord>, BackendError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<BlockRecord> = inner
            .blocks
            .iter()
            .filter(|b| query.blocker_scope.as_ref().map_or(true, |id| &b.blocker_id == id))
            .filter(|b| {
                query
                    .filters
                    .iter()
                    .all(|(column, value)| contains_ci(&column_value(b, *column), value))
            })
            .filter(|b| match &query.search {
                None => true,
                Some(text) => [
                    BlockColumn::BlockerName,
                    BlockColumn::BlockerEmail,
                    BlockColumn::BlockedName,
                    BlockColumn::BlockedEmail,
                ]
                .iter()
                .any(|column| contains_ci(&column_value(b, *column), text)),
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ordering = match query.sort.column {
                BlockColumn::CreatedAt => a.created_at.cmp(&b.created_at),
                column => column_value(a, column).cmp(&column_value(b, column)),
            };
            if query.sort.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit as usize)
            .collect();
        Ok(Page { items, total })
    }

    async fn find_block(
        &self,
        _access_token: &str,
        id: &str,
    ) -> Result<Option<BlockRecord>, BackendError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .blocks
            .iter()
            .find(|b| b.id == id)
            .cloned())
    }

    async fn find_block_between(
        &self,
        _access_token: &str,
        blocker_id: &str,
        blocked_id: &str,
    ) -> Result<Option<BlockRecord>, BackendError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .blocks
            .iter()
            .find(|b| b.blocker_id == blocker_id && b.blocked_id == blocked_id)
            .cloned())
    }

    async fn insert_block(
        &self,
        _access_token: &str,
        block: &NewBlock,
    ) -> Result<BlockRecord, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .blocks
            .iter()
            .any(|b| b.blocker_id == block.blocker_id && b.blocked_id == block.blocked_id)
        {
            return Err(BackendError::Conflict(
                "duplicate key value violates unique constraint".into(),
            ));
        }
        let record = inner.make_block(&block.blocker_id, &block.blocked_id, block.reason.clone());
        inner.blocks.push(record.clone());
        Ok(record)
    }

    async fn update_block_reason(
        &self,
        _access_token: &str,
        id: &str,
        reason: Option<&str>,
    ) -> Result<BlockRecord, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        let block = inner
            .blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| BackendError::Decode("no row returned".into()))?;
        block.reason = reason.map(str::to_string);
        Ok(block.clone())
    }

    async fn delete_block(
        &self,
        _access_token: &str,
        id: &str,
        blocker_id: &str,
    ) -> Result<(), BackendError> {
        self.inner
            .lock()
            .unwrap()
            .blocks
            .retain(|b| !(b.id == id && b.blocker_id == blocker_id));
        Ok(())
    }
}
