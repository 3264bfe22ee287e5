//! The hosted auth + database service, seen through the operations this
//! dashboard needs. Every data call carries the caller's access token so the
//! remote row-level policies apply.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    AuthUser, BlockListQuery, BlockRecord, NewBlock, Page, PageRequest, Profile, ProfileSummary,
    ProfileUpdate, Session,
};

pub mod postgrest;
pub mod supabase;

pub use supabase::SupabaseClient;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The token or credentials were rejected.
    #[error("{0}")]
    Unauthorized(String),
    /// Uniqueness or similar constraint violation.
    #[error("{0}")]
    Conflict(String),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Message suitable for passing through to the API caller.
    pub fn message(&self) -> String {
        match self {
            BackendError::Unauthorized(m) | BackendError::Conflict(m) => m.clone(),
            BackendError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub struct SignUp<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Validates the token with the auth service.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError>;

    /// Accepts a token pair from the browser: the access token if it is still
    /// good, otherwise whatever the refresh token exchanges for.
    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, BackendError> {
        match self.get_user(access_token).await {
            Ok(user) => Ok(Session {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                expires_in: None,
                user,
            }),
            Err(BackendError::Unauthorized(reason)) => {
                tracing::debug!("access token rejected ({}), refreshing", reason);
                self.refresh_session(refresh_token).await
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    /// `None` when the account still needs email confirmation.
    async fn sign_up(&self, request: SignUp<'_>) -> Result<Option<Session>, BackendError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), BackendError>;

    async fn update_password(&self, access_token: &str, password: &str) -> Result<(), BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;

    async fn get_profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<Profile>, BackendError>;

    async fn update_profile(
        &self,
        access_token: &str,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, BackendError>;

    async fn list_profiles(
        &self,
        access_token: &str,
        page: PageRequest,
    ) -> Result<Page<Profile>, BackendError>;

    /// Case-insensitive name/email match, never returning `exclude_id`.
    async fn search_profiles(
        &self,
        access_token: &str,
        query: &str,
        exclude_id: &str,
        limit: u32,
    ) -> Result<Vec<ProfileSummary>, BackendError>;

    async fn list_blocks(
        &self,
        access_token: &str,
        query: &BlockListQuery,
    ) -> Result<Page<BlockRecord>, BackendError>;

    async fn find_block(
        &self,
        access_token: &str,
        id: &str,
    ) -> Result<Option<BlockRecord>, BackendError>;

    async fn find_block_between(
        &self,
        access_token: &str,
        blocker_id: &str,
        blocked_id: &str,
    ) -> Result<Option<BlockRecord>, BackendError>;

    async fn insert_block(
        &self,
        access_token: &str,
        block: &NewBlock,
    ) -> Result<BlockRecord, BackendError>;

    async fn update_block_reason(
        &self,
        access_token: &str,
        id: &str,
        reason: Option<&str>,
    ) -> Result<BlockRecord, BackendError>;

    /// Deletes only when the row belongs to `blocker_id`.
    async fn delete_block(
        &self,
        access_token: &str,
        id: &str,
        blocker_id: &str,
    ) -> Result<(), BackendError>;
}
