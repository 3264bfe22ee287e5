use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::{roles_from_metadata, Role};

/// A user as the auth service reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub app_metadata: Value,
}

impl AuthUser {
    pub fn roles(&self) -> Vec<Role> {
        roles_from_metadata(&self.user_metadata, &self.app_metadata)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileSummary {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl From<&Profile> for ProfileSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            full_name: profile.full_name.clone(),
            email: profile.email.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

/// Columns written by a profile edit; `None` fields are left untouched.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A block row joined with both parties' profile summaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockRecord {
    pub id: String,
    pub blocker_id: String,
    pub blocked_id: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub blocker: Option<ProfileSummary>,
    #[serde(default)]
    pub blocked: Option<ProfileSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewBlock {
    pub blocker_id: String,
    pub blocked_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit))
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockColumn {
    BlockerName,
    BlockerEmail,
    BlockedName,
    BlockedEmail,
    Reason,
    CreatedAt,
}

impl BlockColumn {
    pub const ALL: [BlockColumn; 6] = [
        BlockColumn::BlockerName,
        BlockColumn::BlockerEmail,
        BlockColumn::BlockedName,
        BlockColumn::BlockedEmail,
        BlockColumn::Reason,
        BlockColumn::CreatedAt,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|column| column.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockColumn::BlockerName => "blocker.full_name",
            BlockColumn::BlockerEmail => "blocker.email",
            BlockColumn::BlockedName => "blocked.full_name",
            BlockColumn::BlockedEmail => "blocked.email",
            BlockColumn::Reason => "reason",
            BlockColumn::CreatedAt => "created_at",
        }
    }

    /// Text columns accept `ilike` filters.
    pub fn is_filterable(&self) -> bool {
        !matches!(self, BlockColumn::CreatedAt)
    }

    /// Columns of the blocked-users table the given roles may see.
    pub fn visible_for(roles: &[Role]) -> Vec<&'static str> {
        let columns: &[BlockColumn] = if roles.contains(&Role::Admin) {
            &Self::ALL
        } else if roles.contains(&Role::Moderator) {
            &[
                BlockColumn::BlockerName,
                BlockColumn::BlockedName,
                BlockColumn::Reason,
                BlockColumn::CreatedAt,
            ]
        } else {
            &[BlockColumn::BlockedName, BlockColumn::CreatedAt]
        };

        let mut visible: Vec<&'static str> = columns.iter().map(BlockColumn::as_str).collect();
        if roles.contains(&Role::Admin) || roles.contains(&Role::Moderator) {
            visible.push("actions");
        }
        visible
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortSpec {
    pub column: BlockColumn,
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            column: BlockColumn::CreatedAt,
            descending: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockListQuery {
    pub page: PageRequest,
    pub sort: SortSpec,
    pub filters: Vec<(BlockColumn, String)>,
    pub search: Option<String>,
    /// Restricts the listing to blocks created by this user.
    pub blocker_scope: Option<String>,
}
