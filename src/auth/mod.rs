use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_cookies::Cookies;

use crate::{error::ApiError, AppState};

pub mod cookies;
pub mod gate;
pub mod handlers;
pub mod middleware;

// Supabase JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    /// Database role (`authenticated`), not the dashboard role.
    pub role: Option<String>,
    pub exp: usize,
    pub aud: Option<String>,
    pub iss: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub app_metadata: Value,
}

impl Claims {
    pub fn roles(&self) -> Vec<Role> {
        roles_from_metadata(&self.user_metadata, &self.app_metadata)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    User,
}

impl Role {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "moderator" => Some(Role::Moderator),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

/// Collects dashboard roles from `role`/`roles` claims in user metadata,
/// falling back to app metadata. Unknown role names are dropped.
pub fn roles_from_metadata(user_metadata: &Value, app_metadata: &Value) -> Vec<Role> {
    let mut roles: Vec<Role> = Vec::new();
    for metadata in [user_metadata, app_metadata] {
        for key in ["role", "roles"] {
            let names: Vec<&str> = match metadata.get(key) {
                Some(Value::String(name)) => vec![name.as_str()],
                Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
                _ => continue,
            };
            for role in names.into_iter().filter_map(Role::parse) {
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
        }
        if !roles.is_empty() {
            break;
        }
    }
    roles
}

/// Verifies an HS256 access token issued by the auth service.
pub fn verify_token(token: &str, jwt_secret: &str, audience: &str) -> Result<Claims, ApiError> {
    let key = DecodingKey::from_secret(jwt_secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_audience(&[audience]);
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("JWT decode error: {:?}", e);
            ApiError::Unauthorized("Invalid or expired session".to_string())
        })
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("Authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Access token from the `Authorization` header, else from the session cookie.
pub fn access_token(state: &AppState, headers: &HeaderMap, cookies: &Cookies) -> Option<String> {
    bearer_token(headers).or_else(|| state.cookies.read_access(cookies))
}

/// The signed-in caller, resolved once per request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: String,
    pub email: Option<String>,
    pub roles: Vec<Role>,
    pub access_token: String,
}

impl RequestContext {
    pub fn from_claims(claims: Claims, access_token: String) -> Self {
        let roles = claims.roles();
        Self {
            user_id: claims.sub,
            email: claims.email,
            roles,
            access_token,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn require_any(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.iter().any(|role| self.has_role(*role)) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Forbidden".to_string()))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Internal)?;
        let token = access_token(state, &parts.headers, &cookies)
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;
        let claims = verify_token(&token, &state.config.jwt_secret, &state.config.jwt_audience)?;
        Ok(RequestContext::from_claims(claims, token))
    }
}
