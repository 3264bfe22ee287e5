use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Database or auth service failure; the message is passed to the caller.
    #[error("{0}")]
    Upstream(String),
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Conflict(message) => ApiError::Conflict(message),
            other => {
                tracing::error!("backend error: {}", other);
                ApiError::Upstream(other.message())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(self.status(), &self.to_string())
    }
}

// Helper function to create error responses
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let body = Json(ErrorResponse {
        error: message.to_string(),
    });

    (status, body).into_response()
}

/// Rewrites the auth service's stock messages into something a person can act on.
pub fn friendly_auth_message(message: &str) -> String {
    match message {
        "Invalid login credentials" => {
            "Invalid email or password. Please check your credentials and try again."
        }
        "Email not confirmed" => {
            "Please check your email and click the confirmation link before signing in."
        }
        "User already registered" => {
            "An account with this email already exists. Please sign in instead."
        }
        "Password should be at least 6 characters" => {
            "Password must be at least 6 characters long."
        }
        "Signup requires a valid password" => "Please enter a valid password.",
        "Invalid email" => "Please enter a valid email address.",
        "Email rate limit exceeded" => {
            "Too many email requests. Please wait a few minutes before trying again."
        }
        "Token has expired or is invalid" => "Your session has expired. Please sign in again.",
        "" => "An authentication error occurred. Please try again.",
        other => other,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_kind() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Upstream("db down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn backend_conflict_stays_a_conflict() {
        let err: ApiError = BackendError::Conflict("duplicate key".into()).into();
        assert!(matches!(err, ApiError::Conflict(_)));

        let err: ApiError = BackendError::Status {
            status: 500,
            message: "relation does not exist".into(),
        }
        .into();
        assert_eq!(err.to_string(), "relation does not exist");
    }

    #[test]
    fn known_auth_messages_are_rewritten() {
        assert_eq!(
            friendly_auth_message("Email not confirmed"),
            "Please check your email and click the confirmation link before signing in."
        );
        assert_eq!(friendly_auth_message("something odd"), "something odd");
    }
}
