use std::sync::OnceLock;

use regex::Regex;

use crate::error::ApiError;

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const FULL_NAME_MIN: usize = 2;
pub const FULL_NAME_MAX: usize = 100;
pub const BLOCK_REASON_MAX: usize = 500;
pub const AVATAR_URL_MAX: usize = 2048;
const INPUT_MAX: usize = 1000;
const PASSWORD_SPECIALS: &str = "@$!%*?&";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if !email_regex().is_match(email) {
        return Err(ApiError::validation("Please enter a valid email address"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters long",
            PASSWORD_MIN_LENGTH
        )));
    }
    let strong = password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    if !strong {
        return Err(ApiError::validation(
            "Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character",
        ));
    }
    Ok(())
}

pub fn validate_password_confirmation(password: &str, confirmation: &str) -> Result<(), ApiError> {
    if confirmation.is_empty() {
        return Err(ApiError::validation("Please confirm your password"));
    }
    if password != confirmation {
        return Err(ApiError::validation("Passwords do not match"));
    }
    Ok(())
}

pub fn validate_full_name(full_name: &str) -> Result<(), ApiError> {
    let length = full_name.trim().chars().count();
    if full_name.is_empty() {
        return Err(ApiError::validation("Full name is required"));
    }
    if length < FULL_NAME_MIN {
        return Err(ApiError::validation("Full name must be at least 2 characters long"));
    }
    if length > FULL_NAME_MAX {
        return Err(ApiError::validation("Full name must be less than 100 characters"));
    }
    Ok(())
}

pub fn validate_block_reason(reason: &str) -> Result<(), ApiError> {
    if reason.chars().count() > BLOCK_REASON_MAX {
        return Err(ApiError::validation("Block reason must be less than 500 characters"));
    }
    Ok(())
}

pub fn validate_avatar_url(url: &str) -> Result<(), ApiError> {
    if url.len() > AVATAR_URL_MAX {
        return Err(ApiError::validation("Avatar URL is too long"));
    }
    match reqwest::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ApiError::validation("Avatar URL must be an http(s) URL")),
    }
}

/// Trims, drops angle brackets and caps the length.
pub fn sanitize_input(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>'))
        .take(INPUT_MAX)
        .collect()
}
