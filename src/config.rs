use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_PORT: u16 = 3500;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Remote table names. Column names are fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct Tables {
    pub profiles: String,
    pub blocks: String,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            profiles: "profiles".to_string(),
            blocks: "user_blocks".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub project_ref: String,
    pub port: u16,
    pub secure_cookies: bool,
    pub dashboard_dir: Option<PathBuf>,
    pub tables: Tables,
    pub default_redirect: String,
}

impl Config {
    /// Reads the process environment. Call `dotenv().ok()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let supabase_url = required("SUPABASE_URL")?.trim_end_matches('/').to_string();
        let supabase_anon_key = required("SUPABASE_ANON_KEY")?;
        let jwt_secret = required("SUPABASE_JWT_SECRET")?;

        let project_ref = match get("SUPABASE_PROJECT_REF") {
            Some(project_ref) => project_ref,
            None => project_ref_from_url(&supabase_url).ok_or_else(|| ConfigError::Invalid {
                key: "SUPABASE_URL",
                value: supabase_url.clone(),
            })?,
        };

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let production = get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production"));
        let secure_cookies = match get("COOKIE_SECURE") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Invalid {
                key: "COOKIE_SECURE",
                value: raw,
            })?,
            None => production,
        };

        let default_redirect = get("DEFAULT_REDIRECT").unwrap_or_else(|| "/admin".to_string());
        if !default_redirect.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_REDIRECT",
                value: default_redirect,
            });
        }

        let defaults = Tables::default();
        Ok(Self {
            supabase_url,
            supabase_anon_key,
            jwt_secret,
            jwt_audience: get("SUPABASE_JWT_AUDIENCE")
                .unwrap_or_else(|| "authenticated".to_string()),
            project_ref,
            port,
            secure_cookies,
            dashboard_dir: get("DASHBOARD_DIR").map(PathBuf::from),
            tables: Tables {
                profiles: get("PROFILES_TABLE").unwrap_or(defaults.profiles),
                blocks: get("BLOCKS_TABLE").unwrap_or(defaults.blocks),
            },
            default_redirect,
        })
    }
}

/// `https://abcd.supabase.co` -> `abcd`
fn project_ref_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let label = host.split('.').next()?;
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
