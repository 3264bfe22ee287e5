//! Per-request route gate for dashboard pages.

use super::{Claims, Role};

pub const SIGN_IN_PATH: &str = "/signin";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

const PUBLIC_PREFIXES: [&str; 6] = [
    SIGN_IN_PATH,
    "/signup",
    UNAUTHORIZED_PATH,
    "/reset-password",
    "/update-password",
    "/auth/callback",
];

const PAGE_EXTENSIONS: [&str; 3] = ["html", "htm", "txt"];

const PASSTHROUGH_PREFIXES: [&str; 5] = ["/api", "/health", "/_next", "/assets", "/favicon.ico"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    /// No usable session; `from` is the path (and query) to return to.
    SignIn { from: String },
    Unauthorized,
}

impl GateDecision {
    pub fn redirect_target(&self) -> Option<String> {
        match self {
            GateDecision::Pass => None,
            GateDecision::SignIn { from } => Some(format!(
                "{}?from={}",
                SIGN_IN_PATH,
                urlencoding::encode(from)
            )),
            GateDecision::Unauthorized => Some(UNAUTHORIZED_PATH.to_string()),
        }
    }
}

/// Path as the file server resolves it: percent-decoded, without empty or `.` segments.
pub fn normalize_path(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|path| path.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    let segments: Vec<&str> = decoded
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    format!("/{}", segments.join("/"))
}

/// `prefix` matches itself and its sub-paths, never `prefix` followed by more letters.
fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn is_public(path: &str) -> bool {
    if PUBLIC_PREFIXES.iter().chain(PASSTHROUGH_PREFIXES.iter()).any(|p| under(path, p)) {
        return true;
    }
    // static files such as /logo.svg or /images/a.png, never pages or anything under /admin
    if is_admin_path(path) {
        return false;
    }
    let Some((_, ext)) = path.rsplit('/').next().and_then(|segment| segment.rsplit_once('.')) else {
        return false;
    };
    !ext.is_empty() && !PAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

pub fn is_admin_path(path: &str) -> bool {
    under(path, "/admin")
}

/// `claims` must already be verified.
pub fn decide(path: &str, query: Option<&str>, claims: Option<&Claims>) -> GateDecision {
    if is_public(path) {
        return GateDecision::Pass;
    }

    let Some(claims) = claims else {
        let from = match query {
            Some(q) if !q.is_empty() => format!("{}?{}", path, q),
            _ => path.to_string(),
        };
        return GateDecision::SignIn { from };
    };

    if is_admin_path(path) && !claims.roles().contains(&Role::Admin) {
        return GateDecision::Unauthorized;
    }

    GateDecision::Pass
}

/// Post-login destination: only local absolute paths are honoured.
pub fn safe_redirect(from: Option<&str>, default: &str) -> String {
    match from {
        Some(path)
            if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') =>
        {
            path.to_string()
        }
        _ => default.to_string(),
    }
}
