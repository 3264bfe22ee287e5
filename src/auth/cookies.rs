//! Session cookies.
//!
//! Every place that reads or writes the auth cookies goes through
//! [`SessionCookies`], which talks to the request's cookie jar via
//! [`CookieAdapter`].

use tower_cookies::{
    cookie::{time::Duration, SameSite},
    Cookie, Cookies,
};

use crate::models::Session;

/// Lifetime of the cookies when the user asks to stay signed in.
pub const KEEP_LOGGED_IN_SECS: i64 = 60 * 60 * 24 * 30;

/// Read/write access to a cookie jar.
pub trait CookieAdapter {
    fn get_value(&self, name: &str) -> Option<String>;
    fn put(&self, cookie: Cookie<'static>);
}

impl CookieAdapter for Cookies {
    fn get_value(&self, name: &str) -> Option<String> {
        self.get(name).map(|cookie| cookie.value().to_string())
    }

    fn put(&self, cookie: Cookie<'static>) {
        self.add(cookie);
    }
}

#[derive(Debug, Clone)]
pub struct SessionCookies {
    access_name: String,
    refresh_name: String,
    secure: bool,
}

impl SessionCookies {
    pub fn new(project_ref: &str, secure: bool) -> Self {
        Self {
            access_name: format!("sb-{}-auth-token", project_ref),
            refresh_name: format!("sb-{}-refresh-token", project_ref),
            secure,
        }
    }

    pub fn access_name(&self) -> &str {
        &self.access_name
    }

    pub fn refresh_name(&self) -> &str {
        &self.refresh_name
    }

    pub fn read_access(&self, jar: &impl CookieAdapter) -> Option<String> {
        jar.get_value(&self.access_name).filter(|v| !v.is_empty())
    }

    pub fn read_refresh(&self, jar: &impl CookieAdapter) -> Option<String> {
        jar.get_value(&self.refresh_name).filter(|v| !v.is_empty())
    }

    /// Writes both tokens. Without `keep_logged_in` they are browser-session cookies.
    pub fn issue(&self, jar: &impl CookieAdapter, session: &Session, keep_logged_in: bool) {
        let max_age = keep_logged_in.then(|| Duration::seconds(KEEP_LOGGED_IN_SECS));
        jar.put(self.build(&self.access_name, session.access_token.clone(), max_age));
        jar.put(self.build(&self.refresh_name, session.refresh_token.clone(), max_age));
    }

    pub fn clear(&self, jar: &impl CookieAdapter) {
        jar.put(self.build(&self.access_name, String::new(), Some(Duration::ZERO)));
        jar.put(self.build(&self.refresh_name, String::new(), Some(Duration::ZERO)));
    }

    fn build(&self, name: &str, value: String, max_age: Option<Duration>) -> Cookie<'static> {
        let mut cookie = Cookie::build((name.to_string(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build();
        if let Some(max_age) = max_age {
            cookie.set_max_age(max_age);
        }
        cookie
    }
}
