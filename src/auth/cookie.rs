//! Refresh token cookie handling.
//!
//! The refresh token travels only in an HTTP-only cookie; the access token
//! never does (it stays out of CSRF-exposed storage by living in the
//! response body and request headers). SameSite=None because the API and
//! the browser frontend are deployed on different origins.

use axum::http::header;

/// Default refresh cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "jwt";

/// Cookie name in partitioned-cookie (CHIPS) deployments, which require the
/// `__Host-` prefix.
pub const PARTITIONED_COOKIE_NAME: &str = "__Host-jwt";

/// Refresh cookie max age: 1 year.
pub const COOKIE_MAX_AGE_SECS: u64 = 31536000;

/// Deployment-dependent cookie configuration. Collaborators treat the cookie
/// name as configuration, not behavior.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: &'static str,
    pub secure: bool,
    pub partitioned: bool,
}

impl CookieConfig {
    /// Standard configuration: cookie named `jwt`.
    pub fn new(secure: bool) -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME,
            secure,
            partitioned: false,
        }
    }

    /// Partitioned-cookie configuration: `__Host-jwt`, always Secure.
    pub fn partitioned() -> Self {
        Self {
            name: PARTITIONED_COOKIE_NAME,
            secure: true,
            partitioned: true,
        }
    }

    fn suffix(&self) -> String {
        let mut s = String::from("; HttpOnly; SameSite=None; Path=/");
        if self.secure {
            s.push_str("; Secure");
        }
        if self.partitioned {
            s.push_str("; Partitioned");
        }
        s
    }

    /// Build a `Set-Cookie` value carrying the refresh token.
    pub fn set(&self, token: &str) -> String {
        format!(
            "{}={}; Max-Age={}{}",
            self.name,
            token,
            COOKIE_MAX_AGE_SECS,
            self.suffix()
        )
    }

    /// Build a `Set-Cookie` value that clears the refresh cookie.
    pub fn clear(&self) -> String {
        format!("{}=; Max-Age=0{}", self.name, self.suffix())
    }
}

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}
