//! Session cookies.
//!
//! Translates issued tokens into `Set-Cookie` values. Every cookie is
//! `Path=/` and `SameSite=Strict`; `Secure` follows the production switch.
//! `csrf_token` is the only cookie client script may read.

use axum::http::header::{Entry, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::session::token::{TokenKind, TokenPair};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const CSRF_TOKEN_COOKIE: &str = "csrf_token";
pub const UPLOAD_KEY_COOKIE: &str = "upload_key";

/// Lifetime of the CSRF and upload-key cookies.
pub const CSRF_COOKIE_MAX_AGE: Duration = Duration::days(1);

/// Builds the cookies that carry session state to the client.
#[derive(Debug, Clone, Copy)]
pub struct SessionCookies {
    secure: bool,
}

impl SessionCookies {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    /// `access_token` and `refresh_token`, HttpOnly, aged to the token lifetimes.
    pub fn session(&self, pair: &TokenPair) -> [Cookie<'static>; 2] {
        [
            self.build(
                ACCESS_TOKEN_COOKIE,
                pair.access_token.clone(),
                true,
                lifetime(TokenKind::Access),
            ),
            self.build(
                REFRESH_TOKEN_COOKIE,
                pair.refresh_token.clone(),
                true,
                lifetime(TokenKind::Refresh),
            ),
        ]
    }

    /// `csrf_token`, readable by script so it can be echoed in a header.
    pub fn csrf(&self, token: &str) -> Cookie<'static> {
        self.build(CSRF_TOKEN_COOKIE, token.to_string(), false, CSRF_COOKIE_MAX_AGE)
    }

    /// `upload_key`, the static shared key for the upload endpoint.
    pub fn upload_key(&self, key: &str) -> Cookie<'static> {
        self.build(UPLOAD_KEY_COOKIE, key.to_string(), true, CSRF_COOKIE_MAX_AGE)
    }

    /// Removal cookies for the token pair.
    pub fn clear_session(&self) -> [Cookie<'static>; 2] {
        [
            self.removal(ACCESS_TOKEN_COOKIE, true),
            self.removal(REFRESH_TOKEN_COOKIE, true),
        ]
    }

    /// Removal cookies for everything set at login.
    pub fn clear_all(&self) -> [Cookie<'static>; 4] {
        let [access, refresh] = self.clear_session();
        [
            access,
            refresh,
            self.removal(CSRF_TOKEN_COOKIE, false),
            self.removal(UPLOAD_KEY_COOKIE, true),
        ]
    }

    fn build(
        &self,
        name: &'static str,
        value: String,
        http_only: bool,
        max_age: Duration,
    ) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(http_only)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(max_age)
            .build()
    }

    fn removal(&self, name: &'static str, http_only: bool) -> Cookie<'static> {
        let mut cookie = self.build(name, String::new(), http_only, Duration::ZERO);
        cookie.make_removal();
        cookie
    }
}

fn lifetime(kind: TokenKind) -> Duration {
    Duration::seconds(kind.ttl().as_secs() as i64)
}

/// Add cookies to a jar returned from a handler.
pub fn add_all<I>(jar: CookieJar, cookies: I) -> CookieJar
where
    I: IntoIterator<Item = Cookie<'static>>,
{
    cookies.into_iter().fold(jar, |jar, cookie| jar.add(cookie))
}

/// Append `Set-Cookie` headers to a response produced further down the chain.
pub fn append_set_cookies<I>(headers: &mut HeaderMap, cookies: I)
where
    I: IntoIterator<Item = Cookie<'static>>,
{
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!(cookie = cookie.name(), error = %e, "Unencodable cookie"),
        }
    }
}

/// Insert `Set-Cookie` headers ahead of those already on the response, so a
/// handler's own cookies (a logout's removals, say) take precedence.
pub fn prepend_set_cookies<I>(headers: &mut HeaderMap, cookies: I)
where
    I: IntoIterator<Item = Cookie<'static>>,
{
    let existing: Vec<HeaderValue> = match headers.entry(SET_COOKIE) {
        Entry::Occupied(entry) => entry.remove_entry_mult().1.collect(),
        Entry::Vacant(_) => Vec::new(),
    };
    append_set_cookies(headers, cookies);
    for value in existing {
        headers.append(SET_COOKIE, value);
    }
}

/// Read a non-empty cookie value from request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    fn pair() -> TokenPair {
        TokenPair {
            access_token: "acc".into(),
            refresh_token: "ref".into(),
        }
    }

    #[test]
    fn session_cookie_attributes() {
        let [access, refresh] = SessionCookies::new(true).session(&pair());

        assert_eq!(access.name(), ACCESS_TOKEN_COOKIE);
        assert_eq!(access.value(), "acc");
        assert_eq!(access.path(), Some("/"));
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Strict));
        assert_eq!(access.max_age(), Some(Duration::seconds(900)));

        assert_eq!(refresh.name(), REFRESH_TOKEN_COOKIE);
        assert_eq!(refresh.max_age(), Some(Duration::seconds(604_800)));
        assert_eq!(refresh.http_only(), Some(true));
    }

    #[test]
    fn csrf_cookie_is_script_readable() {
        let cookie = SessionCookies::new(false).csrf("tok");

        assert_eq!(cookie.http_only(), Some(false));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(86_400)));
        assert!(!cookie.to_string().contains("HttpOnly"));
    }

    #[test]
    fn upload_key_cookie_is_http_only() {
        let cookie = SessionCookies::new(false).upload_key("key");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(86_400)));
    }

    #[test]
    fn clearing_expires_immediately() {
        for cookie in SessionCookies::new(true).clear_all() {
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
            assert_eq!(cookie.path(), Some("/"));
        }
    }

    #[test]
    fn appends_one_header_per_cookie() {
        let mut headers = HeaderMap::new();
        append_set_cookies(&mut headers, SessionCookies::new(false).session(&pair()));
        assert_eq!(headers.get_all(SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn prepended_cookies_come_first() {
        let factory = SessionCookies::new(false);
        let mut headers = HeaderMap::new();
        append_set_cookies(&mut headers, factory.clear_session());
        prepend_set_cookies(&mut headers, factory.session(&pair()));

        let values: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(values.len(), 4);
        assert!(values[0].starts_with("access_token=acc"));
        assert!(values[1].starts_with("refresh_token=ref"));
        assert!(values[2].starts_with("access_token=;"));
        assert!(values[3].starts_with("refresh_token=;"));
    }

    #[test]
    fn reads_cookie_values() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("access_token=abc; csrf_token="));

        assert_eq!(read_cookie(&headers, ACCESS_TOKEN_COOKIE).as_deref(), Some("abc"));
        assert_eq!(read_cookie(&headers, CSRF_TOKEN_COOKIE), None);
        assert_eq!(read_cookie(&headers, REFRESH_TOKEN_COOKIE), None);
    }
}
