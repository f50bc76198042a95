//! Route classes the admission stages agree on.

pub const API_PREFIX: &str = "/api/";

pub const LOGIN_PATH: &str = "/api/login";
pub const LOGOUT_PATH: &str = "/api/logout";
pub const VERIFY_PATH: &str = "/api/verify";
pub const REFRESH_PATH: &str = "/api/refresh";
pub const UPLOAD_PATH: &str = "/api/upload";

/// API paths reachable without a session.
pub const PUBLIC_API_PATHS: [&str; 4] = [LOGIN_PATH, VERIFY_PATH, REFRESH_PATH, UPLOAD_PATH];

/// Unsafe-method paths that skip the CSRF check. Login has no token to echo
/// yet and uploads authenticate with the upload key.
pub const CSRF_EXEMPT_PATHS: [&str; 2] = [LOGIN_PATH, UPLOAD_PATH];

pub fn is_api(path: &str) -> bool {
    path.starts_with(API_PREFIX)
}

pub fn is_public_api(path: &str) -> bool {
    PUBLIC_API_PATHS.contains(&path)
}

pub fn is_csrf_exempt(path: &str) -> bool {
    CSRF_EXEMPT_PATHS.contains(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_exact() {
        assert!(is_api("/api/list"));
        assert!(!is_api("/api"));
        assert!(!is_api("/dashboard"));

        assert!(is_public_api("/api/login"));
        assert!(!is_public_api("/api/login/"));
        assert!(!is_public_api("/api/logout"));

        assert!(is_csrf_exempt("/api/upload"));
        assert!(!is_csrf_exempt("/api/refresh"));
    }
}
