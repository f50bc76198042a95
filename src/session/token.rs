//! Signed session tokens.
//!
//! An access/refresh pair is issued at login and on every refresh. Tokens are
//! HS256 JWTs carrying the username and the token kind; nothing is stored
//! server-side, so validity is decided by signature and embedded timestamps
//! alone. A superseded token stays valid until its own `exp`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Lifetime of a refresh token.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Which context a token may be consumed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn ttl(self) -> Duration {
        match self {
            TokenKind::Access => ACCESS_TOKEN_TTL,
            TokenKind::Refresh => REFRESH_TOKEN_TTL,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims embedded in every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub username: String,
    pub token_type: TokenKind,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: u64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

impl TokenClaims {
    /// Build claims for `username` that expire `kind.ttl()` after `now`.
    pub fn new(username: &str, kind: TokenKind, now: u64) -> Self {
        Self {
            username: username.to_string(),
            token_type: kind,
            iat: now,
            exp: now + kind.ttl().as_secs(),
        }
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Errors that can occur issuing or validating tokens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The token's `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// The MAC did not verify, or the header named a non-HMAC algorithm.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token could not be parsed.
    #[error("malformed token")]
    Malformed,

    /// A valid token was presented where the other kind is required.
    #[error("expected {expected} token, got {found}")]
    WrongTokenType { expected: TokenKind, found: TokenKind },

    /// The signing primitive failed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Issues and validates session tokens with a single shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Only the HMAC family is accepted; anything else fails as InvalidAlgorithm.
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issue an access token (15 minutes) and a refresh token (7 days).
    pub fn issue_pair(&self, username: &str) -> Result<TokenPair, TokenError> {
        let now = unix_now();
        Ok(TokenPair {
            access_token: self.sign(&TokenClaims::new(username, TokenKind::Access, now))?,
            refresh_token: self.sign(&TokenClaims::new(username, TokenKind::Refresh, now))?,
        })
    }

    /// Sign arbitrary claims with HS256.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature and expiry and return the embedded claims.
    pub fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                _ => TokenError::Malformed,
            })
    }

    /// Validate and additionally require the token to be of `expected` kind.
    pub fn validate_kind(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<TokenClaims, TokenError> {
        let claims = self.validate(token)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongTokenType {
                expected,
                found: claims.token_type,
            });
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn service() -> TokenService {
        TokenService::new("unit-test-secret")
    }

    #[test]
    fn issued_pair_round_trips() {
        let svc = service();
        let pair = svc.issue_pair("alice").unwrap();

        let access = svc.validate(&pair.access_token).unwrap();
        assert_eq!(access.username, "alice");
        assert_eq!(access.token_type, TokenKind::Access);
        assert_eq!(access.exp - access.iat, 900);

        let refresh = svc.validate(&pair.refresh_token).unwrap();
        assert_eq!(refresh.username, "alice");
        assert_eq!(refresh.token_type, TokenKind::Refresh);
        assert_eq!(refresh.exp - refresh.iat, 604_800);
    }

    #[test]
    fn past_expiry_is_expired() {
        let svc = service();
        let now = unix_now();
        let claims = TokenClaims {
            username: "alice".into(),
            token_type: TokenKind::Access,
            iat: now - 1000,
            exp: now - 100,
        };
        let token = svc.sign(&claims).unwrap();

        assert_eq!(svc.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn other_secret_is_invalid_signature() {
        let pair = TokenService::new("another-secret").issue_pair("alice").unwrap();
        assert_eq!(
            service().validate(&pair.access_token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn tampered_payload_is_invalid_signature() {
        let svc = service();
        let pair = svc.issue_pair("alice").unwrap();
        let mut parts: Vec<String> = pair.access_token.split('.').map(String::from).collect();

        let now = unix_now();
        let forged = TokenClaims::new("mallory", TokenKind::Access, now);
        parts[1] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());

        assert_eq!(svc.validate(&parts.join(".")), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn non_hmac_algorithm_is_rejected() {
        let svc = service();
        let pair = svc.issue_pair("alice").unwrap();
        let mut parts: Vec<String> = pair.access_token.split('.').map(String::from).collect();
        parts[0] = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);

        assert_eq!(svc.validate(&parts.join(".")), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(service().validate("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(service().validate(""), Err(TokenError::Malformed));
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let svc = service();
        let pair = svc.issue_pair("alice").unwrap();

        assert_eq!(
            svc.validate_kind(&pair.refresh_token, TokenKind::Access),
            Err(TokenError::WrongTokenType {
                expected: TokenKind::Access,
                found: TokenKind::Refresh,
            })
        );
        assert_eq!(
            svc.validate_kind(&pair.access_token, TokenKind::Refresh),
            Err(TokenError::WrongTokenType {
                expected: TokenKind::Refresh,
                found: TokenKind::Access,
            })
        );
        assert!(svc.validate_kind(&pair.access_token, TokenKind::Access).is_ok());
    }
}
