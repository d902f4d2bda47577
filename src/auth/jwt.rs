//! Session token verification
//!
//! The identity provider signs a short-lived HS256 token carrying the user id
//! (`sub`) and profile fields. We only verify it and turn it into a `Caller`;
//! `issue` exists for dev mode and tests.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::auth::session::{Caller, SessionContext};
use crate::config::MIN_SECRET_LEN;
use crate::error::JournalError;

/// Payload stored in the session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User identifier from the identity provider
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl From<SessionClaims> for SessionContext {
    fn from(claims: SessionClaims) -> Self {
        SessionContext::new(claims.sub).with_profile(claims.email, claims.name, claims.picture)
    }
}

/// Verifies session tokens signed with the shared secret
#[derive(Clone)]
pub struct SessionVerifier {
    secret: String,
    expiry_seconds: u64,
}

impl SessionVerifier {
    /// Create a verifier; rejects empty or short secrets
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, JournalError> {
        if secret.is_empty() {
            return Err(JournalError::Config("session secret is required".into()));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(JournalError::Config(format!(
                "session secret must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Mint a token for a session (dev mode, tests)
    pub fn issue(&self, session: &SessionContext) -> Result<String, JournalError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| JournalError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let claims = SessionClaims {
            sub: session.user_id.clone(),
            email: session.email.clone(),
            name: session.name.clone(),
            picture: session.image.clone(),
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| JournalError::Internal(format!("Failed to sign session token: {}", e)))
    }

    /// Verify a token. Anything invalid is simply an anonymous caller.
    pub fn verify(&self, token: &str) -> Caller {
        match decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(data) => Caller::from_session(data.claims.into()),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "token expired",
                    ErrorKind::InvalidSignature => "invalid signature",
                    ErrorKind::InvalidToken => "invalid token",
                    _ => "token validation failed",
                };
                debug!(reason, "Rejected session token");
                Caller::Anonymous
            }
        }
    }

    /// Resolve the caller from an Authorization header and/or a cookie header
    pub fn caller_from_headers(
        &self,
        authorization: Option<&str>,
        cookie_header: Option<&str>,
        cookie_name: &str,
    ) -> Caller {
        extract_bearer_token(authorization)
            .or_else(|| extract_cookie(cookie_header, cookie_name))
            .map(|token| self.verify(token))
            .unwrap_or_default()
    }
}

/// Extract token from an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Extract a named cookie value from a `Cookie` header
pub fn extract_cookie<'a>(cookie_header: Option<&'a str>, name: &str) -> Option<&'a str> {
    cookie_header?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
