//! Shared-password gate and session tokens.
//!
//! Tokens are compact HS256 JWTs carrying `{authenticated, iat, exp}`,
//! signed with the server's session secret.

use crate::errors::{AppError, AuthFailure};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;
/// Lifetime as reported to clients in the login response.
pub const SESSION_TTL_LABEL: &str = "24h";

const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub authenticated: bool,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenHeader {
    alg: String,
}

#[derive(Clone)]
pub struct SessionAuthority {
    password: String,
    secret: Vec<u8>,
}

impl fmt::Debug for SessionAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAuthority")
            .field("password", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl SessionAuthority {
    pub fn new(password: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            password: password.into(),
            secret: secret.into(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|err| AppError::Configuration(format!("session secret unusable: {err}")))
    }

    /// Compare MACs of both passwords so the check does not leak timing.
    fn password_matches(&self, candidate: &str) -> Result<bool, AppError> {
        let mut expected = self.mac()?;
        expected.update(self.password.as_bytes());
        let expected = expected.finalize().into_bytes();

        let mut provided = self.mac()?;
        provided.update(candidate.as_bytes());
        Ok(provided.verify_slice(&expected).is_ok())
    }

    /// Exchange the shared password for a session token.
    pub fn login(&self, password: &str) -> Result<String, AppError> {
        if password.is_empty() {
            return Err(AppError::validation("password is required"));
        }
        if !self.password_matches(password)? {
            return Err(AppError::Auth(AuthFailure::WrongPassword));
        }
        self.issue_at(Utc::now())
    }

    pub fn issue_at(&self, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = SessionClaims {
            authenticated: true,
            iat: now.timestamp(),
            exp: now.timestamp() + SESSION_TTL_SECS,
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|err| AppError::Configuration(format!("encoding session claims: {err}")))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    pub fn validate(&self, token: &str) -> Result<SessionClaims, AppError> {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AppError> {
        let invalid = || AppError::Auth(AuthFailure::InvalidToken);

        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;
        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let header: TokenHeader = URL_SAFE_NO_PAD
            .decode(header)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(invalid)?;
        if header.alg != "HS256" {
            return Err(invalid());
        }

        let claims: SessionClaims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(invalid)?;
        if !claims.authenticated {
            return Err(invalid());
        }
        if claims.exp <= now.timestamp() {
            return Err(AppError::Auth(AuthFailure::ExpiredToken));
        }
        Ok(claims)
    }
}
