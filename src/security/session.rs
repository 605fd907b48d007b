//! Session credential decoding.
//!
//! The `session` cookie carries a JWT-shaped token. Decoding is local: the
//! payload segment is read directly, or verified as HS256 first when a shared
//! secret is configured. Every failure collapses to a [`SessionError`], which
//! callers treat as "no session".

use base64::{engine::general_purpose, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session credential absent")]
    Absent,

    #[error("session credential malformed: {reason}")]
    Malformed { reason: String },

    #[error("session credential expired at {expired_at}")]
    Expired { expired_at: i64 },
}

fn malformed(reason: impl Into<String>) -> SessionError {
    SessionError::Malformed {
        reason: reason.into(),
    }
}

/// Identifiers arrive as numbers or strings depending on the issuing backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimId::Number(n) => write!(f, "{n}"),
            ClaimId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ClaimId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<ClaimId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64,
}

/// A session that passed decoding and was unexpired when it was checked.
/// Lives only as long as the request it was decoded for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedSession {
    pub claims: SessionClaims,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl DecodedSession {
    /// The user identifier, when the issuer included one.
    pub fn subject(&self) -> Option<String> {
        self.claims.id.as_ref().map(ToString::to_string)
    }

    /// Seconds left before expiry, never negative.
    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

#[derive(Clone)]
pub struct SessionDecoder {
    key: Option<DecodingKey>,
}

impl fmt::Debug for SessionDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDecoder")
            .field("verifies_signature", &self.key.is_some())
            .finish()
    }
}

impl SessionDecoder {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret.map(|s| DecodingKey::from_secret(s.as_bytes())),
        }
    }

    /// Decode against the current wall clock.
    pub fn decode(&self, token: Option<&str>) -> Result<DecodedSession, SessionError> {
        self.decode_at(token, Utc::now().timestamp())
    }

    /// Decode against `now` (seconds since epoch). A token is valid only while `now < exp`.
    pub fn decode_at(&self, token: Option<&str>, now: i64) -> Result<DecodedSession, SessionError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or(SessionError::Absent)?;

        let claims = match &self.key {
            Some(key) => verify_claims(token, key)?,
            None => read_claims(token)?,
        };

        if now >= claims.exp {
            return Err(SessionError::Expired {
                expired_at: claims.exp,
            });
        }

        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or_else(|| malformed("exp out of range"))?;
        let issued_at = claims.iat.and_then(|iat| DateTime::from_timestamp(iat, 0));

        Ok(DecodedSession {
            claims,
            issued_at,
            expires_at,
        })
    }
}

fn read_claims(token: &str) -> Result<SessionClaims, SessionError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(malformed("expected three dot-separated segments")),
    };

    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| malformed(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes).map_err(|e| malformed(format!("payload is not a claim set: {e}")))
}

fn verify_claims(token: &str, key: &DecodingKey) -> Result<SessionClaims, SessionError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked by the caller with zero leeway.
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<SessionClaims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| malformed(format!("signature check failed: {e}")))
}
