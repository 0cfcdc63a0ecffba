use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wayfare_core::UserId;

use crate::IdentityResolver;

/// Access-token claims model (transport-agnostic).
///
/// This is the minimal set of claims the backend's auth service puts in a
/// session token: subject plus the standard numeric time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the acting user.
    pub sub: UserId,

    /// Issued-at (seconds since epoch).
    pub iat: i64,

    /// Expiration (seconds since epoch).
    pub exp: i64,

    /// Backend role name (e.g. `authenticated`), if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl AccessClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

impl IdentityResolver for AccessClaims {
    fn current(&self) -> Option<UserId> {
        Some(self.sub)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("token could not be decoded: {0}")]
    Malformed(String),
}

/// Deterministically validate the claims' time window.
///
/// Signature verification happens in [`AccessTokenVerifier`] implementations.
pub fn validate_claims(claims: &AccessClaims, now: DateTime<Utc>) -> Result<(), ClaimsError> {
    if claims.exp <= claims.iat {
        return Err(ClaimsError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(ClaimsError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(ClaimsError::Expired);
    }
    Ok(())
}

/// Verifies a bearer token and yields its claims.
pub trait AccessTokenVerifier: Send + Sync {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, ClaimsError>;
}

/// HS256 shared-secret verifier (the backend signs session tokens with its JWT secret).
#[derive(Clone)]
pub struct Hs256Verifier {
    key: DecodingKey,
}

impl Hs256Verifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
        }
    }
}

impl AccessTokenVerifier for Hs256Verifier {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, ClaimsError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks run against the caller's clock in `validate_claims`.
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.key, &validation)
            .map_err(|e| ClaimsError::Malformed(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
