//! Session token codec (HS256 JWT).
//!
//! Tokens are self-contained: the server keeps no record of issued tokens, so
//! a token stays valid until its `exp` passes. Every token lives for the
//! caller-supplied TTL plus [`TOKEN_GRACE_SECS`].

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::error::TokenError;

/// Environment variable holding the signing secret.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// Default `iss` claim.
pub const DEFAULT_ISSUER: &str = "sso_service";

/// Fixed extension added on top of every caller TTL (one hour).
pub const TOKEN_GRACE_SECS: i64 = 60 * 60;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub login: String,
    pub user_id: i64,
    /// Issued at (UTC timestamp)
    pub iat: i64,
    /// Expiration time (UTC timestamp)
    pub exp: i64,
    pub iss: String,
    /// Unique token id, so two tokens issued in the same second differ
    pub jti: String,
}

/// Symmetric signing key, loaded once at startup.
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(TokenError::SigningFailure);
        }
        Ok(Self(bytes))
    }

    /// Read the secret from an environment variable. Absent or empty fails.
    pub fn from_env(var: &str) -> Result<Self, TokenError> {
        let value = std::env::var(var).map_err(|_| TokenError::SigningFailure)?;
        Self::new(value.into_bytes())
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(***)")
    }
}

pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl TokenCodec {
    pub fn new(secret: SigningSecret, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(&secret.0),
            decoding_key: DecodingKey::from_secret(&secret.0),
            validation,
            issuer,
        }
    }

    /// Issue a token for `login`/`user_id`, valid for `ttl` plus the grace period.
    pub fn issue(&self, login: &str, user_id: i64, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(login, user_id, ttl, Utc::now())
    }

    fn issue_at(
        &self,
        login: &str,
        user_id: i64,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .and_then(|t| t.checked_add_signed(Duration::seconds(TOKEN_GRACE_SECS)))
            .ok_or(TokenError::SigningFailure)?;

        let claims = Claims {
            login: login.to_string(),
            user_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, user_id, "token signing failed");
            TokenError::SigningFailure
        })
    }

    /// Verify signature, issuer and expiry. Nothing from an unverified payload is returned.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                TokenError::InvalidToken
            })
    }
}
