//! JWT access token issuance and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::entities::{Role, User};

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub roles: Vec<Role>,
}

impl Claims {
    /// Parses the subject back into a user id.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// A freshly issued access token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: i64,
}

/// Parses a JWT algorithm name. Only the HMAC family is accepted.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, TokenError> {
    match Algorithm::from_str(name) {
        Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(alg),
        _ => Err(TokenError::Invalid(format!(
            "unsupported algorithm '{}', expected HS256, HS384 or HS512",
            name
        ))),
    }
}

/// Longest accepted token lifetime, one year.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 525_600;

/// Signs and verifies access tokens with a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl TokenCodec {
    /// `ttl_minutes` is clamped to `1..=MAX_TOKEN_TTL_MINUTES`.
    pub fn new(secret: &str, algorithm: Algorithm, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            ttl: Duration::minutes(ttl_minutes.clamp(1, MAX_TOKEN_TTL_MINUTES)),
        }
    }

    /// Token lifetime in seconds.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Issues a token for `user` valid from now.
    pub fn issue(&self, user: &User) -> Result<IssuedToken, TokenError> {
        self.issue_at(user, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let claims = Claims {
            sub: user.id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            roles: user.roles.clone(),
        };

        let access_token = encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            expires_in: self.ttl_seconds(),
        })
    }

    /// Verifies signature, algorithm and expiry; no leeway is granted.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
