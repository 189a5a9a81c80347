//! DTOs for registration, login and API keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::application::security::IssuedToken;
use crate::application::services::{CreatedApiKey, Registration};
use crate::domain::entities::ApiKey;

/// Request body for `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(max = 200))]
    pub full_name: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(request: RegisterRequest) -> Self {
        Self {
            email: request.email,
            password: request.password,
            full_name: request.full_name,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 320))]
    pub email: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the token expires.
    pub expires_in: i64,
}

impl From<IssuedToken> for TokenResponse {
    fn from(token: IssuedToken) -> Self {
        Self {
            access_token: token.access_token,
            token_type: "bearer",
            expires_in: token.expires_in,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// The raw `key` is only ever returned in this response.
#[derive(Debug, Serialize)]
pub struct ApiKeyCreatedResponse {
    pub id: i64,
    pub name: String,
    pub key: String,
    pub created_at: DateTime<Utc>,
}

impl From<CreatedApiKey> for ApiKeyCreatedResponse {
    fn from(created: CreatedApiKey) -> Self {
        Self {
            id: created.key.id,
            name: created.key.name,
            key: created.raw_key,
            created_at: created.key.created_at,
        }
    }
}

/// An API key as listed to its owner. The raw key is never included.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: i64,
    pub name: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            last_used_at: key.last_used_at,
            revoked_at: key.revoked_at,
            created_at: key.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: None,
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(register("ada@example.com", "long-enough").validate().is_ok());
        assert!(register("not-an-email", "long-enough").validate().is_err());
        assert!(register("ada@example.com", "short").validate().is_err());
        assert!(register("ada@example.com", &"x".repeat(129)).validate().is_err());
    }
}
