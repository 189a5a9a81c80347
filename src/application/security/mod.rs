//! Credential primitives: password hashing, access tokens and API key digests.

pub mod api_keys;
pub mod jwt;
pub mod password;

pub use api_keys::ApiKeyHasher;
pub use jwt::{
    Claims, IssuedToken, MAX_TOKEN_TTL_MINUTES, TokenCodec, TokenError, parse_algorithm,
};
pub use password::{dummy_hash_ready, hash_password, verify_dummy_password, verify_password};
