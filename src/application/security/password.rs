//! Argon2id password hashing.
//!
//! Hashing is CPU-bound and deliberately slow, so both operations run on the
//! blocking thread pool instead of an async worker thread.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::error::AppError;

/// Hashes a password into a PHC string (`$argon2id$...`).
///
/// # Errors
///
/// Returns [`AppError::Internal`] if hashing fails or the blocking task panics.
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();

    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                AppError::internal("Failed to hash password", json!({ "reason": e.to_string() }))
            })
    })
    .await
    .map_err(|e| AppError::internal("Password hashing task failed", json!({ "reason": e.to_string() })))?
}

/// Checks `password` against a stored PHC hash.
///
/// A stored hash that cannot be parsed never matches.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if the blocking task panics.
pub async fn verify_password(password: &str, hashed: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let hashed = hashed.to_owned();

    tokio::task::spawn_blocking(move || {
        let parsed = match PasswordHash::new(&hashed) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored password hash is malformed");
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| {
        AppError::internal("Password verification task failed", json!({ "reason": e.to_string() }))
    })
}

static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

/// Runs a full verification against a throwaway hash.
///
/// Used when no account matches a login so that an unknown email costs the
/// same Argon2 work as a wrong password.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if hashing fails or a blocking task panics.
pub async fn verify_dummy_password(password: &str) -> Result<(), AppError> {
    let hash = DUMMY_HASH
        .get_or_try_init(|| hash_password("no-such-account"))
        .await?;
    verify_password(password, hash).await?;
    Ok(())
}

/// Whether [`verify_dummy_password`] has run at least once.
pub fn dummy_hash_ready() -> bool {
    DUMMY_HASH.initialized()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(verify_password("correct horse battery", &hash).await.unwrap());
        assert!(!verify_password("wrong password", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let first = hash_password("same-password").await.unwrap();
        let second = hash_password("same-password").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string").await.unwrap());
    }

    #[tokio::test]
    async fn test_dummy_verification_does_argon2_work() {
        let start = std::time::Instant::now();
        verify_dummy_password("whatever").await.unwrap();

        assert!(dummy_hash_ready());
        assert!(start.elapsed() >= std::time::Duration::from_millis(1));
    }
}
