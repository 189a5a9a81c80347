//! Authentication: password login, JWT access tokens and API keys.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::permissions::require_owner_or_admin;
use crate::application::security::{ApiKeyHasher, Claims, IssuedToken, TokenCodec, TokenError};
use crate::application::services::UserService;
use crate::domain::entities::{ApiKey, NewApiKey, User};
use crate::domain::repositories::{ApiKeyRepository, UserRepository};
use crate::error::AppError;
use crate::utils::key_generator::generate_api_key;

/// A newly created API key. `raw_key` is never retrievable again.
#[derive(Debug, Clone)]
pub struct CreatedApiKey {
    pub key: ApiKey,
    pub raw_key: String,
}

/// Service for authenticating requests via Bearer tokens or API keys.
///
/// API keys are hashed with HMAC-SHA256 (keyed by the server secret) before
/// storage and comparison.
pub struct AuthService<
    U: ?Sized + UserRepository = dyn UserRepository,
    K: ?Sized + ApiKeyRepository = dyn ApiKeyRepository,
> {
    users: UserService<U>,
    api_keys: Arc<K>,
    tokens: TokenCodec,
    hasher: ApiKeyHasher,
}

impl<U, K> AuthService<U, K>
where
    U: ?Sized + UserRepository,
    K: ?Sized + ApiKeyRepository,
{
    pub fn new(users: Arc<U>, api_keys: Arc<K>, tokens: TokenCodec, hasher: ApiKeyHasher) -> Self {
        Self {
            users: UserService::new(users),
            api_keys,
            tokens,
            hasher,
        }
    }

    /// Exchanges credentials for an access token.
    ///
    /// # Errors
    ///
    /// See [`UserService::authenticate`].
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AppError> {
        let user = self.users.authenticate(email, password).await?;
        debug!(user_id = user.id, "User logged in");
        self.issue_token(&user)
    }

    pub fn issue_token(&self, user: &User) -> Result<IssuedToken, AppError> {
        self.tokens.issue(user).map_err(|e| {
            AppError::internal("Failed to issue access token", json!({ "reason": e.to_string() }))
        })
    }

    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] for expired, tampered or malformed tokens.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        self.tokens.verify(token).map_err(|e| match e {
            TokenError::Expired => {
                AppError::unauthorized("Token has expired", json!({ "reason": "expired" }))
            }
            other => {
                debug!(error = %other, "Rejected access token");
                AppError::unauthorized("Invalid token", json!({ "reason": "invalid" }))
            }
        })
    }

    /// Resolves a Bearer token to the active user it was issued for.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] if the token is invalid or its user
    /// no longer exists, and [`AppError::Forbidden`] if the user is inactive.
    pub async fn resolve_bearer(&self, token: &str) -> Result<User, AppError> {
        let claims = self.verify_token(token)?;
        let user_id = claims.user_id().ok_or_else(|| {
            AppError::unauthorized("Invalid token", json!({ "reason": "invalid subject" }))
        })?;

        self.active_user(user_id).await
    }

    /// Creates an API key for `user` and returns the raw key once.
    pub async fn create_api_key(&self, user: &User, name: String) -> Result<CreatedApiKey, AppError> {
        let raw_key = generate_api_key();

        let key = self
            .api_keys
            .create(NewApiKey {
                user_id: user.id,
                name,
                key_hash: self.hasher.digest(&raw_key),
            })
            .await?;

        Ok(CreatedApiKey { key, raw_key })
    }

    /// Every key `user` owns, revoked ones included, oldest first.
    pub async fn list_api_keys(&self, user: &User) -> Result<Vec<ApiKey>, AppError> {
        self.api_keys.list_for_user(user.id).await
    }

    /// Revokes an API key on behalf of `actor`.
    ///
    /// Owners may revoke their own keys and admins any key. Revoking a key
    /// twice returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown id and
    /// [`AppError::Forbidden`] if `actor` neither owns the key nor is an admin.
    pub async fn revoke_api_key(&self, actor: &User, id: i64) -> Result<ApiKey, AppError> {
        let key = self.find_api_key(id).await?;
        require_owner_or_admin(actor, key.user_id, "API key")?;
        self.revoke(key).await
    }

    /// Revokes an API key without an acting user, for operator tooling.
    pub async fn revoke_api_key_by_id(&self, id: i64) -> Result<ApiKey, AppError> {
        let key = self.find_api_key(id).await?;
        self.revoke(key).await
    }

    async fn find_api_key(&self, id: i64) -> Result<ApiKey, AppError> {
        self.api_keys
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("API key not found", json!({ "id": id })))
    }

    async fn revoke(&self, key: ApiKey) -> Result<ApiKey, AppError> {
        if key.is_revoked() {
            return Ok(key);
        }

        match self.api_keys.revoke(key.id, Utc::now()).await? {
            Some(revoked) => {
                info!(key_id = revoked.id, user_id = revoked.user_id, "API key revoked");
                Ok(revoked)
            }
            // A concurrent call got there first.
            None => self.find_api_key(key.id).await,
        }
    }

    /// Resolves a raw API key to the active user that owns it.
    ///
    /// On success, records the time of use. A failure to record it is logged
    /// and does not reject the request.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] if the key is unknown or revoked.
    pub async fn resolve_api_key(&self, raw_key: &str) -> Result<User, AppError> {
        let key_hash = self.hasher.digest(raw_key);

        let key = self
            .api_keys
            .find_active_by_hash(&key_hash)
            .await?
            .ok_or_else(|| {
                AppError::unauthorized(
                    "Unauthorized",
                    json!({ "reason": "Invalid or revoked API key" }),
                )
            })?;

        if let Err(e) = self.api_keys.touch(key.id, Utc::now()).await {
            warn!(key_id = key.id, error = %e, "Failed to record API key use");
        }

        self.active_user(key.user_id).await
    }

    async fn active_user(&self, user_id: i64) -> Result<User, AppError> {
        let user = match self.users.get(user_id).await {
            Ok(user) => user,
            Err(AppError::NotFound { .. }) => {
                return Err(AppError::unauthorized(
                    "Unauthorized",
                    json!({ "reason": "User no longer exists" }),
                ));
            }
            Err(e) => return Err(e),
        };

        if !user.is_active {
            return Err(AppError::forbidden(
                "User account is inactive",
                json!({ "id": user.id }),
            ));
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::permissions::test_user;
    use crate::domain::entities::Role;
    use crate::domain::repositories::{MockApiKeyRepository, MockUserRepository};
    use jsonwebtoken::Algorithm;

    fn hasher() -> ApiKeyHasher {
        ApiKeyHasher::new("test-api-key-secret").unwrap()
    }

    fn codec() -> TokenCodec {
        TokenCodec::new("test-jwt-secret", Algorithm::HS256, 30)
    }

    fn api_key(id: i64, user_id: i64, key_hash: String) -> ApiKey {
        let now = Utc::now();
        ApiKey {
            id,
            user_id,
            name: "ci".to_string(),
            key_hash,
            last_used_at: None,
            revoked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(users: MockUserRepository, keys: MockApiKeyRepository) -> AuthService<MockUserRepository, MockApiKeyRepository> {
        AuthService::new(Arc::new(users), Arc::new(keys), codec(), hasher())
    }

    #[tokio::test]
    async fn test_bearer_round_trip() {
        let mut users = MockUserRepository::new();
        users
            .expect_get()
            .withf(|id| *id == 7)
            .returning(|id| Ok(Some(test_user(id, vec![Role::User]))));

        let service = service(users, MockApiKeyRepository::new());
        let token = service.issue_token(&test_user(7, vec![Role::User])).unwrap();

        let user = service.resolve_bearer(&token.access_token).await.unwrap();
        assert_eq!(user.id, 7);
    }

    #[tokio::test]
    async fn test_bearer_for_deleted_user_is_unauthorized() {
        let mut users = MockUserRepository::new();
        users.expect_get().returning(|_| Ok(None));

        let service = service(users, MockApiKeyRepository::new());
        let token = service.issue_token(&test_user(7, vec![Role::User])).unwrap();

        assert!(matches!(
            service.resolve_bearer(&token.access_token).await,
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_bearer_for_inactive_user_is_forbidden() {
        let mut users = MockUserRepository::new();
        users.expect_get().returning(|id| {
            let mut user = test_user(id, vec![Role::User]);
            user.is_active = false;
            Ok(Some(user))
        });

        let service = service(users, MockApiKeyRepository::new());
        let token = service.issue_token(&test_user(7, vec![Role::User])).unwrap();

        assert!(matches!(
            service.resolve_bearer(&token.access_token).await,
            Err(AppError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let service = service(MockUserRepository::new(), MockApiKeyRepository::new());
        let stale = codec()
            .issue_at(
                &test_user(7, vec![Role::User]),
                Utc::now() - chrono::Duration::minutes(45),
            )
            .unwrap();

        let err = service.verify_token(&stale.access_token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
        assert_eq!(err.to_string(), "Token has expired");
    }

    #[tokio::test]
    async fn test_create_api_key_stores_only_digest() {
        let mut keys = MockApiKeyRepository::new();
        keys.expect_create()
            .withf(|new_key| new_key.user_id == 7 && new_key.key_hash.len() == 64)
            .times(1)
            .returning(|new_key| Ok(api_key(1, new_key.user_id, new_key.key_hash)));

        let service = service(MockUserRepository::new(), keys);
        let created = service
            .create_api_key(&test_user(7, vec![Role::User]), "ci".to_string())
            .await
            .unwrap();

        assert_ne!(created.raw_key, created.key.key_hash);
        assert_eq!(created.key.key_hash, hasher().digest(&created.raw_key));
    }

    #[tokio::test]
    async fn test_resolve_api_key_touches_key() {
        let raw_key = "imk_test-key";
        let expected_hash = hasher().digest(raw_key);

        let mut keys = MockApiKeyRepository::new();
        let stored_hash = expected_hash.clone();
        keys.expect_find_active_by_hash()
            .withf(move |hash| hash == &expected_hash)
            .times(1)
            .returning(move |_| Ok(Some(api_key(3, 7, stored_hash.clone()))));
        keys.expect_touch()
            .withf(|id, _| *id == 3)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut users = MockUserRepository::new();
        users
            .expect_get()
            .returning(|id| Ok(Some(test_user(id, vec![Role::User]))));

        let service = service(users, keys);
        assert_eq!(service.resolve_api_key(raw_key).await.unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_owner_revokes_own_key() {
        let mut keys = MockApiKeyRepository::new();
        keys.expect_get()
            .returning(|id| Ok(Some(api_key(id, 7, "digest".to_string()))));
        keys.expect_revoke()
            .withf(|id, _| *id == 3)
            .times(1)
            .returning(|id, at| {
                let mut key = api_key(id, 7, "digest".to_string());
                key.revoked_at = Some(at);
                Ok(Some(key))
            });

        let service = service(MockUserRepository::new(), keys);
        let revoked = service
            .revoke_api_key(&test_user(7, vec![Role::User]), 3)
            .await
            .unwrap();
        assert!(revoked.is_revoked());
    }

    #[tokio::test]
    async fn test_stranger_cannot_revoke_key() {
        let mut keys = MockApiKeyRepository::new();
        keys.expect_get()
            .returning(|id| Ok(Some(api_key(id, 7, "digest".to_string()))));
        keys.expect_revoke().never();

        let service = service(MockUserRepository::new(), keys);
        assert!(matches!(
            service.revoke_api_key(&test_user(8, vec![Role::User]), 3).await,
            Err(AppError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_admin_revokes_any_key() {
        let mut keys = MockApiKeyRepository::new();
        keys.expect_get()
            .returning(|id| Ok(Some(api_key(id, 7, "digest".to_string()))));
        keys.expect_revoke().times(1).returning(|id, at| {
            let mut key = api_key(id, 7, "digest".to_string());
            key.revoked_at = Some(at);
            Ok(Some(key))
        });

        let service = service(MockUserRepository::new(), keys);
        let admin = test_user(1, vec![Role::User, Role::Admin]);
        assert!(service.revoke_api_key(&admin, 3).await.unwrap().is_revoked());
    }

    #[tokio::test]
    async fn test_revoking_twice_keeps_first_timestamp() {
        let first = Utc::now() - chrono::Duration::hours(1);
        let mut keys = MockApiKeyRepository::new();
        keys.expect_get().returning(move |id| {
            let mut key = api_key(id, 7, "digest".to_string());
            key.revoked_at = Some(first);
            Ok(Some(key))
        });
        keys.expect_revoke().never();

        let service = service(MockUserRepository::new(), keys);
        let key = service.revoke_api_key_by_id(3).await.unwrap();
        assert_eq!(key.revoked_at, Some(first));
    }

    #[tokio::test]
    async fn test_revoke_unknown_key_is_not_found() {
        let mut keys = MockApiKeyRepository::new();
        keys.expect_get().returning(|_| Ok(None));

        let service = service(MockUserRepository::new(), keys);
        assert!(matches!(
            service.revoke_api_key_by_id(99).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_api_key_is_unauthorized() {
        let mut keys = MockApiKeyRepository::new();
        keys.expect_find_active_by_hash().returning(|_| Ok(None));
        keys.expect_touch().never();

        let service = service(MockUserRepository::new(), keys);
        assert!(matches!(
            service.resolve_api_key("imk_nope").await,
            Err(AppError::Unauthorized { .. })
        ));
    }
}
