//! User registration, lookup and profile management.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use crate::application::security::{hash_password, verify_dummy_password, verify_password};
use crate::domain::crud::{Page, PageRequest};
use crate::domain::entities::{NewUser, Role, User, UserFilter, UserPatch};
use crate::domain::repositories::UserRepository;
use crate::error::AppError;

/// Input for registering a user. The password is plain text.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Profile changes. `password` is plain text and re-hashed before storage.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<Option<String>>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub roles: Option<Vec<Role>>,
}

/// Account management service.
///
/// Emails are normalized to lowercase on every path so that uniqueness is
/// case-insensitive.
pub struct UserService<R: ?Sized + UserRepository = dyn UserRepository> {
    repository: Arc<R>,
}

impl<R: ?Sized + UserRepository> UserService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Registers an active user with the `user` role.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the email is already registered.
    pub async fn register(&self, registration: Registration) -> Result<User, AppError> {
        self.register_with_roles(registration, vec![Role::User]).await
    }

    /// Registers an active user with explicit roles (used by the admin CLI).
    pub async fn register_with_roles(
        &self,
        registration: Registration,
        roles: Vec<Role>,
    ) -> Result<User, AppError> {
        let email = normalize_email(&registration.email);

        if self.repository.get_by_email(&email).await?.is_some() {
            return Err(email_taken(&email));
        }

        let new_user = NewUser {
            email,
            hashed_password: hash_password(&registration.password).await?,
            full_name: registration.full_name,
            is_active: true,
            roles,
        };

        // The unique index still guards against a concurrent registration.
        self.repository.create(new_user).await
    }

    /// Registers many users in one batch.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the batch repeats an email and
    /// [`AppError::Conflict`] if any email is already registered. Nothing is
    /// written in either case.
    pub async fn bulk_register(&self, registrations: Vec<Registration>) -> Result<Vec<User>, AppError> {
        let mut seen = HashSet::new();
        let mut new_users = Vec::with_capacity(registrations.len());

        for registration in registrations {
            let email = normalize_email(&registration.email);
            if !seen.insert(email.clone()) {
                return Err(AppError::validation(
                    "Duplicate email in batch",
                    json!({ "email": email }),
                ));
            }

            new_users.push(NewUser {
                email,
                hashed_password: hash_password(&registration.password).await?,
                full_name: registration.full_name,
                is_active: true,
                roles: vec![Role::User],
            });
        }

        self.repository.bulk_create(new_users).await
    }

    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the user does not exist.
    pub async fn get(&self, id: i64) -> Result<User, AppError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found", json!({ "id": id })))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.repository.get_by_email(&normalize_email(email)).await
    }

    pub async fn list(&self, page: PageRequest, filter: UserFilter) -> Result<Page<User>, AppError> {
        self.repository.list(page, filter).await
    }

    pub async fn count(&self, filter: UserFilter) -> Result<i64, AppError> {
        self.repository.count(filter).await
    }

    /// Applies a partial profile update.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the user does not exist.
    pub async fn update(&self, id: i64, update: ProfileUpdate) -> Result<User, AppError> {
        let hashed_password = match update.password {
            Some(password) => Some(hash_password(&password).await?),
            None => None,
        };

        let patch = UserPatch {
            full_name: update.full_name,
            hashed_password,
            is_active: update.is_active,
            roles: update.roles,
        };

        self.repository.update(id, patch).await
    }

    /// Soft-removes a user.
    pub async fn deactivate(&self, id: i64) -> Result<User, AppError> {
        self.update(
            id,
            ProfileUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// Checks credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] for an unknown email or a wrong
    /// password (indistinguishably) and [`AppError::Forbidden`] if the account
    /// has been deactivated.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let invalid = || AppError::unauthorized("Invalid email or password", json!({}));

        let Some(user) = self.repository.get_by_email(&normalize_email(email)).await? else {
            verify_dummy_password(password).await?;
            return Err(invalid());
        };

        if !verify_password(password, &user.hashed_password).await? {
            return Err(invalid());
        }

        if !user.is_active {
            return Err(AppError::forbidden(
                "User account is inactive",
                json!({ "id": user.id }),
            ));
        }

        Ok(user)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn email_taken(email: &str) -> AppError {
    AppError::conflict("Email already registered", json!({ "email": email }))
}
