//! DTOs for user profile and administration endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use validator::Validate;

use crate::api::dto::auth::RegisterRequest;
use crate::api::dto::pagination::PaginationParams;
use crate::application::services::ProfileUpdate;
use crate::domain::entities::{Role, User, UserFilter};

/// Public view of a user. The password hash is never exposed.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            is_active: user.is_active,
            roles: user.roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Request body for `PATCH /users/me`.
///
/// `full_name`: absent = no change, `null` = clear, value = set.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[validate(length(max = 200))]
    pub full_name: Option<Option<String>>,

    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}

impl From<UpdateMeRequest> for ProfileUpdate {
    fn from(request: UpdateMeRequest) -> Self {
        Self {
            full_name: request.full_name,
            password: request.password,
            ..Default::default()
        }
    }
}

/// Request body for `PATCH /users/{id}` (admin).
#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[validate(length(max = 200))]
    pub full_name: Option<Option<String>>,

    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,

    pub is_active: Option<bool>,

    #[validate(length(min = 1))]
    pub roles: Option<Vec<Role>>,
}

impl From<AdminUpdateUserRequest> for ProfileUpdate {
    fn from(request: AdminUpdateUserRequest) -> Self {
        Self {
            full_name: request.full_name,
            password: request.password,
            is_active: request.is_active,
            roles: request.roles,
        }
    }
}

/// Request body for `POST /users/bulk`.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkUsersRequest {
    #[validate(length(min = 1, max = 1000), nested)]
    pub users: Vec<RegisterRequest>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UserListQuery {
    pub fn filter(&self) -> UserFilter {
        UserFilter {
            is_active: self.is_active,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_null_clears() {
        let absent: UpdateMeRequest = serde_json::from_str("{}").unwrap();
        assert!(absent.full_name.is_none());

        let cleared: UpdateMeRequest = serde_json::from_str(r#"{"full_name": null}"#).unwrap();
        assert_eq!(cleared.full_name, Some(None));

        let set: UpdateMeRequest = serde_json::from_str(r#"{"full_name": "Ada"}"#).unwrap();
        assert_eq!(set.full_name, Some(Some("Ada".to_string())));
    }

    #[test]
    fn test_short_password_rejected() {
        let request: UpdateMeRequest = serde_json::from_str(r#"{"password": "short"}"#).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_response_hides_password_hash() {
        let now = Utc::now();
        let user = User {
            id: 1,
            email: "ada@example.com".to_string(),
            hashed_password: "$argon2id$secret".to_string(),
            full_name: None,
            is_active: true,
            roles: vec![Role::User],
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["roles"], serde_json::json!(["user"]));
    }
}
