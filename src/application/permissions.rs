//! Role-based permission checks.
//!
//! | Action | `user` | `admin` |
//! |---|---|---|
//! | Read/update own profile, create items and orders | yes | yes |
//! | Update or cancel a resource owned by someone else | no | yes |
//! | List/manage users, bulk import users, process orders | no | yes |

use serde_json::json;

use crate::domain::entities::User;
use crate::error::AppError;

/// Fails with [`AppError::Forbidden`] unless `user` is an admin.
pub fn require_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "Admin role required",
            json!({ "required_role": "admin" }),
        ))
    }
}

/// Fails with [`AppError::Forbidden`] unless `user` owns the resource or is an admin.
pub fn require_owner_or_admin(user: &User, owner_id: i64, resource: &str) -> Result<(), AppError> {
    if user.id == owner_id || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden(
            format!("Not allowed to modify this {}", resource),
            json!({ "resource": resource }),
        ))
    }
}

#[cfg(test)]
pub(crate) fn test_user(id: i64, roles: Vec<crate::domain::entities::Role>) -> User {
    let now = chrono::Utc::now();
    User {
        id,
        email: format!("user{}@example.com", id),
        hashed_password: String::new(),
        full_name: None,
        is_active: true,
        roles,
        created_at: now,
        updated_at: now,
    }
}
