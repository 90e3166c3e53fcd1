use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::db::types::{UserRole, UserStatus};

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) real_name: String,
    pub(crate) role: UserRole,
    pub(crate) status: UserStatus,
    pub(crate) phone: Option<String>,
    pub(crate) avatar: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl UserResponse {
    /// The password hash never leaves the database layer.
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            real_name: user.real_name,
            role: user.role,
            status: user.status,
            phone: user.phone,
            avatar: user.avatar,
            created_at: format_primitive(user.created_at),
            updated_at: format_primitive(user.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminUserCreate {
    #[validate(length(min = 3, max = 50, message = "username must be 3-50 characters"))]
    pub(crate) username: String,
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub(crate) password: String,
    #[serde(alias = "realName")]
    #[validate(length(min = 1, message = "real_name must not be empty"))]
    pub(crate) real_name: String,
    pub(crate) role: UserRole,
    #[serde(default = "default_status")]
    pub(crate) status: UserStatus,
    #[serde(default)]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    pub(crate) avatar: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminUserUpdate {
    #[serde(default)]
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: Option<String>,
    #[serde(default)]
    #[serde(alias = "realName")]
    pub(crate) real_name: Option<String>,
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default)]
    pub(crate) status: Option<UserStatus>,
    #[serde(default)]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    pub(crate) avatar: Option<String>,
    #[serde(default)]
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub(crate) password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct PasswordChange {
    #[serde(alias = "oldPassword")]
    #[validate(length(min = 1, message = "old_password must not be empty"))]
    pub(crate) old_password: String,
    #[serde(alias = "newPassword")]
    #[validate(length(min = 6, message = "new password must be at least 6 characters"))]
    pub(crate) new_password: String,
}

fn default_status() -> UserStatus {
    UserStatus::Active
}
