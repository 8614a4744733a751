use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::db::types::UserRole;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserCreate {
    #[validate(length(min = 3, max = 64, message = "username must be 3 to 64 characters"))]
    pub(crate) username: String,
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, message = "full_name must not be empty"))]
    pub(crate) full_name: String,
    pub(crate) password: String,
    #[serde(default = "default_user_role")]
    pub(crate) role: UserRole,
    #[serde(default = "default_true")]
    #[serde(alias = "isActive")]
    pub(crate) is_active: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserUpdate {
    #[serde(default)]
    #[serde(alias = "fullName")]
    pub(crate) full_name: Option<String>,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default)]
    #[serde(alias = "isActive")]
    pub(crate) is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserListQuery {
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            role: user.role,
            is_active: user.is_active,
            created_at: format_primitive(user.created_at),
        }
    }
}

fn default_user_role() -> UserRole {
    UserRole::Student
}

fn default_true() -> bool {
    true
}
