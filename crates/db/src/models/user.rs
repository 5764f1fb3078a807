//! User entity model and DTOs.

use orbit_core::roles::{Role, UnknownRole};
use orbit_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash -- never serialize this to API responses directly.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub user_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub role_id: i16,
    pub is_deleted: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// Decode the stored `role_id`.
    pub fn role(&self) -> Result<Role, UnknownRole> {
        Role::try_from(self.role_id)
    }
}

/// DTO for creating a new user.
#[derive(Debug)]
pub struct CreateUser {
    pub user_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub role: Role,
}
