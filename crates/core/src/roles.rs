//! User roles.
//!
//! Roles are stored as a small integer in `users.role_id` and travel as the
//! same integer inside access-token claims. These ids must match the
//! `ck_users_role_id` check in `20260301000001_create_users_table.sql`.

use serde::{Deserialize, Serialize};

/// A recognized user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum Role {
    Admin,
    User,
}

/// A `role_id` that does not correspond to any known [`Role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown role id {0}")]
pub struct UnknownRole(pub i16);

impl Role {
    /// Role assigned to self-registered accounts.
    pub const DEFAULT: Role = Role::User;

    /// Database / claim representation.
    pub const fn id(self) -> i16 {
        match self {
            Role::Admin => 1,
            Role::User => 2,
        }
    }

    /// Human-readable name used in API responses.
    pub const fn name(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl From<Role> for i16 {
    fn from(role: Role) -> Self {
        role.id()
    }
}

impl TryFrom<i16> for Role {
    type Error = UnknownRole;

    fn try_from(id: i16) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Role::Admin),
            2 => Ok(Role::User),
            other => Err(UnknownRole(other)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_map_back_to_roles() {
        for role in [Role::Admin, Role::User] {
            assert_eq!(Role::try_from(role.id()), Ok(role));
        }
        assert_eq!(Role::try_from(9), Err(UnknownRole(9)));
    }

    #[test]
    fn serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "1");
        let role: Role = serde_json::from_str("2").unwrap();
        assert_eq!(role, Role::User);
        assert!(serde_json::from_str::<Role>("7").is_err());
    }
}
