//! Ordered user roles for route authorization.
//!
//! Roles form a total order (`user < editor < admin`) so a guard check is a
//! single threshold comparison instead of string matching.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User role, ordered by privilege.
///
/// The derive order matters: `Ord` follows declaration order, so
/// `Role::Admin >= Role::Editor >= Role::User` holds.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Editor,
    Admin,
}

impl Role {
    /// Database representation (the `users.role` column).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }

    /// Parse the database representation. Unknown values are rejected rather
    /// than mapped to a default, so a corrupt row can never grant access.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "editor" => Some(Self::Editor),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// True when this role meets or exceeds the required minimum.
    #[must_use]
    pub fn permits(self, minimum: Self) -> bool {
        self >= minimum
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
