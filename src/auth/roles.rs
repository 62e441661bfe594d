// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles for authorization.
///
/// Roles are not carried in tokens. The access controller derives them from
/// its configured admin set each time it evaluates a request.
///
/// ## Role Hierarchy
///
/// - `Admin` - Full access, including other users' data and revocation
/// - `User` - Normal account, can only access what it owns
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Normal authenticated account; the least privilege
    #[default]
    User,
}

impl Role {
    /// Whether this role satisfies `required`. Admin satisfies everything.
    pub fn has_privilege(&self, required: Role) -> bool {
        *self == Role::Admin || *self == required
    }

    /// Role of `user_id` given the set of admin ids.
    pub fn resolve(user_id: &str, admins: &HashSet<String>) -> Role {
        if admins.contains(user_id) {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privilege_ordering() {
        assert!(Role::Admin.has_privilege(Role::User));
        assert!(Role::Admin.has_privilege(Role::Admin));
        assert!(Role::User.has_privilege(Role::User));
        assert!(!Role::User.has_privilege(Role::Admin));
    }

    #[test]
    fn resolve_uses_admin_set() {
        let admins: HashSet<String> = ["u-admin".to_string()].into_iter().collect();
        assert_eq!(Role::resolve("u-admin", &admins), Role::Admin);
        assert_eq!(Role::resolve("u-other", &admins), Role::User);
    }

    #[test]
    fn default_is_least_privilege_and_displays_lowercase() {
        assert_eq!(Role::default(), Role::User);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
