// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Access Controller
//!
//! Decides, per request, whether an identity (or its absence) may perform an
//! action on a resource. Evaluation is a pure function of the identity, the
//! target and the policy table fixed at startup, and a decision is never
//! reused across requests.
//!
//! ## Policy table
//!
//! Keyed by `(resource, action)`. A pair without an entry is denied, so
//! forgetting to declare a policy fails closed.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use utoipa::ToSchema;

use super::identity::AuthenticatedIdentity;
use super::roles::Role;

/// Operation a route performs on its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    List,
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::List,
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
    ];
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::List => "list",
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// What a request is trying to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Resource name, e.g. `"users"`
    pub resource: &'static str,
    pub action: Action,
    /// User id owning the addressed item, when the route identifies one
    pub owner: Option<String>,
}

impl Target {
    pub fn new(resource: &'static str, action: Action) -> Self {
        Self {
            resource,
            action,
            owner: None,
        }
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Who may perform an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Anonymous or any identity
    Anyone,
    /// Any verified identity
    Authenticated,
    /// The owner of the addressed item, or an admin
    OwnerOrAdmin,
    /// Admins only
    Admin,
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    Public,
    Authenticated,
    Owner,
    Admin,
    NoPolicy,
    AuthenticationRequired,
    NotOwner,
    AdminRequired,
}

/// Outcome of one authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allow: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    pub fn allow(reason: AccessReason) -> Self {
        Self {
            allow: true,
            reason,
        }
    }

    pub fn deny(reason: AccessReason) -> Self {
        Self {
            allow: false,
            reason,
        }
    }
}

/// Authorization policy consulted after authentication and before any
/// resource handler.
pub trait AccessController: Send + Sync {
    fn authorize(&self, identity: Option<&AuthenticatedIdentity>, target: &Target)
        -> AccessDecision;
}

/// Table-driven [`AccessController`] with a fixed set of admin user ids.
#[derive(Debug, Clone, Default)]
pub struct PolicyAccessController {
    policies: HashMap<(&'static str, Action), Requirement>,
    admins: HashSet<String>,
}

impl PolicyAccessController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the requirement for `(resource, action)`. Later declarations
    /// replace earlier ones.
    pub fn allow(mut self, resource: &'static str, action: Action, requirement: Requirement) -> Self {
        self.policies.insert((resource, action), requirement);
        self
    }

    pub fn with_admins<I, S>(mut self, admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admins.extend(admins.into_iter().map(Into::into));
        self
    }

    /// Whether `(resource, action)` has a declared policy.
    pub fn has_policy(&self, resource: &str, action: Action) -> bool {
        self.policies
            .keys()
            .any(|(r, a)| *r == resource && *a == action)
    }

    /// Every declared `(resource, action)` pair.
    pub fn declared(&self) -> impl Iterator<Item = (&'static str, Action)> + '_ {
        self.policies.keys().copied()
    }

    pub fn role_of(&self, identity: &AuthenticatedIdentity) -> Role {
        Role::resolve(&identity.user_id, &self.admins)
    }
}

impl AccessController for PolicyAccessController {
    fn authorize(
        &self,
        identity: Option<&AuthenticatedIdentity>,
        target: &Target,
    ) -> AccessDecision {
        let Some(requirement) = self.policies.get(&(target.resource, target.action)) else {
            return AccessDecision::deny(AccessReason::NoPolicy);
        };

        if *requirement == Requirement::Anyone {
            return AccessDecision::allow(AccessReason::Public);
        }
        let Some(identity) = identity else {
            return AccessDecision::deny(AccessReason::AuthenticationRequired);
        };
        let is_admin = self.role_of(identity).has_privilege(Role::Admin);

        match requirement {
            Requirement::Anyone | Requirement::Authenticated => {
                AccessDecision::allow(AccessReason::Authenticated)
            }
            Requirement::OwnerOrAdmin if is_admin => AccessDecision::allow(AccessReason::Admin),
            Requirement::OwnerOrAdmin => match target.owner.as_deref() {
                Some(owner) if identity.owns(owner) => AccessDecision::allow(AccessReason::Owner),
                _ => AccessDecision::deny(AccessReason::NotOwner),
            },
            Requirement::Admin if is_admin => AccessDecision::allow(AccessReason::Admin),
            Requirement::Admin => AccessDecision::deny(AccessReason::AdminRequired),
        }
    }
}
