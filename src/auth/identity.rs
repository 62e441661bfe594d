// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated identity attached to a request context.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::token::TokenClaims;

/// Who is making the request, derived from one verified token and its live
/// session. Lives for a single request and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedIdentity {
    /// Canonical user id (token `sub`)
    pub user_id: String,
    /// Session the token was issued for (token `sid`)
    pub session_id: String,
}

impl AuthenticatedIdentity {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Build from verified claims.
    pub(crate) fn from_claims(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.sub,
            session_id: claims.sid,
        }
    }

    /// Whether this identity belongs to `user_id`.
    pub fn owns(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
