// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session tokens signed with an Ed25519 key pair, verified on every request
//! and backed by a session record that can be revoked.
//!
//! ## Auth Flow
//!
//! 1. Client logs in with `POST /sessions` and receives a bearer token
//! 2. Client sends `Authorization: Bearer <token>`
//! 3. Server:
//!    - [`Authenticator`] verifies signature, expiry and session state through
//!      the [`TokenAuthority`] and attaches an [`AuthenticatedIdentity`]
//!    - [`AccessController`] decides whether that identity (or none) may
//!      perform the route's action
//!
//! ## Security
//!
//! - Every token rejection yields the same 401 body
//! - Authorization denials are 403, before any handler runs
//! - Key bytes, tokens and passwords are never logged

pub mod access;
pub mod authenticator;
pub mod authority;
pub mod error;
pub mod identity;
pub mod keys;
pub mod roles;
pub mod token;

pub use access::{
    AccessController, AccessDecision, AccessReason, Action, PolicyAccessController, Requirement,
    Target,
};
pub use authenticator::Authenticator;
pub use authority::{IssuedToken, TokenAuthority};
pub use error::{AuthError, TokenError};
pub use identity::AuthenticatedIdentity;
pub use keys::{KeyError, SigningKeys};
pub use roles::Role;
pub use token::Token;
