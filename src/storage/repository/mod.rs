// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the embedded database.
//!
//! Each repository provides CRUD operations for a specific entity type,
//! using a [`DbSession`](super::DbSession) for all transactions.

pub mod books;
pub mod sessions;
pub mod users;

pub use books::{BookRepository, StoredBook};
pub use sessions::{RedbSessionRepository, SessionRepository, StoredSession};
pub use users::{normalize_username, StoredUser, UserRepository};
