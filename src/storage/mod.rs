// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent storage on an embedded **redb** database: a single file under
//! `DATA_DIR` holding sessions, users and books.
//!
//! ## Layering
//!
//! - [`Database`] is the process-wide capability, opened once at startup
//! - [`DbSession`] is the scoped handle attached to every request context
//! - repositories wrap a `DbSession` and own one entity type each
//! - [`SessionSweeper`] purges long-expired sessions in the background

pub mod database;
pub mod repository;
pub mod sweeper;

pub use database::{Database, DbSession, StorageError, StorageResult};
pub use repository::{
    normalize_username, BookRepository, RedbSessionRepository, SessionRepository, StoredBook,
    StoredSession, StoredUser, UserRepository,
};
pub use sweeper::SessionSweeper;
