// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `sessions`: session_id → serialized StoredSession
//! - `users`: user_id → serialized StoredUser
//! - `usernames`: normalized username → user_id (uniqueness index)
//! - `books`: book_id → serialized StoredBook
//!
//! Every write commits with redb's default immediate durability, so a
//! successful `commit()` is visible to the next read transaction.

use std::path::Path;
use std::sync::Arc;

use redb::backends::InMemoryBackend;
use redb::TableDefinition;

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

pub(crate) const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

pub(crate) const BOOKS: TableDefinition<&str, &[u8]> = TableDefinition::new("books");

/// Single-row table rewritten by every readiness check.
const HEALTH_CHECK: TableDefinition<&str, u64> = TableDefinition::new("health_check");

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "slumber.redb";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("value out of range: {0}")]
    OutOfRange(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Database
// =============================================================================

/// Process-wide database capability.
///
/// Owns the redb handle; request code never touches it directly but asks for
/// a [`DbSession`] via [`Database::new_session`].
#[derive(Clone)]
pub struct Database {
    inner: Arc<redb::Database>,
}

impl Database {
    /// Open (or create) the database file inside `data_dir`.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db = redb::Database::create(data_dir.join(DATABASE_FILE))?;
        Self::from_redb(db)
    }

    /// Volatile database, used by tests and throwaway servers.
    pub fn in_memory() -> StorageResult<Self> {
        let db = redb::Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::from_redb(db)
    }

    fn from_redb(db: redb::Database) -> StorageResult<Self> {
        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERNAMES)?;
            let _ = write_txn.open_table(BOOKS)?;
        }
        write_txn.commit()?;

        Ok(Self {
            inner: Arc::new(db),
        })
    }

    /// Hand out a scoped session handle.
    pub fn new_session(&self) -> DbSession {
        DbSession {
            db: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// Scoped database handle attached to request contexts.
///
/// Cheap to clone; each repository call opens its own redb transaction, so
/// the handle carries no transaction state between calls.
#[derive(Clone)]
pub struct DbSession {
    db: Arc<redb::Database>,
}

impl DbSession {
    pub(crate) fn redb(&self) -> &redb::Database {
        &self.db
    }

    /// Commit a timestamp and read it back. Used by the readiness check.
    pub fn ping(&self) -> StorageResult<()> {
        use redb::{ReadableDatabase, ReadableTable};

        let stamp = chrono::Utc::now().timestamp_millis() as u64;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(HEALTH_CHECK)?;
            table.insert("last", stamp)?;
        }
        write_txn.commit()?;

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HEALTH_CHECK)?;
        let entry = table.get("last")?;
        match entry {
            Some(value) if value.value() == stamp => Ok(()),
            _ => Err(StorageError::NotFound("health check value".to_string())),
        }
    }
}

impl std::fmt::Debug for DbSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbSession").finish_non_exhaustive()
    }
}
