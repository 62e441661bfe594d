// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session repository.
//!
//! Sessions are the only server-side state behind a token. A session is
//! written once at issuance and afterwards only ever flipped to
//! `revoked = true`; reissue creates a new row instead of extending one.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{DbSession, StorageError, StorageResult, SESSIONS};

/// Session metadata as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredSession {
    /// Unique session identifier (UUID)
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// When the session was issued
    pub issued_at: DateTime<Utc>,
    /// When the session (and its token) stops being valid
    pub expires_at: DateTime<Utc>,
    /// Set on logout or administrative revocation
    pub revoked: bool,
}

impl StoredSession {
    /// Fresh, unrevoked session for `user_id` issued at `now`.
    ///
    /// Fails with `OutOfRange` when `now + ttl` is not a representable
    /// timestamp.
    pub fn new(
        user_id: impl Into<String>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> StorageResult<Self> {
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            StorageError::OutOfRange(format!("session expiry {now} + {ttl}"))
        })?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            issued_at: now,
            expires_at,
            revoked: false,
        })
    }
}

/// Persistence contract for sessions.
///
/// `create` must be durable before it returns `Ok`. `mark_revoked` must be
/// visible to every `find` that starts after it returns.
pub trait SessionRepository: Send + Sync {
    /// Persist a new session. Fails with `AlreadyExists` on id collision.
    fn create(&self, session: &StoredSession) -> StorageResult<()>;

    /// Look up a session. Fails with `NotFound` if absent.
    fn find(&self, session_id: &str) -> StorageResult<StoredSession>;

    /// Set the revoked flag, returning the updated session. Idempotent.
    fn mark_revoked(&self, session_id: &str) -> StorageResult<StoredSession>;

    /// Delete sessions whose expiry lies before `cutoff`. Returns the count.
    fn purge_expired(&self, cutoff: DateTime<Utc>) -> StorageResult<usize>;
}

/// redb-backed session repository.
#[derive(Debug, Clone)]
pub struct RedbSessionRepository {
    db: DbSession,
}

impl RedbSessionRepository {
    /// Create a new RedbSessionRepository.
    pub fn new(db: DbSession) -> Self {
        Self { db }
    }
}

impl SessionRepository for RedbSessionRepository {
    fn create(&self, session: &StoredSession) -> StorageResult<()> {
        let json = serde_json::to_vec(session)?;

        let write_txn = self.db.redb().begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            if table.get(session.id.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("Session {}", session.id)));
            }
            table.insert(session.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn find(&self, session_id: &str) -> StorageResult<StoredSession> {
        let read_txn = self.db.redb().begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;
        let entry = table.get(session_id)?;
        match entry {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("Session {session_id}"))),
        }
    }

    fn mark_revoked(&self, session_id: &str) -> StorageResult<StoredSession> {
        let write_txn = self.db.redb().begin_write()?;
        let session = {
            let mut table = write_txn.open_table(SESSIONS)?;
            let mut session: StoredSession = match table.get(session_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::NotFound(format!("Session {session_id}"))),
            };

            if !session.revoked {
                session.revoked = true;
                let json = serde_json::to_vec(&session)?;
                table.insert(session_id, json.as_slice())?;
            }
            session
        };
        write_txn.commit()?;
        Ok(session)
    }

    fn purge_expired(&self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        let write_txn = self.db.redb().begin_write()?;
        let purged = {
            let mut table = write_txn.open_table(SESSIONS)?;

            let mut stale = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let session: StoredSession = serde_json::from_slice(value.value())?;
                if session.expires_at < cutoff {
                    stale.push(key.value().to_string());
                }
            }

            for id in &stale {
                table.remove(id.as_str())?;
            }
            stale.len()
        };
        write_txn.commit()?;
        Ok(purged)
    }
}
