// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository.
//!
//! Users are the credential collaborator of the session resource: login looks
//! a user up by normalized username and checks the password hash. Everything
//! else in the server only ever holds a user id.

use std::num::NonZeroU32;

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::storage::database::{DbSession, StorageError, StorageResult, USERNAMES, USERS};

#[cfg(not(test))]
const PBKDF2_ITERATIONS: u32 = 100_000;
#[cfg(test)]
const PBKDF2_ITERATIONS: u32 = 1_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// User stored in the database. Password material never leaves this module
/// through the API: handlers convert to a response type first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    /// Unique user identifier (UUID)
    pub id: String,
    /// Normalized username
    pub username: String,
    /// Base64 PBKDF2 salt
    password_salt: String,
    /// Base64 PBKDF2-HMAC-SHA256 output
    password_hash: String,
    /// When the user registered
    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    /// Build a user record, hashing `password` with a fresh random salt.
    pub fn new(username: &str, password: &str) -> StorageResult<Self> {
        let mut salt = [0u8; SALT_LEN];
        SystemRandom::new()
            .fill(&mut salt)
            .map_err(|_| StorageError::Io(std::io::Error::other("system RNG failure")))?;

        let mut hash = [0u8; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations(),
            &salt,
            password.as_bytes(),
            &mut hash,
        );

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: normalize_username(username),
            password_salt: Base64::encode_string(&salt),
            password_hash: Base64::encode_string(&hash),
            created_at: Utc::now(),
        })
    }

    /// Constant-time password check.
    pub fn verify_password(&self, password: &str) -> bool {
        let (Ok(salt), Ok(hash)) = (
            Base64::decode_vec(&self.password_salt),
            Base64::decode_vec(&self.password_hash),
        ) else {
            return false;
        };
        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations(),
            &salt,
            password.as_bytes(),
            &hash,
        )
        .is_ok()
    }
}

/// Full PBKDF2 verification against an all-zero hash. Run for unknown
/// usernames so they cost the same as a wrong password.
fn dummy_password_check(password: &str) -> bool {
    const DUMMY_SALT: [u8; SALT_LEN] = [0; SALT_LEN];
    const DUMMY_HASH: [u8; HASH_LEN] = [0; HASH_LEN];
    pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations(),
        &DUMMY_SALT,
        password.as_bytes(),
        &DUMMY_HASH,
    )
    .is_ok()
}

fn iterations() -> NonZeroU32 {
    NonZeroU32::new(PBKDF2_ITERATIONS).unwrap_or(NonZeroU32::MIN)
}

/// NFKC-normalize, trim and lower-case a username so visually identical
/// names map to the same account.
pub fn normalize_username(username: &str) -> String {
    username.trim().nfkc().collect::<String>().to_lowercase()
}

/// Repository for user operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DbSession,
}

impl UserRepository {
    /// Create a new UserRepository.
    pub fn new(db: DbSession) -> Self {
        Self { db }
    }

    /// Insert a user, enforcing username uniqueness in the same transaction.
    pub fn create(&self, user: &StoredUser) -> StorageResult<()> {
        let json = serde_json::to_vec(user)?;

        let write_txn = self.db.redb().begin_write()?;
        {
            let mut names = write_txn.open_table(USERNAMES)?;
            if names.get(user.username.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!(
                    "Username {}",
                    user.username
                )));
            }
            names.insert(user.username.as_str(), user.id.as_str())?;

            let mut users = write_txn.open_table(USERS)?;
            users.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a user by ID.
    pub fn get(&self, user_id: &str) -> StorageResult<StoredUser> {
        let read_txn = self.db.redb().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        let entry = table.get(user_id)?;
        match entry {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("User {user_id}"))),
        }
    }

    /// Get a user by username (normalized before lookup).
    pub fn get_by_username(&self, username: &str) -> StorageResult<StoredUser> {
        let username = normalize_username(username);
        let user_id = {
            let read_txn = self.db.redb().begin_read()?;
            let names = read_txn.open_table(USERNAMES)?;
            let entry = names.get(username.as_str())?;
            match entry {
                Some(id) => id.value().to_string(),
                None => return Err(StorageError::NotFound(format!("Username {username}"))),
            }
        };
        self.get(&user_id)
    }

    /// Return the user matching the credentials, if any.
    pub fn authenticate(&self, username: &str, password: &str) -> StorageResult<Option<StoredUser>> {
        match self.get_by_username(username) {
            Ok(user) if user.verify_password(password) => Ok(Some(user)),
            Ok(_) => Ok(None),
            Err(StorageError::NotFound(_)) => {
                let _ = dummy_password_check(password);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Return the existing user with `username`, or create it.
    pub fn ensure(&self, username: &str, password: &str) -> StorageResult<StoredUser> {
        match self.get_by_username(username) {
            Ok(user) => Ok(user),
            Err(StorageError::NotFound(_)) => {
                let user = StoredUser::new(username, password)?;
                self.create(&user)?;
                Ok(user)
            }
            Err(e) => Err(e),
        }
    }

    /// List all users (admin view).
    pub fn list_all(&self) -> StorageResult<Vec<StoredUser>> {
        let read_txn = self.db.redb().begin_read()?;
        let table = read_txn.open_table(USERS)?;

        let mut users = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            users.push(serde_json::from_slice::<StoredUser>(value.value())?);
        }
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }
}
