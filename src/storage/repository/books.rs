// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Book repository.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{DbSession, StorageError, StorageResult, BOOKS};

/// Book stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredBook {
    /// Unique book identifier (UUID)
    pub id: String,
    pub title: String,
    pub author: String,
    /// User who added the book
    pub created_by_user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for book operations.
#[derive(Debug, Clone)]
pub struct BookRepository {
    db: DbSession,
}

impl BookRepository {
    /// Create a new BookRepository.
    pub fn new(db: DbSession) -> Self {
        Self { db }
    }

    pub fn create(&self, book: &StoredBook) -> StorageResult<()> {
        let json = serde_json::to_vec(book)?;

        let write_txn = self.db.redb().begin_write()?;
        {
            let mut table = write_txn.open_table(BOOKS)?;
            table.insert(book.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, book_id: &str) -> StorageResult<StoredBook> {
        let read_txn = self.db.redb().begin_read()?;
        let table = read_txn.open_table(BOOKS)?;
        let entry = table.get(book_id)?;
        match entry {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("Book {book_id}"))),
        }
    }

    /// List all books, oldest first.
    pub fn list(&self) -> StorageResult<Vec<StoredBook>> {
        let read_txn = self.db.redb().begin_read()?;
        let table = read_txn.open_table(BOOKS)?;

        let mut books = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            books.push(serde_json::from_slice::<StoredBook>(value.value())?);
        }
        books.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(books)
    }

    pub fn delete(&self, book_id: &str) -> StorageResult<()> {
        let write_txn = self.db.redb().begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(BOOKS)?;
            let removed = table.remove(book_id)?.is_some();
            removed
        };
        if !removed {
            return Err(StorageError::NotFound(format!("Book {book_id}")));
        }
        write_txn.commit()?;
        Ok(())
    }
}
