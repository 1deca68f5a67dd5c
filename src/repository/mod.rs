//! Repository layer for the book registry and transaction ledger
//!
//! Storage is reached through three traits so the lending core can run over
//! PostgreSQL in production and over a process-local store in tests:
//!
//! - [`BookStore`]: book records. Status is not writable through it.
//! - [`LedgerStore`]: read access to the transaction ledger.
//! - [`LendingStore`]: the only write path for lending state. A
//!   [`LendingChange`] appends or closes a transaction and flips the book
//!   status in a single all-or-nothing commit.

pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Pool, Postgres};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{Book, BookStatus, Transaction, TransactionDetails},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn get(&self, isbn: &str) -> AppResult<Option<Book>>;
    /// Register a new book. Fails with `Conflict` if the ISBN exists.
    async fn create(&self, book: Book) -> AppResult<Book>;
    /// Register a book unless the ISBN exists; returns the stored record.
    async fn insert_if_absent(&self, book: Book) -> AppResult<Book>;
    async fn list(&self) -> AppResult<Vec<Book>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_active_by_isbn(&self, isbn: &str) -> AppResult<Option<Transaction>>;
    async fn find_active_by_user_and_isbn(
        &self,
        user_id: i32,
        isbn: &str,
    ) -> AppResult<Option<Transaction>>;
    /// Every transaction, ordered by id
    async fn list_all(&self) -> AppResult<Vec<TransactionDetails>>;
    async fn list_by_user(&self, user_id: i32) -> AppResult<Vec<TransactionDetails>>;
}

/// A single lending state change, committed atomically
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LendingChange {
    /// Append an ACTIVE transaction and set the book BORROWED
    Borrow {
        isbn: String,
        user_id: i32,
        borrow_date: DateTime<Utc>,
    },
    /// Close the ACTIVE transaction and set the book AVAILABLE
    Return {
        transaction_id: i64,
        isbn: String,
        returned_at: DateTime<Utc>,
    },
}

impl LendingChange {
    pub fn isbn(&self) -> &str {
        match self {
            LendingChange::Borrow { isbn, .. } | LendingChange::Return { isbn, .. } => isbn,
        }
    }
}

/// A book whose status was rebuilt from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusRepair {
    pub isbn: String,
    pub from: BookStatus,
    pub to: BookStatus,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LendingStore: Send + Sync {
    /// Apply a change; returns the appended or closed transaction.
    ///
    /// Implementations re-check the transition and fail with `Conflict`
    /// rather than commit a second ACTIVE transaction for one ISBN.
    async fn commit(&self, change: LendingChange) -> AppResult<Transaction>;

    /// Rebuild every book status from "is there an ACTIVE transaction for
    /// this ISBN" and report the rows that changed.
    async fn reconcile(&self) -> AppResult<Vec<StatusRepair>>;

    /// Check that the store is reachable
    async fn ping(&self) -> AppResult<()>;
}

/// Main repository struct holding the storage handles
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub lending: Arc<dyn LendingStore>,
}

impl Repository {
    /// Build a repository whose three handles share one backend
    pub fn new<S>(store: S) -> Self
    where
        S: BookStore + LedgerStore + LendingStore + 'static,
    {
        Self::from_shared(Arc::new(store))
    }

    /// Like [`Repository::new`], keeping a typed handle with the caller
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: BookStore + LedgerStore + LendingStore + 'static,
    {
        Self {
            books: store.clone(),
            ledger: store.clone(),
            lending: store,
        }
    }

    /// Build a repository from independent handles
    pub fn from_parts(
        books: Arc<dyn BookStore>,
        ledger: Arc<dyn LedgerStore>,
        lending: Arc<dyn LendingStore>,
    ) -> Self {
        Self {
            books,
            ledger,
            lending,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(memory::MemoryStore::new())
    }

    /// Create a new repository with the given database pool
    pub fn postgres(pool: Pool<Postgres>, lock_timeout: Duration) -> Self {
        Self::new(postgres::PgStore::new(pool, lock_timeout))
    }
}
