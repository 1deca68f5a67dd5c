//! Lending coordinator: the borrow/return state machine
//!
//! Per book: `available --borrow--> borrowed --return--> available`.
//! Each transition re-reads state and commits under the book's per-ISBN
//! section, so two requests on one ISBN are serialized while requests on
//! different ISBNs proceed independently.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{book::normalize_isbn, Book, BorrowReceipt, Identity, ReturnReceipt, Transaction},
    repository::{LendingChange, Repository, StatusRepair},
    services::locks::{IsbnGuard, IsbnLocks},
};

#[derive(Clone)]
pub struct LendingService {
    repository: Repository,
    locks: Arc<IsbnLocks>,
    lock_timeout: Duration,
}

impl LendingService {
    pub fn new(repository: Repository, lock_timeout: Duration) -> Self {
        Self {
            repository,
            locks: Arc::new(IsbnLocks::new()),
            lock_timeout,
        }
    }

    /// Borrow the book identified by `isbn` for `identity`.
    ///
    /// Not idempotent: a repeated borrow of a book already out (including by
    /// the same caller) fails with `Conflict`.
    pub async fn borrow(&self, identity: &Identity, isbn: &str) -> AppResult<BorrowReceipt> {
        require_identity(identity)?;
        let isbn = normalize_isbn(isbn)?;
        self.require_book(&isbn).await?;

        let _section = self.enter(&isbn, "borrow").await?;

        let book = self.require_book(&isbn).await?;
        if !book.is_available() {
            tracing::warn!(isbn = %isbn, user_id = identity.user_id, "Borrow rejected: already borrowed");
            return Err(AppError::Conflict(format!("Book {} is already borrowed", isbn)));
        }

        let transaction = self
            .apply(LendingChange::Borrow {
                isbn: isbn.clone(),
                user_id: identity.user_id,
                borrow_date: Utc::now(),
            })
            .await?;

        tracing::info!(
            isbn = %isbn,
            user_id = identity.user_id,
            transaction_id = transaction.id,
            "Book borrowed"
        );

        Ok(BorrowReceipt {
            transaction_id: transaction.id,
            isbn,
            borrow_date: transaction.borrow_date,
        })
    }

    /// Return the book identified by `isbn`.
    ///
    /// Only the borrower, or an administrator, may close the active loan.
    pub async fn return_book(&self, identity: &Identity, isbn: &str) -> AppResult<ReturnReceipt> {
        require_identity(identity)?;
        let isbn = normalize_isbn(isbn)?;
        self.require_book(&isbn).await?;

        let _section = self.enter(&isbn, "return").await?;

        let active = self
            .repository
            .ledger
            .find_active_by_isbn(&isbn)
            .await?
            .ok_or_else(|| {
                tracing::warn!(isbn = %isbn, user_id = identity.user_id, "Return rejected: not borrowed");
                AppError::Conflict(format!("Book {} is not currently borrowed", isbn))
            })?;

        if active.user_id != identity.user_id && !identity.is_admin() {
            tracing::warn!(
                isbn = %isbn,
                user_id = identity.user_id,
                borrower_id = active.user_id,
                "Return rejected: caller is not the borrower"
            );
            return Err(AppError::Authorization(
                "Only the borrower or an administrator can return this book".to_string(),
            ));
        }

        let returned_at = Utc::now();
        let closed = self
            .apply(LendingChange::Return {
                transaction_id: active.id,
                isbn: isbn.clone(),
                returned_at,
            })
            .await?;

        if closed.user_id != identity.user_id {
            tracing::info!(
                isbn = %isbn,
                admin_id = identity.user_id,
                borrower_id = closed.user_id,
                transaction_id = closed.id,
                "Book returned by administrator override"
            );
        } else {
            tracing::info!(
                isbn = %isbn,
                user_id = identity.user_id,
                transaction_id = closed.id,
                "Book returned"
            );
        }

        Ok(ReturnReceipt {
            transaction_id: closed.id,
            isbn,
            returned_at: closed.return_date.unwrap_or(returned_at),
        })
    }

    /// Rebuild book statuses from the ledger. Run before serving requests.
    pub async fn reconcile(&self) -> AppResult<Vec<StatusRepair>> {
        let repairs = self.repository.lending.reconcile().await.map_err(|e| {
            tracing::error!(error = %e, "Status reconciliation failed");
            e
        })?;

        for repair in &repairs {
            tracing::warn!(
                isbn = %repair.isbn,
                from = %repair.from,
                to = %repair.to,
                "Repaired book status from ledger"
            );
        }
        tracing::info!(repaired = repairs.len(), "Status reconciliation completed");
        Ok(repairs)
    }

    async fn require_book(&self, isbn: &str) -> AppResult<Book> {
        self.repository
            .books
            .get(isbn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", isbn)))
    }

    async fn enter(&self, isbn: &str, action: &str) -> AppResult<IsbnGuard> {
        self.locks.acquire(isbn, self.lock_timeout).await.map_err(|e| {
            tracing::warn!(
                isbn = %isbn,
                action,
                timeout_ms = self.lock_timeout.as_millis() as u64,
                "Lending section busy"
            );
            e
        })
    }

    /// Commit a change. A failed commit leaves book and ledger untouched.
    async fn apply(&self, change: LendingChange) -> AppResult<Transaction> {
        let isbn = change.isbn().to_string();
        self.repository.lending.commit(change).await.map_err(|e| {
            if e.is_storage_failure() {
                tracing::error!(isbn = %isbn, error = %e, "Lending commit failed, state unchanged");
            } else {
                tracing::warn!(isbn = %isbn, error = %e, "Lending commit rejected by store");
            }
            e
        })
    }
}

fn require_identity(identity: &Identity) -> AppResult<()> {
    if identity.user_id <= 0 {
        return Err(AppError::Authentication(
            "An authenticated user is required".to_string(),
        ));
    }
    Ok(())
}
