//! PostgreSQL storage backend
//!
//! Every lending commit runs in one SQL transaction that locks the book row
//! (`FOR UPDATE`) and applies conditional updates, so concurrent servers
//! sharing the database still see at most one ACTIVE transaction per ISBN.
//! The partial unique index from `migrations/` backs the same invariant.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{BookStore, LedgerStore, LendingChange, LendingStore, StatusRepair};
use crate::{
    error::{AppError, AppResult},
    models::{Book, BookStatus, Transaction, TransactionDetails},
};

/// SQLSTATE raised when `lock_timeout` expires
const LOCK_NOT_AVAILABLE: &str = "55P03";

const BOOK_COLUMNS: &str = "isbn, title, author, status, thumbnail";
const TRANSACTION_COLUMNS: &str = "id, user_id, isbn, borrow_date, return_date, status";

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    async fn commit_borrow(
        &self,
        isbn: &str,
        user_id: i32,
        borrow_date: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<Transaction> {
        let mut tx = self.pool.begin().await?;
        self.set_lock_timeout(&mut tx).await?;

        let status: Option<BookStatus> =
            sqlx::query_scalar("SELECT status FROM books WHERE isbn = $1 FOR UPDATE")
                .bind(isbn)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_error)?;

        match status {
            None => return Err(AppError::NotFound(format!("Book {} not found", isbn))),
            Some(BookStatus::Borrowed) => {
                return Err(AppError::Conflict(format!("Book {} is already borrowed", isbn)))
            }
            Some(BookStatus::Available) => {}
        }

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            INSERT INTO transactions (user_id, isbn, borrow_date, status)
            VALUES ($1, $2, $3, 'active')
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(isbn)
        .bind(borrow_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let updated = sqlx::query(
            "UPDATE books SET status = 'borrowed' WHERE isbn = $1 AND status = 'available'",
        )
        .bind(isbn)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if updated.rows_affected() != 1 {
            return Err(AppError::Conflict(format!("Book {} is already borrowed", isbn)));
        }

        tx.commit().await?;
        Ok(transaction)
    }

    async fn commit_return(
        &self,
        transaction_id: i64,
        isbn: &str,
        returned_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<Transaction> {
        let mut tx = self.pool.begin().await?;
        self.set_lock_timeout(&mut tx).await?;

        let exists: Option<String> =
            sqlx::query_scalar("SELECT isbn FROM books WHERE isbn = $1 FOR UPDATE")
                .bind(isbn)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_error)?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Book {} not found", isbn)));
        }

        let closed = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            UPDATE transactions
            SET return_date = $1, status = 'returned'
            WHERE id = $2 AND isbn = $3 AND return_date IS NULL
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(returned_at)
        .bind(transaction_id)
        .bind(isbn)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| {
            AppError::Conflict(format!(
                "Transaction {} is not the active loan for {}",
                transaction_id, isbn
            ))
        })?;

        sqlx::query("UPDATE books SET status = 'available' WHERE isbn = $1")
            .bind(isbn)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await?;
        Ok(closed)
    }

    async fn set_lock_timeout(&self, tx: &mut sqlx::Transaction<'_, Postgres>) -> AppResult<()> {
        sqlx::query(&lock_timeout_statement(self.lock_timeout))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

/// `SET` does not accept bind parameters. Postgres reads `0` as "no
/// timeout", so the bound is at least 1ms.
fn lock_timeout_statement(timeout: Duration) -> String {
    format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis().max(1))
}

/// Translate lock timeouts and unique violations into lending outcomes.
fn map_db_error(error: sqlx::Error) -> AppError {
    if let Some(db_error) = error.as_database_error() {
        if db_error.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            return AppError::Busy("Book row is locked by another request".to_string());
        }
        if db_error.is_unique_violation() {
            return AppError::Conflict(db_error.message().to_string());
        }
    }
    AppError::Database(error)
}

#[async_trait]
impl BookStore for PgStore {
    async fn get(&self, isbn: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE isbn = $1"
        ))
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn create(&self, book: Book) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (isbn, title, author, status, thumbnail)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.status)
        .bind(&book.thumbnail)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match map_db_error(e) {
            AppError::Conflict(_) => {
                AppError::Conflict(format!("Book with ISBN '{}' already exists", book.isbn))
            }
            other => other,
        })
    }

    async fn insert_if_absent(&self, book: Book) -> AppResult<Book> {
        sqlx::query(
            r#"
            INSERT INTO books (isbn, title, author, status, thumbnail)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (isbn) DO NOTHING
            "#,
        )
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.status)
        .bind(&book.thumbnail)
        .execute(&self.pool)
        .await?;

        self.get(&book.isbn)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Book {} vanished after insert", book.isbn)))
    }

    async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY title, isbn"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn find_active_by_isbn(&self, isbn: &str) -> AppResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE isbn = $1 AND return_date IS NULL"
        ))
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?;
        Ok(transaction)
    }

    async fn find_active_by_user_and_isbn(
        &self,
        user_id: i32,
        isbn: &str,
    ) -> AppResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS} FROM transactions
            WHERE user_id = $1 AND isbn = $2 AND return_date IS NULL
            "#
        ))
        .bind(user_id)
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?;
        Ok(transaction)
    }

    async fn list_all(&self) -> AppResult<Vec<TransactionDetails>> {
        let transactions = sqlx::query_as::<_, TransactionDetails>(
            r#"
            SELECT t.id, t.user_id, t.isbn, b.title, t.borrow_date, t.return_date, t.status
            FROM transactions t
            LEFT JOIN books b ON b.isbn = t.isbn
            ORDER BY t.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(transactions)
    }

    async fn list_by_user(&self, user_id: i32) -> AppResult<Vec<TransactionDetails>> {
        let transactions = sqlx::query_as::<_, TransactionDetails>(
            r#"
            SELECT t.id, t.user_id, t.isbn, b.title, t.borrow_date, t.return_date, t.status
            FROM transactions t
            LEFT JOIN books b ON b.isbn = t.isbn
            WHERE t.user_id = $1
            ORDER BY t.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(transactions)
    }
}

#[async_trait]
impl LendingStore for PgStore {
    async fn commit(&self, change: LendingChange) -> AppResult<Transaction> {
        match change {
            LendingChange::Borrow {
                isbn,
                user_id,
                borrow_date,
            } => self.commit_borrow(&isbn, user_id, borrow_date).await,
            LendingChange::Return {
                transaction_id,
                isbn,
                returned_at,
            } => self.commit_return(transaction_id, &isbn, returned_at).await,
        }
    }

    async fn reconcile(&self) -> AppResult<Vec<StatusRepair>> {
        let rows = sqlx::query_as::<_, (String, BookStatus, BookStatus)>(
            r#"
            WITH expected AS (
                SELECT b.isbn,
                       b.status AS old_status,
                       CASE WHEN EXISTS (
                           SELECT 1 FROM transactions t
                           WHERE t.isbn = b.isbn AND t.return_date IS NULL
                       ) THEN 'borrowed' ELSE 'available' END AS new_status
                FROM books b
            )
            UPDATE books
            SET status = expected.new_status
            FROM expected
            WHERE books.isbn = expected.isbn AND expected.old_status <> expected.new_status
            RETURNING books.isbn, expected.old_status, expected.new_status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut repairs: Vec<StatusRepair> = rows
            .into_iter()
            .map(|(isbn, from, to)| StatusRepair { isbn, from, to })
            .collect();
        repairs.sort_by(|a, b| a.isbn.cmp(&b.isbn));
        Ok(repairs)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
