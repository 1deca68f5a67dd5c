//! Reporting read model
//!
//! Pure projections over the registry and ledger. Nothing here takes the
//! lending section or writes to storage.

use crate::{
    error::{AppError, AppResult},
    models::{
        book::normalize_isbn, BookStatus, Identity, LedgerSummary, LoanStatus, Role, Transaction,
        TransactionDetails,
    },
    repository::Repository,
    services::guard::AccessGuard,
};

#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
}

impl ReportsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Status of `isbn` relative to `user_id`; `None` is an anonymous caller.
    pub async fn active_loan_status(&self, isbn: &str, user_id: Option<i32>) -> AppResult<LoanStatus> {
        let isbn = normalize_isbn(isbn)?;
        let book = self
            .repository
            .books
            .get(&isbn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", isbn)))?;

        let active = self.repository.ledger.find_active_by_isbn(&isbn).await?;
        let status = match (active, user_id) {
            (Some(t), Some(user_id)) if t.user_id == user_id => LoanStatus::BorrowedByMe,
            (Some(_), _) => LoanStatus::BorrowedByOther,
            (None, _) if book.status == BookStatus::Borrowed => {
                tracing::warn!(isbn = %isbn, "Book marked borrowed without an active transaction");
                LoanStatus::BorrowedByOther
            }
            (None, _) => LoanStatus::Available,
        };
        Ok(status)
    }

    /// The caller's own ACTIVE transaction on `isbn`, if any
    pub async fn active_transaction_for(
        &self,
        identity: &Identity,
        isbn: &str,
    ) -> AppResult<Option<Transaction>> {
        let isbn = normalize_isbn(isbn)?;
        if self.repository.books.get(&isbn).await?.is_none() {
            return Err(AppError::NotFound(format!("Book {} not found", isbn)));
        }
        self.repository
            .ledger
            .find_active_by_user_and_isbn(identity.user_id, &isbn)
            .await
    }

    /// Every transaction, admin only
    pub async fn list_all(&self, identity: &Identity) -> AppResult<Vec<TransactionDetails>> {
        AccessGuard::require_role(identity, Role::Admin)?;
        self.repository.ledger.list_all().await
    }

    pub async fn user_history(&self, identity: &Identity) -> AppResult<Vec<TransactionDetails>> {
        self.repository.ledger.list_by_user(identity.user_id).await
    }

    /// Aggregate counts, admin only
    pub async fn summary(&self, identity: &Identity) -> AppResult<LedgerSummary> {
        AccessGuard::require_role(identity, Role::Admin)?;

        let books = self.repository.books.list().await?;
        let transactions = self.repository.ledger.list_all().await?;

        let borrowed_books = books.iter().filter(|b| !b.is_available()).count() as i64;
        let active_loans = transactions.iter().filter(|t| t.return_date.is_none()).count() as i64;

        Ok(LedgerSummary {
            total_books: books.len() as i64,
            borrowed_books,
            available_books: books.len() as i64 - borrowed_books,
            active_loans,
            total_transactions: transactions.len() as i64,
        })
    }
}
