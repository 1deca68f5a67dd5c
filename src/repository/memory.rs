//! Process-local storage backend
//!
//! Books and the ledger live behind one `RwLock`; a commit holds the write
//! half for the whole Append/Close + status flip, so readers never observe
//! one without the other.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BookStore, LedgerStore, LendingChange, LendingStore, StatusRepair};
use crate::{
    error::{AppError, AppResult},
    models::{Book, BookStatus, Transaction, TransactionDetails},
};

#[derive(Default)]
struct State {
    books: HashMap<String, Book>,
    /// Ledger in id order; `transactions[i].id == i + 1`
    transactions: Vec<Transaction>,
    /// ISBN -> index of its ACTIVE transaction
    active: HashMap<String, usize>,
}

impl State {
    fn details(&self, transaction: &Transaction) -> TransactionDetails {
        let title = self.books.get(&transaction.isbn).map(|b| b.title.clone());
        TransactionDetails::new(transaction.clone(), title)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given books
    pub fn with_books(books: impl IntoIterator<Item = Book>) -> Self {
        let mut state = State::default();
        for book in books {
            state.books.insert(book.isbn.clone(), book);
        }
        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn get(&self, isbn: &str) -> AppResult<Option<Book>> {
        Ok(self.state.read().await.books.get(isbn).cloned())
    }

    async fn create(&self, book: Book) -> AppResult<Book> {
        let mut state = self.state.write().await;
        if state.books.contains_key(&book.isbn) {
            return Err(AppError::Conflict(format!(
                "Book with ISBN '{}' already exists",
                book.isbn
            )));
        }
        state.books.insert(book.isbn.clone(), book.clone());
        Ok(book)
    }

    async fn insert_if_absent(&self, book: Book) -> AppResult<Book> {
        let mut state = self.state.write().await;
        let stored = state.books.entry(book.isbn.clone()).or_insert(book);
        Ok(stored.clone())
    }

    async fn list(&self) -> AppResult<Vec<Book>> {
        let state = self.state.read().await;
        let mut books: Vec<Book> = state.books.values().cloned().collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.isbn.cmp(&b.isbn)));
        Ok(books)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn find_active_by_isbn(&self, isbn: &str) -> AppResult<Option<Transaction>> {
        let state = self.state.read().await;
        Ok(state.active.get(isbn).map(|&i| state.transactions[i].clone()))
    }

    async fn find_active_by_user_and_isbn(
        &self,
        user_id: i32,
        isbn: &str,
    ) -> AppResult<Option<Transaction>> {
        let state = self.state.read().await;
        Ok(state
            .active
            .get(isbn)
            .map(|&i| &state.transactions[i])
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<TransactionDetails>> {
        let state = self.state.read().await;
        Ok(state.transactions.iter().map(|t| state.details(t)).collect())
    }

    async fn list_by_user(&self, user_id: i32) -> AppResult<Vec<TransactionDetails>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| state.details(t))
            .collect())
    }
}

#[async_trait]
impl LendingStore for MemoryStore {
    async fn commit(&self, change: LendingChange) -> AppResult<Transaction> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        match change {
            LendingChange::Borrow {
                isbn,
                user_id,
                borrow_date,
            } => {
                let book = state
                    .books
                    .get_mut(&isbn)
                    .ok_or_else(|| AppError::NotFound(format!("Book {} not found", isbn)))?;
                if book.status != BookStatus::Available || state.active.contains_key(&isbn) {
                    return Err(AppError::Conflict(format!("Book {} is already borrowed", isbn)));
                }

                let index = state.transactions.len();
                let transaction = Transaction::open(index as i64 + 1, user_id, &isbn, borrow_date);
                state.transactions.push(transaction.clone());
                state.active.insert(isbn, index);
                book.status = BookStatus::Borrowed;
                Ok(transaction)
            }
            LendingChange::Return {
                transaction_id,
                isbn,
                returned_at,
            } => {
                let book = state
                    .books
                    .get_mut(&isbn)
                    .ok_or_else(|| AppError::NotFound(format!("Book {} not found", isbn)))?;
                let index = *state.active.get(&isbn).ok_or_else(|| {
                    AppError::Conflict(format!("Book {} is not currently borrowed", isbn))
                })?;

                let transaction = &mut state.transactions[index];
                if transaction.id != transaction_id {
                    return Err(AppError::Conflict(format!(
                        "Transaction {} is not the active loan for {}",
                        transaction_id, isbn
                    )));
                }

                transaction.close(returned_at);
                let closed = transaction.clone();
                state.active.remove(&isbn);
                book.status = BookStatus::Available;
                Ok(closed)
            }
        }
    }

    async fn reconcile(&self) -> AppResult<Vec<StatusRepair>> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let mut repairs = Vec::new();
        for (isbn, book) in state.books.iter_mut() {
            let expected = if state.active.contains_key(isbn) {
                BookStatus::Borrowed
            } else {
                BookStatus::Available
            };
            if book.status != expected {
                repairs.push(StatusRepair {
                    isbn: isbn.clone(),
                    from: book.status,
                    to: expected,
                });
                book.status = expected;
            }
        }
        repairs.sort_by(|a, b| a.isbn.cmp(&b.isbn));
        Ok(repairs)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
