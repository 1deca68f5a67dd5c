//! Data models for Libris

pub mod book;
pub mod identity;
pub mod report;
pub mod transaction;

// Re-export commonly used types
pub use book::{Book, BookStatus, CreateBook};
pub use identity::{Identity, Role};
pub use report::{LedgerSummary, LoanStatus};
pub use transaction::{BorrowReceipt, ReturnReceipt, Transaction, TransactionDetails, TransactionStatus};
