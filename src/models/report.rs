//! Read-model projections over the ledger

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lending status of a book as seen by a particular caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Available,
    BorrowedByMe,
    BorrowedByOther,
}

/// Aggregate counts across the registry and ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LedgerSummary {
    pub total_books: i64,
    pub borrowed_books: i64,
    pub available_books: i64,
    pub active_loans: i64,
    pub total_transactions: i64,
}
