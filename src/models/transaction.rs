//! Transaction ledger records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

/// Ledger status; always agrees with the nullability of `return_date`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Active,
    Returned,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Active => "active",
            TransactionStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TransactionStatus::Active),
            "returned" => Ok(TransactionStatus::Returned),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for TransactionStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for TransactionStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for TransactionStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// A borrow/return record. Created by a successful borrow, closed once by a
/// successful return, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i32,
    pub isbn: String,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: TransactionStatus,
}

impl Transaction {
    /// Open a new ACTIVE loan.
    pub fn open(id: i64, user_id: i32, isbn: &str, borrow_date: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            isbn: isbn.to_string(),
            borrow_date,
            return_date: None,
            status: TransactionStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.return_date.is_none()
    }

    /// Close the loan. The only mutation a transaction ever undergoes.
    pub fn close(&mut self, returned_at: DateTime<Utc>) {
        self.return_date = Some(returned_at);
        self.status = TransactionStatus::Returned;
    }
}

/// Ledger entry joined with its book title, for administrative listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TransactionDetails {
    pub id: i64,
    pub user_id: i32,
    pub isbn: String,
    pub title: Option<String>,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: TransactionStatus,
}

impl TransactionDetails {
    pub fn new(transaction: Transaction, title: Option<String>) -> Self {
        Self {
            id: transaction.id,
            user_id: transaction.user_id,
            isbn: transaction.isbn,
            title,
            borrow_date: transaction.borrow_date,
            return_date: transaction.return_date,
            status: transaction.status,
        }
    }
}

/// Successful borrow outcome
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowReceipt {
    pub transaction_id: i64,
    pub isbn: String,
    pub borrow_date: DateTime<Utc>,
}

/// Successful return outcome
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReturnReceipt {
    pub transaction_id: i64,
    pub isbn: String,
    pub returned_at: DateTime<Utc>,
}
