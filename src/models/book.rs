//! Book registry records

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};

/// Lending status of a book, owned by the lending coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Borrowed,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Borrowed => "borrowed",
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(BookStatus::Available),
            "borrowed" => Ok(BookStatus::Borrowed),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

// SQLx conversion for BookStatus
impl sqlx::Type<Postgres> for BookStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for BookStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BookStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Book record. `isbn` is immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub status: BookStatus,
    pub thumbnail: Option<String>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.status == BookStatus::Available
    }
}

/// New book registration
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(custom(function = "not_blank"))]
    pub isbn: String,
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub author: String,
    pub thumbnail: Option<String>,
}

impl CreateBook {
    /// Validate and trim the request into a record with status AVAILABLE.
    pub fn into_book(self) -> AppResult<Book> {
        self.validate()?;
        Ok(Book {
            isbn: normalize_isbn(&self.isbn)?,
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            status: BookStatus::Available,
            thumbnail: self.thumbnail.filter(|t| !t.trim().is_empty()),
        })
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Trim an ISBN supplied by a caller; blank identifiers are rejected.
pub fn normalize_isbn(isbn: &str) -> AppResult<String> {
    let trimmed = isbn.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("ISBN must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}
