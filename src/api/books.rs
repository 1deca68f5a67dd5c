//! Book registry and catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::{Book, CreateBook, LoanStatus},
    AppState,
};

use super::{AuthenticatedUser, MaybeAuthenticated};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Title, author or free text passed to the external catalog
    pub query: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoanStatusResponse {
    pub isbn: String,
    pub status: LoanStatus,
}

/// Whether the caller currently holds the book
#[derive(Serialize, ToSchema)]
pub struct ActiveTransactionResponse {
    pub has_active_transaction: bool,
    pub transaction_id: Option<i64>,
    pub borrow_date: Option<DateTime<Utc>>,
}

/// List registered books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "Registered books ordered by title", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books().await?;
    Ok(Json(books))
}

/// Register a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book registered", body = Book),
        (status = 400, description = "Missing title, author or ISBN"),
        (status = 403, description = "Librarian role required"),
        (status = 409, description = "ISBN already registered")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Json(request): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.catalog.create_book(&identity, request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Search the external catalog
#[utoipa::path(
    get,
    path = "/books/search",
    tag = "books",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching books with their lending status", body = Vec<Book>),
        (status = 400, description = "Empty query"),
        (status = 502, description = "External catalog unavailable")
    )
)]
pub async fn search_books(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.search(&query.query).await?;
    Ok(Json(books))
}

/// Get a book by ISBN
#[utoipa::path(
    get,
    path = "/books/{isbn}",
    tag = "books",
    params(
        ("isbn" = String, Path, description = "Book ISBN")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(&isbn).await?;
    Ok(Json(book))
}

/// Lending status of a book relative to the caller
#[utoipa::path(
    get,
    path = "/books/{isbn}/status",
    tag = "books",
    params(
        ("isbn" = String, Path, description = "Book ISBN")
    ),
    responses(
        (status = 200, description = "AVAILABLE, BORROWED_BY_ME or BORROWED_BY_OTHER", body = LoanStatusResponse),
        (status = 401, description = "Invalid credential"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_loan_status(
    State(state): State<AppState>,
    MaybeAuthenticated(identity): MaybeAuthenticated,
    Path(isbn): Path<String>,
) -> AppResult<Json<LoanStatusResponse>> {
    let user_id = identity.map(|i| i.user_id);
    let status = state.services.reports.active_loan_status(&isbn, user_id).await?;
    Ok(Json(LoanStatusResponse {
        isbn: isbn.trim().to_string(),
        status,
    }))
}

/// The caller's active transaction on a book
#[utoipa::path(
    get,
    path = "/books/{isbn}/transaction",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("isbn" = String, Path, description = "Book ISBN")
    ),
    responses(
        (status = 200, description = "Active transaction of the caller, if any", body = ActiveTransactionResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_active_transaction(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(isbn): Path<String>,
) -> AppResult<Json<ActiveTransactionResponse>> {
    let active = state
        .services
        .reports
        .active_transaction_for(&identity, &isbn)
        .await?;

    Ok(Json(ActiveTransactionResponse {
        has_active_transaction: active.is_some(),
        transaction_id: active.as_ref().map(|t| t.id),
        borrow_date: active.map(|t| t.borrow_date),
    }))
}
