//! Borrow and return endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{BorrowReceipt, ReturnReceipt, TransactionDetails},
    AppState,
};

use super::AuthenticatedUser;

/// Borrow or return request
#[derive(Deserialize, Validate, ToSchema)]
pub struct BookAction {
    #[validate(length(min = 1))]
    pub isbn: String,
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/books/borrow",
    tag = "lending",
    security(("bearer_auth" = [])),
    request_body = BookAction,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowReceipt),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book already borrowed"),
        (status = 503, description = "Book busy, retry later")
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Json(request): Json<BookAction>,
) -> AppResult<(StatusCode, Json<BorrowReceipt>)> {
    request.validate()?;

    let receipt = state.services.lending.borrow(&identity, &request.isbn).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/books/return",
    tag = "lending",
    security(("bearer_auth" = [])),
    request_body = BookAction,
    responses(
        (status = 200, description = "Book returned", body = ReturnReceipt),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Loan belongs to another user"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book is not currently borrowed"),
        (status = 503, description = "Book busy, retry later")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Json(request): Json<BookAction>,
) -> AppResult<Json<ReturnReceipt>> {
    request.validate()?;

    let receipt = state.services.lending.return_book(&identity, &request.isbn).await?;
    Ok(Json(receipt))
}

/// The caller's own lending history
#[utoipa::path(
    get,
    path = "/me/transactions",
    tag = "lending",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's transactions", body = Vec<TransactionDetails>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn my_transactions(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> AppResult<Json<Vec<TransactionDetails>>> {
    let history = state.services.reports.user_history(&identity).await?;
    Ok(Json(history))
}
