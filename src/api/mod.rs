//! API handlers for Libris REST endpoints

pub mod admin;
pub mod books;
pub mod health;
pub mod lending;
pub mod openapi;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::Identity, AppState};

/// Extractor for an authenticated caller from the bearer token
pub struct AuthenticatedUser(pub Identity);

/// Like [`AuthenticatedUser`], but an absent header yields an anonymous caller
pub struct MaybeAuthenticated(pub Option<Identity>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = value
        .to_str()
        .map_err(|_| AppError::Authentication("Invalid authorization header".to_string()))?;

    // Check for Bearer token
    header
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let identity = state.services.guard.resolve(token)?;
        Ok(AuthenticatedUser(identity))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = bearer_token(parts)?
            .map(|token| state.services.guard.resolve(token))
            .transpose()?;
        Ok(MaybeAuthenticated(identity))
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Registry and catalog
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/search", get(books::search_books))
        .route("/books/:isbn", get(books::get_book))
        .route("/books/:isbn/status", get(books::get_loan_status))
        .route("/books/:isbn/transaction", get(books::get_active_transaction))
        // Lending
        .route("/books/borrow", post(lending::borrow_book))
        .route("/books/return", post(lending::return_book))
        .route("/me/transactions", get(lending::my_transactions))
        // Administration
        .route("/admin/transactions", get(admin::list_transactions))
        .route("/admin/summary", get(admin::summary))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
