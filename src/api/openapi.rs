//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, books, health, lending};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "0.3.0",
        description = "Book lending REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::create_book,
        books::search_books,
        books::get_book,
        books::get_loan_status,
        books::get_active_transaction,
        // Lending
        lending::borrow_book,
        lending::return_book,
        lending::my_transactions,
        // Admin
        admin::list_transactions,
        admin::summary,
    ),
    components(
        schemas(
            // Books
            crate::models::Book,
            crate::models::BookStatus,
            crate::models::CreateBook,
            crate::models::LoanStatus,
            books::LoanStatusResponse,
            books::ActiveTransactionResponse,
            // Lending
            lending::BookAction,
            crate::models::BorrowReceipt,
            crate::models::ReturnReceipt,
            crate::models::TransactionDetails,
            crate::models::TransactionStatus,
            // Admin
            crate::models::LedgerSummary,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book registry and catalog search"),
        (name = "lending", description = "Borrow and return"),
        (name = "admin", description = "Ledger administration")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
