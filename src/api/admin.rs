//! Administrator endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::{LedgerSummary, TransactionDetails},
    AppState,
};

use super::AuthenticatedUser;

/// List every transaction in the ledger
#[utoipa::path(
    get,
    path = "/admin/transactions",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All transactions ordered by id", body = Vec<TransactionDetails>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> AppResult<Json<Vec<TransactionDetails>>> {
    let transactions = state.services.reports.list_all(&identity).await?;
    Ok(Json(transactions))
}

/// Registry and ledger totals
#[utoipa::path(
    get,
    path = "/admin/summary",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Aggregate counts", body = LedgerSummary),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn summary(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> AppResult<Json<LedgerSummary>> {
    let summary = state.services.reports.summary(&identity).await?;
    Ok(Json(summary))
}
