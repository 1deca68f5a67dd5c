//! Libris lending server
//!
//! A REST JSON API over a book registry and an append-only lending ledger.
//! Borrow and return are serialized per ISBN, so no book ever has more than
//! one open loan.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<services::Services>,
}
