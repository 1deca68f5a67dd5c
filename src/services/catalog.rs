//! Catalog service: book registration and external catalog search
//!
//! Search results from the external catalog are imported into the registry
//! as AVAILABLE books on first sight; later searches return the stored
//! record, so the status shown always reflects current lending state.

use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    config::CatalogConfig,
    error::{AppError, AppResult},
    models::{book::normalize_isbn, Book, BookStatus, CreateBook, Identity, Role},
    repository::Repository,
    services::guard::AccessGuard,
};

const UNKNOWN: &str = "Unknown";

// Google Books volume payload, reduced to the fields used here

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeList {
    #[serde(default)]
    pub items: Vec<Volume>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default)]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub industry_identifiers: Vec<IndustryIdentifier>,
    pub image_links: Option<ImageLinks>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndustryIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
}

impl VolumeInfo {
    /// ISBN-13 if present, else ISBN-10
    pub fn preferred_isbn(&self) -> Option<String> {
        let find = |kind: &str| {
            self.industry_identifiers
                .iter()
                .find(|id| id.kind == kind)
                .map(|id| id.identifier.trim().to_string())
                .filter(|isbn| !isbn.is_empty() && isbn != UNKNOWN)
        };
        find("ISBN_13").or_else(|| find("ISBN_10"))
    }

    /// Registry record for this volume, or `None` if it has no usable ISBN
    pub fn to_book(&self) -> Option<Book> {
        let isbn = self.preferred_isbn()?;
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string();
        let author = if self.authors.is_empty() {
            UNKNOWN.to_string()
        } else {
            self.authors.join(", ")
        };

        Some(Book {
            isbn,
            title,
            author,
            status: BookStatus::Available,
            thumbnail: self.image_links.as_ref().and_then(|l| l.thumbnail.clone()),
        })
    }
}

/// External bibliographic catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn search_volumes(&self, query: &str) -> AppResult<Vec<Volume>>;
}

/// Google Books API client
pub struct GoogleBooksClient {
    client: reqwest::Client,
    base_url: String,
    max_results: u32,
}

impl GoogleBooksClient {
    pub fn new(config: &CatalogConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }
}

#[async_trait]
impl CatalogClient for GoogleBooksClient {
    async fn search_volumes(&self, query: &str) -> AppResult<Vec<Volume>> {
        let url = format!("{}/volumes", self.base_url);
        let max_results = self.max_results.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Catalog(format!("Catalog request failed: {}", e)))?;

        let volumes: VolumeList = response
            .json()
            .await
            .map_err(|e| AppError::Catalog(format!("Invalid catalog response: {}", e)))?;

        Ok(volumes.items)
    }
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    client: Arc<dyn CatalogClient>,
}

impl CatalogService {
    pub fn new(repository: Repository, client: Arc<dyn CatalogClient>) -> Self {
        Self { repository, client }
    }

    /// Search the external catalog and import unseen books
    pub async fn search(&self, query: &str) -> AppResult<Vec<Book>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Search query must not be empty".to_string()));
        }

        let volumes = self.client.search_volumes(query).await.map_err(|e| {
            tracing::error!(query = %query, error = %e, "Catalog search failed");
            e
        })?;

        let mut seen = HashSet::new();
        let mut books = Vec::new();
        for volume in volumes {
            let Some(book) = volume.volume_info.to_book() else {
                tracing::debug!(title = ?volume.volume_info.title, "Skipping volume without ISBN");
                continue;
            };
            if !seen.insert(book.isbn.clone()) {
                continue;
            }
            books.push(self.repository.books.insert_if_absent(book).await?);
        }

        tracing::info!(query = %query, results = books.len(), "Catalog search completed");
        Ok(books)
    }

    /// Register a book by hand; librarian or admin only
    pub async fn create_book(&self, identity: &Identity, request: CreateBook) -> AppResult<Book> {
        AccessGuard::require_role(identity, Role::Librarian)?;
        let book = self.repository.books.create(request.into_book()?).await?;
        tracing::info!(isbn = %book.isbn, user_id = identity.user_id, "Book registered");
        Ok(book)
    }

    pub async fn get_book(&self, isbn: &str) -> AppResult<Book> {
        let isbn = normalize_isbn(isbn)?;
        self.repository
            .books
            .get(&isbn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", isbn)))
    }

    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }
}
