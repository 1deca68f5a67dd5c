//! Business logic services

pub mod catalog;
pub mod guard;
pub mod lending;
pub mod locks;
pub mod reports;

use std::sync::Arc;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub guard: guard::AccessGuard,
    pub catalog: catalog::CatalogService,
    pub lending: lending::LendingService,
    pub reports: reports::ReportsService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository, searching Google Books
    pub fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let client = catalog::GoogleBooksClient::new(&config.catalog)?;
        Ok(Self::with_catalog_client(repository, config, Arc::new(client)))
    }

    /// Create all services with a caller-supplied catalog client
    pub fn with_catalog_client(
        repository: Repository,
        config: &AppConfig,
        client: Arc<dyn catalog::CatalogClient>,
    ) -> Self {
        Self {
            guard: guard::AccessGuard::new(&config.auth),
            catalog: catalog::CatalogService::new(repository.clone(), client),
            lending: lending::LendingService::new(repository.clone(), config.lending.lock_timeout()),
            reports: reports::ReportsService::new(repository.clone()),
            repository,
        }
    }

    /// Check that storage is reachable
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.lending.ping().await
    }
}
