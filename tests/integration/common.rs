//! Shared helpers: an in-process router over the memory backend

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;

use libris_server::{
    api,
    config::AppConfig,
    models::{identity::Claims, Book, BookStatus, Role},
    repository::{memory::MemoryStore, Repository},
    services::{
        catalog::{CatalogClient, IndustryIdentifier, Volume, VolumeInfo},
        Services,
    },
    AppResult, AppState,
};

pub const SECRET: &str = "integration-secret";

/// Catalog that always answers with the same two volumes
struct FixedCatalog;

#[async_trait]
impl CatalogClient for FixedCatalog {
    async fn search_volumes(&self, _query: &str) -> AppResult<Vec<Volume>> {
        let volume = |title: &str, isbn: &str| Volume {
            volume_info: VolumeInfo {
                title: Some(title.to_string()),
                authors: vec!["Frank Herbert".to_string()],
                industry_identifiers: vec![IndustryIdentifier {
                    kind: "ISBN_13".to_string(),
                    identifier: isbn.to_string(),
                }],
                image_links: None,
            },
        };
        Ok(vec![
            volume("Dune", "9780441013593"),
            volume("Dune Messiah", "9780593098233"),
        ])
    }
}

pub fn book(isbn: &str, title: &str) -> Book {
    Book {
        isbn: isbn.to_string(),
        title: title.to_string(),
        author: "Author".to_string(),
        status: BookStatus::Available,
        thumbnail: None,
    }
}

pub fn app_with(books: Vec<Book>) -> Router {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = SECRET.to_string();

    let repository = Repository::new(MemoryStore::with_books(books));
    let services = Services::with_catalog_client(repository, &config, Arc::new(FixedCatalog));

    api::router(AppState {
        services: Arc::new(services),
    })
}

pub fn token(user_id: i32, role: Role) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: format!("user{}", user_id),
        user_id,
        role,
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// Send one request through the router and decode the JSON body
pub async fn call(
    app: &Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(format!("/api/v1{}", path));
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    // Extractor rejections answer with plain text
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}
