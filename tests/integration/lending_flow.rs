//! Lending scenarios driven through the HTTP router

use axum::http::{Method, StatusCode};
use serde_json::json;

use libris_server::models::Role;

use crate::common::{app_with, book, call, token};

const ISBN: &str = "ISBN-1";

#[tokio::test]
async fn test_borrow_return_cycle_between_two_users() {
    let app = app_with(vec![book(ISBN, "Dune")]);
    let u1 = token(1, Role::User);
    let u2 = token(2, Role::User);

    // U1 borrows, U2 is turned away
    let (status, body) = call(&app, Method::POST, "/books/borrow", Some(&u1), Some(json!({ "isbn": ISBN }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["transaction_id"].as_i64().is_some());
    assert!(body["borrow_date"].is_string());

    let (status, body) = call(&app, Method::GET, "/books/ISBN-1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "borrowed");

    let (status, body) = call(&app, Method::POST, "/books/borrow", Some(&u2), Some(json!({ "isbn": ISBN }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InvalidTransition");

    // U2 cannot return U1's loan
    let (status, _) = call(&app, Method::POST, "/books/return", Some(&u2), Some(json!({ "isbn": ISBN }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, body) = call(&app, Method::GET, "/books/ISBN-1/status", Some(&u1), None).await;
    assert_eq!(body["status"], "BORROWED_BY_ME");

    // U1 returns, U2 borrows
    let (status, body) = call(&app, Method::POST, "/books/return", Some(&u1), Some(json!({ "isbn": ISBN }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["returned_at"].is_string());

    let (status, _) = call(&app, Method::POST, "/books/return", Some(&u1), Some(json!({ "isbn": ISBN }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, Method::POST, "/books/borrow", Some(&u2), Some(json!({ "isbn": ISBN }))).await;
    assert_eq!(status, StatusCode::CREATED);

    // Admin sees both records, a regular user does not
    let admin = token(99, Role::Admin);
    let (status, body) = call(&app, Method::GET, "/admin/transactions", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let transactions = body.as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["user_id"], 1);
    assert_eq!(transactions[0]["status"], "returned");
    assert!(transactions[0]["return_date"].is_string());
    assert_eq!(transactions[1]["user_id"], 2);
    assert_eq!(transactions[1]["status"], "active");
    assert!(transactions[1]["return_date"].is_null());
    assert_eq!(transactions[1]["title"], "Dune");

    let (status, _) = call(&app, Method::GET, "/admin/transactions", Some(&u1), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_isbn_is_not_found() {
    let app = app_with(vec![book(ISBN, "Dune")]);
    let u1 = token(1, Role::User);

    for path in ["/books/borrow", "/books/return"] {
        let (status, body) = call(&app, Method::POST, path, Some(&u1), Some(json!({ "isbn": "ISBN-X" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body["error"], "NoSuchBook");
    }
    let (status, _) = call(&app, Method::GET, "/books/ISBN-X/status", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_credentials_are_required_and_checked() {
    let app = app_with(vec![book(ISBN, "Dune")]);

    let (status, body) = call(&app, Method::POST, "/books/borrow", None, Some(json!({ "isbn": ISBN }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");

    let (status, _) = call(&app, Method::POST, "/books/borrow", Some("garbage"), Some(json!({ "isbn": ISBN }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Anonymous status lookups are allowed, bad credentials are not
    let (status, body) = call(&app, Method::GET, "/books/ISBN-1/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "AVAILABLE");
    let (status, _) = call(&app, Method::GET, "/books/ISBN-1/status", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_and_active_transaction_per_caller() {
    let app = app_with(vec![book(ISBN, "Dune")]);
    let u1 = token(1, Role::User);
    let u2 = token(2, Role::User);
    call(&app, Method::POST, "/books/borrow", Some(&u1), Some(json!({ "isbn": ISBN }))).await;

    let (_, body) = call(&app, Method::GET, "/books/ISBN-1/status", Some(&u2), None).await;
    assert_eq!(body["status"], "BORROWED_BY_OTHER");
    let (_, body) = call(&app, Method::GET, "/books/ISBN-1/status", None, None).await;
    assert_eq!(body["status"], "BORROWED_BY_OTHER");

    let (status, body) = call(&app, Method::GET, "/books/ISBN-1/transaction", Some(&u1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_active_transaction"], true);
    assert!(body["transaction_id"].is_i64());

    let (_, body) = call(&app, Method::GET, "/books/ISBN-1/transaction", Some(&u2), None).await;
    assert_eq!(body["has_active_transaction"], false);
    assert!(body["transaction_id"].is_null());

    let (_, body) = call(&app, Method::GET, "/me/transactions", Some(&u1), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = call(&app, Method::GET, "/me/transactions", Some(&u2), None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_isbn_is_rejected() {
    let app = app_with(vec![book(ISBN, "Dune")]);
    let u1 = token(1, Role::User);

    let (status, _) = call(&app, Method::POST, "/books/borrow", Some(&u1), Some(json!({ "isbn": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&app, Method::POST, "/books/borrow", Some(&u1), Some(json!({ "isbn": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_http_borrows_yield_one_success() {
    let app = app_with(vec![book(ISBN, "Dune")]);

    let requests: Vec<_> = (1..=16)
        .map(|id| {
            let app = app.clone();
            tokio::spawn(async move {
                let token = token(id, Role::User);
                call(&app, Method::POST, "/books/borrow", Some(&token), Some(json!({ "isbn": ISBN })))
                    .await
                    .0
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for request in requests {
        statuses.push(request.await.unwrap());
    }

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert!(statuses
        .iter()
        .all(|s| *s == StatusCode::CREATED || *s == StatusCode::CONFLICT));
}

#[tokio::test]
async fn test_catalog_registration_and_search() {
    let app = app_with(vec![]);
    let librarian = token(5, Role::Librarian);
    let reader = token(1, Role::User);
    let request = json!({ "isbn": "ISBN-9", "title": "Emma", "author": "Jane Austen" });

    let (status, _) = call(&app, Method::POST, "/books", Some(&reader), Some(request.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::POST, "/books", Some(&librarian), Some(request.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "available");

    let (status, _) = call(&app, Method::POST, "/books", Some(&librarian), Some(request)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, Method::GET, "/books/search?query=dune", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = call(&app, Method::GET, "/books", None, None).await;
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Dune", "Dune Messiah", "Emma"]);

    let (status, _) = call(&app, Method::GET, "/books/search?query=%20", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_summary_and_health() {
    let app = app_with(vec![book(ISBN, "Dune"), book("ISBN-2", "Emma")]);
    let u1 = token(1, Role::User);
    call(&app, Method::POST, "/books/borrow", Some(&u1), Some(json!({ "isbn": ISBN }))).await;

    let admin = token(99, Role::Admin);
    let (status, body) = call(&app, Method::GET, "/admin/summary", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_books"], 2);
    assert_eq!(body["borrowed_books"], 1);
    assert_eq!(body["available_books"], 1);
    assert_eq!(body["active_loans"], 1);

    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    let (status, body) = call(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}
