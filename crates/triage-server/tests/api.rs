//! API integration tests
//!
//! Drives the full router against an in-memory SQLite store with the
//! keyword-only dispatcher, so no network or external backend is needed.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower::ServiceExt;
use triage_classifiers::{ClassifierDispatcher, KeywordClassifier};
use triage_server::{routes, AppState, TicketStore};

async fn test_app() -> Router {
    let pool = SqlitePoolOptions::new()
        // A pool of one keeps every query on the same in-memory database
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    let store = TicketStore::with_pool(pool);
    store.init_schema().await.unwrap();

    let dispatcher = Arc::new(ClassifierDispatcher::fallback_only(
        KeywordClassifier::new().unwrap(),
    ));

    routes::create_router(AppState::new(store, dispatcher, None))
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_ticket_classifies_and_persists() {
    let app = test_app().await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/tickets",
        Some(json!({"text": "Database server keeps crashing with memory errors"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["body"], "Database server keeps crashing with memory errors");

    let classification = &body["classification"];
    assert_eq!(classification["category"], "technical");
    assert_eq!(classification["model_name"], "keyword-fallback-v1");
    let confidence = classification["confidence_score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&confidence));

    // Round-trips through the store.
    let id = body["id"].as_i64().unwrap();
    let (status, fetched) = send_json(&app, "GET", &format!("/v1/tickets/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["classification"]["category"], "technical");
}

#[tokio::test]
async fn subject_and_body_requests_are_accepted() {
    let app = test_app().await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/tickets",
        Some(json!({
            "subject": "Billing Issue",
            "body": "I was charged twice for my subscription, please refund"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["subject"], "Billing Issue");
    assert_eq!(body["classification"]["category"], "billing");
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let app = test_app().await;

    let (status, body) = send_json(&app, "POST", "/v1/tickets", Some(json!({"body": "short"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");

    let (status, _) = send_json(&app, "POST", "/v1/tickets", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_ticket_is_404() {
    let app = test_app().await;

    let (status, body) = send_json(&app, "GET", "/v1/tickets/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");
}

#[tokio::test]
async fn listing_filters_by_category() {
    let app = test_app().await;

    for text in [
        "Database server keeps crashing with memory errors",
        "I was charged twice for my subscription, please refund",
        "What are your support hours this week?",
    ] {
        let (status, _) = send_json(&app, "POST", "/v1/tickets", Some(json!({"text": text}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send_json(&app, "GET", "/v1/tickets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 3);

    let (status, body) = send_json(&app, "GET", "/v1/tickets?category=billing", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["classification"]["category"], "billing");

    let (status, body) = send_json(&app, "GET", "/v1/tickets?category=banana", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");
}

#[tokio::test]
async fn stats_summarize_recent_tickets() {
    let app = test_app().await;

    for text in [
        "Database server keeps crashing with memory errors",
        "Another error in the application after the update",
    ] {
        send_json(&app, "POST", "/v1/tickets", Some(json!({"text": text}))).await;
    }

    let (status, body) = send_json(&app, "GET", "/v1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_tickets"], 2);
    assert_eq!(body["period_days"], 7);
    assert!(body["average_confidence"].as_f64().unwrap() > 0.0);

    let categories = body["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 3);
    assert_eq!(categories[0]["category"], "technical");
    assert_eq!(categories[0]["count"], 2);

    let (status, _) = send_json(&app, "GET", "/v1/stats?days=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
