//! Integration tests for the explorer HTTP endpoints
//!
//! Tests cover:
//! - Health endpoint
//! - Snapshot meta before and after a refresh
//! - Refresh response shape
//! - School comparison parameter handling

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dissertation_explorer::models::DissertationSummary;
use dissertation_explorer::{build_router, AppState, MemorySource, SnapshotStore};
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

fn catalog() -> Vec<DissertationSummary> {
    vec![
        DissertationSummary::new(Some(1941), Some("Harvard University")),
        DissertationSummary::new(Some(1947), Some("Harvard University")),
        DissertationSummary::new(Some(1947), Some("Harvard University")),
        DissertationSummary::new(Some(1941), Some("Columbia University")),
        DissertationSummary::new(None, Some("Columbia University")),
        DissertationSummary::new(Some(1927), Some("Leipzig University")),
    ]
}

/// Test helper: router over an in-memory catalog and a temporary data directory
fn setup_app(dir: &TempDir) -> axum::Router {
    let source = Arc::new(MemorySource::new(catalog()));
    let store = Arc::new(SnapshotStore::new(dir.path().join("data")));
    build_router(AppState::new(source, store))
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir);

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "dissertation-explorer");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_meta_missing_before_refresh() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir);

    let response = app
        .oneshot(test_request("GET", "/api/explorer/snapshot/meta"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("Snapshot not found"));
}

#[tokio::test]
async fn test_refresh_then_read_meta() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir);

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/explorer/refresh-snapshot"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let refreshed = extract_json(response.into_body()).await;
    assert_eq!(refreshed["success"], true);
    assert_eq!(refreshed["record_count"], 6);
    assert_eq!(refreshed["school_count"], 3);
    assert_eq!(refreshed["year_range"], serde_json::json!([1927, 1947]));

    let response = app
        .oneshot(test_request("GET", "/api/explorer/snapshot/meta"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let meta = extract_json(response.into_body()).await;
    assert_eq!(meta["snapshot_id"], refreshed["snapshot_id"]);
    assert!(meta.get("success").is_none());
}

#[tokio::test]
async fn test_compare_requires_schools() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/explorer/schools/compare"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(test_request("GET", "/api/explorer/schools/compare?schools=%20,"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compare_returns_sparse_series() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir);

    let uri = "/api/explorer/schools/compare?schools=Harvard%20University,Columbia%20University,Nowhere";
    let response = app.oneshot(test_request("GET", uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body["Harvard University"],
        serde_json::json!([{"year": 1941, "count": 1}, {"year": 1947, "count": 2}])
    );
    assert_eq!(
        body["Columbia University"],
        serde_json::json!([{"year": 1941, "count": 1}])
    );
    assert_eq!(body["Nowhere"], serde_json::json!([]));
    assert!(body.get("Leipzig University").is_none());
}

#[tokio::test]
async fn test_compare_caps_school_count() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir);

    let response = app
        .oneshot(test_request(
            "GET",
            "/api/explorer/schools/compare?schools=a,b,c,d,e,f,g",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_object().unwrap().len(), 5);
    assert!(body.get("f").is_none());
}
