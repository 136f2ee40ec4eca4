use super::*;
use crate::types::{Location, OrderbookInfo, SnapshotId};
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

mod locations;

const FORGE: u64 = 10000002;
const PERIMETER: u64 = 1035466617946;

/// Registry with two locations and three Forge snapshots on disk
async fn create_test_state() -> (Registry, Arc<Config>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        regions: vec![FORGE],
        output_dir: dir.path().to_path_buf(),
        ..Default::default()
    };

    let registry = Registry::new();
    registry
        .register_location(Location::structure(PERIMETER), "Perimeter - Tranquility Trading Tower")
        .await;
    registry
        .register_location(Location::region(FORGE), "The Forge")
        .await;

    for (n, orders) in [(1, 10), (2, 20), (3, 30)] {
        let expiry = Utc.timestamp_opt(1_760_000_000 + n * 300, 0).unwrap();
        let id = SnapshotId::for_location(FORGE, expiry);
        std::fs::write(
            dir.path().join(id.as_str()),
            format!("{}\n", crate::snapshot::CSV_HEADER),
        )
        .unwrap();

        let mut info = OrderbookInfo::new(Location::region(FORGE), "The Forge", expiry);
        info.order_count = orders;
        info.sell_order_count = orders;
        registry.insert_snapshot(id, info).await;
    }

    (registry, Arc::new(config), dir)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health_reports_counts() {
    let (registry, config, _dir) = create_test_state().await;
    let app = create_router(registry, config);

    let (status, body) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["locations"], 2);
    assert_eq!(body["snapshots"], 3);
}

#[tokio::test]
async fn test_openapi_endpoint() {
    let (registry, config, _dir) = create_test_state().await;
    let app = create_router(registry, config);

    let (status, body) = get_json(app, "/api/v1/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/snapshots"].is_object());
}

#[tokio::test]
async fn test_snapshot_files_are_served() {
    let (registry, config, _dir) = create_test_state().await;
    let app = create_router(registry, config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orderbooks/10000002_1760000300.csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"ORDERID,TYPEID"));
}

#[tokio::test]
async fn test_missing_snapshot_file_is_404() {
    let (registry, config, _dir) = create_test_state().await;
    let app = create_router(registry, config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orderbooks/10000002_1.csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_enabled() {
    let (registry, config, _dir) = create_test_state().await;
    let app = create_router(registry, config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS headers should be present"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (registry, config, _dir) = create_test_state().await;
    let mut config = (*config).clone();
    config.api.cors_enabled = false;
    let app = create_router(registry, Arc::new(config));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_api_server_stops_on_cancel() {
    let (registry, config, _dir) = create_test_state().await;
    let mut config = (*config).clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(start_api_server(
        registry,
        Arc::new(config),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server should stop after cancellation")
        .unwrap();
    assert!(result.is_ok());
}
