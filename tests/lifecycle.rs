//! Start-up and shutdown of the whole fetcher against a mocked ESI
//!
//! ```bash
//! cargo test --test lifecycle
//! ```

mod common;

use chrono::Utc;
use common::{
    FORGE, PERIMETER, orders_page, test_config, wait_for_location, whole_seconds,
};
use orderbook_fetcher::{AuthError, Error, OrderbookFetcher};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_region_name(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/latest/universe/regions/10000002/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "region_id": FORGE,
            "name": "The Forge"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn region_is_fetched_named_and_persisted() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let expiry = whole_seconds(Utc::now() + chrono::Duration::hours(1));

    mount_region_name(&server).await;
    Mock::given(method("GET"))
        .and(path("/latest/markets/10000002/orders/"))
        .respond_with(orders_page(42, expiry))
        .expect(1)
        .mount(&server)
        .await;

    // Left behind by an interrupted run
    std::fs::write(dir.path().join("10000002_1.csv.tmp"), "ORDERID").unwrap();

    let mut config = test_config(&server, dir.path());
    config.regions = vec![FORGE];

    let fetcher = OrderbookFetcher::start(config).await.unwrap();
    assert!(!dir.path().join("10000002_1.csv.tmp").exists());

    let registry = fetcher.registry();
    let status = wait_for_location(&registry, FORGE, |s| s.total_fetches == 1).await;
    assert_eq!(status.name, "The Forge");
    assert_eq!(status.next_refresh, Some(expiry));

    fetcher.shutdown().await.unwrap();

    let file = dir
        .path()
        .join(format!("{}_{}.csv", FORGE, expiry.timestamp()));
    let contents = std::fs::read_to_string(&file).unwrap();
    assert_eq!(contents.lines().count(), 43);

    let snapshots = registry.snapshots().await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].info.order_count, 42);
    assert_eq!(snapshots[0].info.buy_order_count, 21);
    assert_eq!(snapshots[0].info.location_name, "The Forge");
}

#[tokio::test]
async fn unresolvable_name_falls_back_to_id() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/latest/universe/regions/10000002/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/latest/markets/10000002/orders/"))
        .respond_with(orders_page(1, Utc::now() + chrono::Duration::hours(1)))
        .mount(&server)
        .await;

    let mut config = test_config(&server, dir.path());
    config.regions = vec![FORGE];

    let fetcher = OrderbookFetcher::start(config).await.unwrap();
    let registry = fetcher.registry();
    let status = wait_for_location(&registry, FORGE, |s| s.total_fetches == 1).await;
    fetcher.shutdown().await.unwrap();

    assert_eq!(status.name, "Location 10000002");
    assert_eq!(
        registry.snapshots().await[0].info.location_name,
        "Location 10000002"
    );
}

#[tokio::test]
async fn rejected_initial_token_aborts_start() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/v2/oauth/token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server, dir.path());
    config.citadels = vec![PERIMETER];

    match OrderbookFetcher::start(config).await {
        Err(Error::Auth(AuthError::Rejected { status })) => assert_eq!(status, 401),
        Err(other) => panic!("expected a rejected token, got {other}"),
        Ok(_) => panic!("start should fail without a token"),
    }
}

#[tokio::test]
async fn structure_fetch_uses_refreshed_token() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let expiry = whole_seconds(Utc::now() + chrono::Duration::hours(1));

    Mock::given(method("POST"))
        .and(path("/v2/oauth/token"))
        .and(body_string_contains("client_id=test-client"))
        .and(body_string_contains("refresh_token=test-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "structure-access",
            "expires_in": 1199,
            "token_type": "Bearer",
            "refresh_token": "test-refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/latest/universe/structures/1035466617946/"))
        .and(header("Authorization", "Bearer structure-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "Perimeter - Tranquility Trading Tower",
            "solar_system_id": 30000144
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/latest/markets/structures/1035466617946/"))
        .and(header("Authorization", "Bearer structure-access"))
        .respond_with(orders_page(7, expiry))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server, dir.path());
    config.citadels = vec![PERIMETER];

    let fetcher = OrderbookFetcher::start(config).await.unwrap();
    let registry = fetcher.registry();
    let status = wait_for_location(&registry, PERIMETER, |s| s.total_fetches == 1).await;

    assert_eq!(status.name, "Perimeter - Tranquility Trading Tower");
    assert!(status.last_error.is_none());

    tokio::time::timeout(Duration::from_secs(5), fetcher.shutdown())
        .await
        .expect("shutdown should not wait for the token refresher")
        .unwrap();
}

#[tokio::test]
async fn shutdown_interrupts_waiting_scheduler_and_is_repeatable() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let expiry = whole_seconds(Utc::now() + chrono::Duration::hours(1));

    mount_region_name(&server).await;
    Mock::given(method("GET"))
        .and(path("/latest/markets/10000002/orders/"))
        .respond_with(orders_page(3, expiry))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server, dir.path());
    config.regions = vec![FORGE];

    let fetcher = OrderbookFetcher::start(config).await.unwrap();
    let registry = fetcher.registry();
    wait_for_location(&registry, FORGE, |s| s.total_fetches == 1).await;

    // The scheduler is now sleeping until the hour-long expiry
    tokio::time::timeout(Duration::from_secs(5), fetcher.shutdown())
        .await
        .expect("shutdown should interrupt the sleep")
        .unwrap();
    assert!(fetcher.cancel_token().is_cancelled());
    fetcher.shutdown().await.unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
