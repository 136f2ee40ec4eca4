//! Common test utilities for orderbook-fetcher integration tests

use chrono::{DateTime, TimeZone, Utc};
use orderbook_fetcher::config::{BackoffConfig, EsiConfig, RetryConfig};
use orderbook_fetcher::{Config, LocationStatus, Registry};
use std::path::Path;
use std::time::Duration;
use wiremock::{MockServer, ResponseTemplate};

pub const FORGE: u64 = 10000002;
pub const PERIMETER: u64 = 1035466617946;

/// Whole-second instant, as it survives an HTTP date header
pub fn whole_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(at.timestamp(), 0).unwrap()
}

pub fn expires_header(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// A page of `count` alternating sell/buy orders with an Expires header
pub fn orders_page(count: usize, expiry: DateTime<Utc>) -> ResponseTemplate {
    let orders: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "duration": 90,
                "is_buy_order": i % 2 == 1,
                "issued": "2026-10-01T08:00:00Z",
                "location_id": 60003760,
                "min_volume": 1,
                "order_id": 5_000_000_000i64 + i as i64,
                "price": 1234.56,
                "range": "region",
                "system_id": 30000142,
                "type_id": 44992,
                "volume_remain": 3,
                "volume_total": 5
            })
        })
        .collect();

    ResponseTemplate::new(200)
        .insert_header("Expires", expires_header(expiry).as_str())
        .set_body_json(orders)
}

/// Configuration pointing every upstream URL at the mock server
pub fn test_config(server: &MockServer, output_dir: &Path) -> Config {
    Config {
        retention_period: 2,
        interval: 1,
        output_dir: output_dir.to_path_buf(),
        client_id: "test-client".into(),
        refresh_token: "test-refresh".into(),
        esi: EsiConfig {
            base_url: format!("{}/latest/", server.uri()),
            token_url: format!("{}/v2/oauth/token", server.uri()),
            expiry_grace: Duration::ZERO,
            ..Default::default()
        },
        page_retry: RetryConfig {
            max_retries: 3,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 2.0,
            jitter: false,
        },
        failure_backoff: BackoffConfig {
            initial_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(3600),
            multiplier: 2.0,
            jitter: false,
        },
        ..Default::default()
    }
}

/// Poll the registry until a location satisfies `predicate`
pub async fn wait_for_location<F>(registry: &Registry, id: u64, predicate: F) -> LocationStatus
where
    F: Fn(&LocationStatus) -> bool,
{
    for _ in 0..200 {
        if let Some(status) = registry.location(id).await
            && predicate(&status)
        {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("location {id} never reached the expected status");
}
