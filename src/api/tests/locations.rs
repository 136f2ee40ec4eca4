use super::*;

#[tokio::test]
async fn test_list_locations_in_config_order() {
    let (registry, config, _dir) = create_test_state().await;
    let app = create_router(registry, config);

    let (status, body) = get_json(app, "/api/v1/locations").await;
    assert_eq!(status, StatusCode::OK);

    let locations = body.as_array().unwrap();
    assert_eq!(locations.len(), 2);
    assert_eq!(locations[0]["id"], PERIMETER);
    assert_eq!(locations[0]["kind"], "structure");
    assert_eq!(locations[1]["name"], "The Forge");
    assert_eq!(locations[1]["kind"], "region");
    assert!(locations[1]["skipped"].is_null());
}

#[tokio::test]
async fn test_get_location_reflects_updates() {
    let (registry, config, _dir) = create_test_state().await;
    registry
        .update_location(FORGE, |s| {
            s.skipped = Some(2);
            s.total_fetches = 9;
        })
        .await;
    let app = create_router(registry, config);

    let (status, body) = get_json(app, &format!("/api/v1/locations/{FORGE}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["skipped"], 2);
    assert_eq!(body["total_fetches"], 9);
}

#[tokio::test]
async fn test_get_unknown_location_is_404() {
    let (registry, config, _dir) = create_test_state().await;
    let app = create_router(registry, config);

    let (status, body) = get_json(app, "/api/v1/locations/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}
