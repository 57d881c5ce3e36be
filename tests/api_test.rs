mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use cenerg::api::{AppState, INTERNAL_ERROR_MESSAGE, NOT_FOUND_MESSAGE, router};
use cenerg::application::BalanceService;
use common::{StandardHouses, count_rows, test_service};

fn app(service: &BalanceService) -> Router {
    router(Arc::new(AppState::new(service.clone())))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_read_recharge_scenario() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardHouses::create_basic(&service).await?;
    let app = app(&service);

    let (status, json) = send(&app, Method::GET, "/api/house/12/energy", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"house_number": 12, "remaining_energy": 50.0}));

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/house/12/energy/recharge",
        Some(json!({"amount": 25.5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["house_number"], 12);
    assert_eq!(json["remaining_energy"], 75.5);
    assert_eq!(json["recharged_amount"], 25.5);
    let last_update = json["last_update"].as_str().expect("last_update is a string");
    assert!(chrono::DateTime::parse_from_rfc3339(last_update).is_ok());

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/house/999/energy/recharge",
        Some(json!({"amount": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({"error": NOT_FOUND_MESSAGE}));

    assert_eq!(service.count_recharges(12).await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_update_endpoint_replaces_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardHouses::create_basic(&service).await?;
    let app = app(&service);

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/house/12/energy/update",
        Some(json!({"remaining_energy": 12.75})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["house_number"], 12);
    assert_eq!(json["remaining_energy"], 12.75);
    assert!(json["last_update"].is_string());
    assert!(json.get("recharged_amount").is_none());

    let (_, json) = send(&app, Method::GET, "/api/house/12/energy", None).await;
    assert_eq!(json["remaining_energy"], 12.75);

    // Updates are not audited as recharges
    assert_eq!(service.count_recharges(12).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_unknown_house_returns_404_on_every_route() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardHouses::create_basic(&service).await?;
    let app = app(&service);

    let (status, json) = send(&app, Method::GET, "/api/house/999/energy", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], NOT_FOUND_MESSAGE);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/house/999/energy/update",
        Some(json!({"remaining_energy": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A non-numeric house number cannot match any house
    let (status, json) = send(&app, Method::GET, "/api/house/abc/energy", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], NOT_FOUND_MESSAGE);

    Ok(())
}

#[tokio::test]
async fn test_amount_sent_as_string_is_accepted() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardHouses::create_basic(&service).await?;
    let app = app(&service);

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/house/7/energy/recharge",
        Some(json!({"amount": "10"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["remaining_energy"], 10.0);
    assert_eq!(json["recharged_amount"], 10.0);

    Ok(())
}

#[tokio::test]
async fn test_bad_bodies_return_400_without_side_effects() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardHouses::create_basic(&service).await?;
    let app = app(&service);

    let bodies = [
        json!({}),
        json!({"amount": "lots"}),
        json!({"amount": 0}),
        json!({"amount": -3}),
    ];
    for body in bodies {
        let (status, json) = send(
            &app,
            Method::POST,
            "/api/house/12/energy/recharge",
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/house/12/energy/recharge")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(service.get_balance(12).await?.remaining_energy_wh, 50_000);
    assert_eq!(service.count_recharges(12).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_sub_wh_values_are_rejected_not_rounded() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardHouses::create_basic(&service).await?;
    let app = app(&service);

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/house/12/energy/update",
        Some(json!({"remaining_energy": 12.3456})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some_and(|e| e.contains("decimals")));

    for amount in [0.0015, 0.0004] {
        let (status, json) = send(
            &app,
            Method::POST,
            "/api/house/12/energy/recharge",
            Some(json!({ "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().is_some_and(|e| e.contains("decimals")));
    }

    assert_eq!(service.get_balance(12).await?.remaining_energy_wh, 50_000);
    assert_eq!(service.count_recharges(12).await?, 0);

    // Three decimals is the resolution and round-trips exactly
    let (status, json) = send(
        &app,
        Method::POST,
        "/api/house/12/energy/update",
        Some(json!({"remaining_energy": 12.345})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["remaining_energy"], 12.345);
    let (_, json) = send(&app, Method::GET, "/api/house/12/energy", None).await;
    assert_eq!(json["remaining_energy"], 12.345);

    Ok(())
}

#[tokio::test]
async fn test_timed_out_recharge_returns_500_and_rolls_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardHouses::create_basic(&service).await?;
    let app = cenerg::api::app(
        Arc::new(AppState::new(service.clone())),
        Duration::from_millis(200),
    );

    // Hold the store's write lock so the recharge cannot finish
    let mut lock = service.repository().begin().await?;
    sqlx::query("UPDATE houses SET last_update = last_update WHERE house_number = 7")
        .execute(&mut *lock)
        .await?;

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/house/12/energy/recharge",
        Some(json!({"amount": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({"error": INTERNAL_ERROR_MESSAGE}));

    lock.rollback().await?;

    assert_eq!(service.get_balance(12).await?.remaining_energy_wh, 50_000);
    assert_eq!(count_rows(&service, "energy_recharges").await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_store_failure_returns_generic_500() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardHouses::create_basic(&service).await?;
    let app = app(&service);

    sqlx::query(
        r#"
        CREATE TRIGGER fail_recharge_insert
        BEFORE INSERT ON energy_recharges
        BEGIN
            SELECT RAISE(ABORT, 'injected failure');
        END;
        "#,
    )
    .execute(service.repository().pool())
    .await?;

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/house/12/energy/recharge",
        Some(json!({"amount": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    // Store detail stays in the logs
    assert_eq!(json, json!({"error": INTERNAL_ERROR_MESSAGE}));

    assert_eq!(service.get_balance(12).await?.remaining_energy_wh, 50_000);

    Ok(())
}

#[tokio::test]
async fn test_health_lists_endpoints() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let app = app(&service);

    for uri in ["/", "/health"] {
        let (status, json) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "CenErg API is running");
        assert_eq!(json["endpoints"].as_object().map(|e| e.len()), Some(3));
    }

    Ok(())
}

#[tokio::test]
async fn test_cors_allows_any_origin() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardHouses::create_basic(&service).await?;
    let app = app(&service);

    let req = Request::builder()
        .uri("/api/house/12/energy")
        .header(header::ORIGIN, "http://dashboard.example")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    Ok(())
}
