// tests/api.rs

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use booking_backend::{
    models::business::{Business, MessagingMode},
    routes,
    test_utils::{sample_business, TestApp},
};

fn router(app: &TestApp) -> Router {
    routes::app(app.state.clone())
}

async fn send(router: Router, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let response = router.oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, body))
}

fn booking_body(business: &Business, time: &str) -> Value {
    json!({
        "businessId": business.id,
        "customerChannelId": "U-maria",
        "customerDisplayName": "Maria Souza",
        "dateTime": {
            "date": (Utc::now() + Duration::days(1)).format("%Y-%m-%d").to_string(),
            "time": time,
        },
        "durationMinutes": 30,
    })
}

fn json_request(method: Method, uri: &str, body: &Value) -> anyhow::Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?)
}

#[tokio::test]
async fn health_check() -> anyhow::Result<()> {
    let app = TestApp::new();
    let response = router(&app)
        .oneshot(Request::builder().uri("/api/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn create_booking_returns_created() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;

    let request = json_request(Method::POST, "/api/bookings", &booking_body(&business, "10:00"))?;
    let (status, body) = send(router(&app), request).await?;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["booking"]["status"], "confirmed");
    assert_eq!(body["messageSent"], true);
    Ok(())
}

#[tokio::test]
async fn unavailable_slot_returns_conflict_with_reason_code() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;

    let mut request = json_request(Method::POST, "/api/bookings", &booking_body(&business, "19:00"))?;
    request
        .headers_mut()
        .insert(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9".parse()?);
    let (status, body) = send(router(&app), request).await?;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "outside_business_hours");
    assert_ne!(body["error"], body["code"]);
    Ok(())
}

#[tokio::test]
async fn malformed_time_is_a_validation_error() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;

    let request = json_request(Method::POST, "/api/bookings", &booking_body(&business, "10h"))?;
    let (status, body) = send(router(&app), request).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["code"].is_string());
    assert!(app.store.bookings().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn status_change_requires_tenant_header() -> anyhow::Result<()> {
    let app = TestApp::new();
    let uri = format!("/api/bookings/{}/status", uuid::Uuid::new_v4());

    let request = json_request(Method::PATCH, &uri, &json!({ "action": "confirm" }))?;
    let (status, body) = send(router(&app), request).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_tenant");
    Ok(())
}

#[tokio::test]
async fn status_change_and_notification_history() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;

    let request = json_request(Method::POST, "/api/bookings", &booking_body(&business, "10:00"))?;
    let (_, created) = send(router(&app), request).await?;
    let booking_id = created["booking"]["id"].as_str().unwrap_or_default().to_string();

    let mut cancel = json_request(
        Method::PATCH,
        &format!("/api/bookings/{}/status", booking_id),
        &json!({ "action": "cancel", "reason": "Imprevisto", "cancelledBy": "customer" }),
    )?;
    cancel.headers_mut().insert("x-tenant-id", business.id.to_string().parse()?);
    let (status, body) = send(router(&app), cancel).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["cancelledBy"], "customer");

    let history = Request::builder()
        .uri(format!("/api/bookings/{}/notifications", booking_id))
        .header("x-tenant-id", business.id.to_string())
        .body(Body::empty())?;
    let (status, body) = send(router(&app), history).await?;
    assert_eq!(status, StatusCode::OK);

    let types: Vec<&str> = body
        .as_array()
        .map(|records| records.iter().filter_map(|r| r["messageType"].as_str()).collect())
        .unwrap_or_default();
    assert!(types.contains(&"confirmation"));
    assert!(types.contains(&"owner_notification"));
    assert!(types.contains(&"cancellation"));
    Ok(())
}

#[tokio::test]
async fn messaging_status_and_template_update() -> anyhow::Result<()> {
    let app = TestApp::new();
    let mut business = sample_business();
    business.messaging_mode = MessagingMode::OwnChannel;
    business.channel_access_token = Some("tenant-token".into());
    business.channel_token_expires_at = Some(Utc::now() + Duration::days(2));
    let business = app.seed_business(business).await;

    let status_request = Request::builder()
        .uri("/api/messaging/status")
        .header("x-tenant-id", business.id.to_string())
        .body(Body::empty())?;
    let (status, body) = send(router(&app), status_request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "expiring_soon");

    let mut too_long = json_request(
        Method::PUT,
        "/api/messaging/templates/reminder",
        &json!({ "header": "x".repeat(101), "body": "ok" }),
    )?;
    too_long.headers_mut().insert("x-tenant-id", business.id.to_string().parse()?);
    let (status, body) = send(router(&app), too_long).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["header"][0], "header_length");

    let mut valid = json_request(
        Method::PUT,
        "/api/messaging/templates/reminder",
        &json!({ "header": "Lembrete", "body": "Até amanhã!" }),
    )?;
    valid.headers_mut().insert("x-tenant-id", business.id.to_string().parse()?);
    let (status, _) = send(router(&app), valid).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}
