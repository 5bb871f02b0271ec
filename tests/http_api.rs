use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use weather_ingest::app::ports::{LogStore, PayloadStore};
use weather_ingest::domain::{IngestStatus, LogRecord};
use weather_ingest::infra::{InMemoryLogStore, InMemoryPayloadStore};
use weather_ingest::server::{create_server, AppState};

const ROW_KEY: &str = "3f2b8c1e-4d5a-4e6f-9a7b-8c9d0e1f2a3b";

fn router(logs: Arc<InMemoryLogStore>, payloads: Arc<InMemoryPayloadStore>) -> Router {
    create_server(AppState::new(logs, payloads, "London"))
}

async fn seeded() -> (Arc<InMemoryLogStore>, Arc<InMemoryPayloadStore>) {
    let logs = Arc::new(InMemoryLogStore::new());
    let payloads = Arc::new(InMemoryPayloadStore::default());
    let locator = payloads
        .save(ROW_KEY, br#"{"temp":280}"#, "application/json; charset=utf-8")
        .await
        .unwrap();
    logs.append(&LogRecord {
        partition_key: "London".into(),
        row_key: ROW_KEY.into(),
        timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        status: IngestStatus::Success,
        status_code: Some(200),
        payload_locator: Some(locator.to_string()),
    })
    .await
    .unwrap();
    (logs, payloads)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    (status, content_type, body.to_vec())
}

fn error_message(body: &[u8]) -> String {
    let json: Value = serde_json::from_slice(body).unwrap();
    json["error"]["message"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let (logs, payloads) = seeded().await;
    let (status, _, body) = get(router(logs, payloads), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_logs_returns_entries_in_range() {
    let (logs, payloads) = seeded().await;
    let (status, _, body) = get(
        router(logs, payloads),
        "/logs?from=2025-03-01&to=2025-03-02",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["city"], "London");
    assert_eq!(json["count"], 1);
    assert!(json["fromDate"].is_string());
    assert!(json["toDate"].is_string());
    let entry = &json["logs"][0];
    assert_eq!(entry["rowKey"], ROW_KEY);
    assert_eq!(entry["status"], "Success");
    assert_eq!(entry["statusCode"], 200);
    assert_eq!(entry["payloadLocator"], format!("weather-data/{ROW_KEY}.json"));
    assert!(entry.get("etag").is_none());
}

#[tokio::test]
async fn test_logs_accepts_offset_decoded_as_space() {
    let (logs, payloads) = seeded().await;
    let (status, _, body) = get(
        router(logs, payloads),
        "/logs?from=2025-03-01T11:00:00+00:00&to=2025-03-01T13:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["count"], 1);
}

#[tokio::test]
async fn test_logs_missing_bound_is_bad_request() {
    let logs = Arc::new(InMemoryLogStore::new());
    let app = router(logs.clone(), Arc::new(InMemoryPayloadStore::default()));
    let (status, _, body) = get(app, "/logs?from=2025-03-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "Both 'from' and 'to' date parameters are required (YYYY-MM-DD)."
    );
    assert_eq!(logs.calls(), 0);
}

#[tokio::test]
async fn test_logs_unparseable_date_is_bad_request() {
    let logs = Arc::new(InMemoryLogStore::new());
    let app = router(logs.clone(), Arc::new(InMemoryPayloadStore::default()));
    let (status, _, body) = get(app, "/logs?from=yesterday&to=2025-03-02").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "Invalid date format. Use ISO 8601 format (e.g., 2025-03-01)."
    );
    assert_eq!(logs.calls(), 0);
}

#[tokio::test]
async fn test_logs_inverted_range_never_reaches_store() {
    let logs = Arc::new(InMemoryLogStore::new());
    let app = router(logs.clone(), Arc::new(InMemoryPayloadStore::default()));
    let (status, _, body) = get(app, "/logs?from=2025-03-05&to=2025-03-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "'from' date cannot be after 'to' date.");
    assert_eq!(logs.calls(), 0);
}

#[tokio::test]
async fn test_logs_missing_collection_is_not_found() {
    let app = router(
        Arc::new(InMemoryLogStore::missing_collection()),
        Arc::new(InMemoryPayloadStore::default()),
    );
    let (status, _, body) = get(app, "/logs?from=2025-03-01&to=2025-03-02").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_message(&body), "Weather logs table not found.");
}

#[tokio::test]
async fn test_logs_store_outage_is_generic_500() {
    let app = router(
        Arc::new(InMemoryLogStore::unavailable()),
        Arc::new(InMemoryPayloadStore::default()),
    );
    let (status, _, body) = get(app, "/logs?from=2025-03-01&to=2025-03-02").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_message(&body),
        "An error occurred while processing your request."
    );
}

#[tokio::test]
async fn test_payload_returns_raw_bytes_with_content_type() {
    let (logs, payloads) = seeded().await;
    let app = router(logs, payloads);

    let (status, content_type, body) = get(app.clone(), &format!("/payload/{ROW_KEY}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json; charset=utf-8"));
    assert_eq!(body, br#"{"temp":280}"#.to_vec());

    let (_, _, again) = get(app, &format!("/payload/{}", ROW_KEY.to_uppercase())).await;
    assert_eq!(again, body);
}

#[tokio::test]
async fn test_payload_without_id_is_bad_request() {
    let (logs, payloads) = seeded().await;
    let (status, _, body) = get(router(logs, payloads), "/payload").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "Please provide a RowKey in the URL path (/payload/{RowKey})"
    );
}

#[tokio::test]
async fn test_payload_invalid_guid_never_reaches_store() {
    let logs = Arc::new(InMemoryLogStore::new());
    let payloads = Arc::new(InMemoryPayloadStore::default());
    let (status, _, body) = get(router(logs.clone(), payloads.clone()), "/payload/not-a-guid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "RowKey must be a valid GUID format");
    assert_eq!(logs.calls(), 0);
    assert_eq!(payloads.calls(), 0);
}

#[tokio::test]
async fn test_payload_unknown_row_is_not_found() {
    let (logs, payloads) = seeded().await;
    let missing = "00000000-0000-4000-8000-000000000000";
    let (status, _, body) = get(router(logs, payloads), &format!("/payload/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        error_message(&body),
        format!("No weather log found with RowKey: {missing}")
    );
}

#[tokio::test]
async fn test_payload_with_missing_blob_is_not_found() {
    let (logs, payloads) = seeded().await;
    let locator = weather_ingest::domain::Locator::parse(&format!("weather-data/{ROW_KEY}.json")).unwrap();
    payloads.remove(&locator);

    let (status, _, body) = get(router(logs, payloads), &format!("/payload/{ROW_KEY}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        error_message(&body),
        format!("Blob not found at path: weather-data/{ROW_KEY}.json")
    );
}
