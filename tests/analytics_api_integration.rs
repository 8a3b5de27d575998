//! Analytics API integration tests
//!
//! Events are written straight to a temporary usage log and read back
//! through the `/api` routes and the dashboard.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bangs::analytics::{ClientInfo, StatsAggregator, UsageEvent, UsageLogger};
use bangs::api;
use bangs::config::DashboardConfig;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn ts(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

fn event(command: &str, at: &str, addr: &str) -> UsageEvent {
    UsageEvent::at(ts(at), command, command, &ClientInfo::new("test-agent", addr))
}

struct TestApp {
    _dir: tempfile::TempDir,
    router: Router,
}

fn create_test_app(events: Vec<UsageEvent>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let logger = Arc::new(UsageLogger::new(dir.path().join("usage.log")));
    for e in events {
        logger.log_at(e);
    }
    let aggregator = Arc::new(StatsAggregator::new(logger));
    TestApp {
        _dir: dir,
        router: api::create_api_router(aggregator, DashboardConfig::default()),
    }
}

fn sample_events() -> Vec<UsageEvent> {
    vec![
        event("google", "2024-03-01T09:00:00+01:00", "10.0.0.1"),
        event("google", "2024-03-01T09:10:00+01:00", "10.0.0.1"),
        event("github", "2024-03-01T09:12:00+01:00", "10.0.0.2"),
        event("github", "2024-03-02T10:00:00+01:00", "10.0.0.2"),
        event("google", "2024-03-03T11:00:00+01:00", "10.0.0.3"),
    ]
}

async fn get_json(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_day_stats() {
    let app = create_test_app(sample_events());

    let (status, body) = get_json(&app, "/api/stats?date=2024-03-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "2024-03-01");
    assert_eq!(body["total_usage"], 3);
    assert_eq!(body["unique_users"], 2);
    assert_eq!(body["commands"]["google"], 2);
    assert_eq!(body["commands"]["github"], 1);
    assert_eq!(body["top_commands"][0]["command"], "google");
    assert_eq!(body["top_commands"][0]["count"], 2);
    // Second google search came 10 minutes after the first one
    assert_eq!(body["total_time_ms"], 600_000);
}

#[tokio::test]
async fn test_day_without_events() {
    let app = create_test_app(sample_events());

    let (status, body) = get_json(&app, "/api/stats?date=2023-01-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_usage"], 0);
    assert_eq!(body["top_commands"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_range_returns_one_entry_per_day() {
    let app = create_test_app(sample_events());

    let (status, body) = get_json(&app, "/api/stats?start=2024-03-01&end=2024-03-03").await;
    assert_eq!(status, StatusCode::OK);
    let days = body.as_array().unwrap();
    assert_eq!(days.len(), 3);
    assert_eq!(days[0]["date"], "2024-03-01");
    assert_eq!(days[1]["date"], "2024-03-02");
    assert_eq!(days[1]["total_usage"], 1);
    assert_eq!(days[2]["commands"]["google"], 1);
}

#[tokio::test]
async fn test_reversed_range_is_empty() {
    let app = create_test_app(sample_events());

    let (status, body) = get_json(&app, "/api/stats?start=2024-03-03&end=2024-03-01").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_dates_are_bad_requests() {
    let app = create_test_app(sample_events());

    for uri in [
        "/api/stats?date=yesterday",
        "/api/stats?start=2024-13-01&end=2024-03-01",
        "/api/stats?start=2024-03-01&end=03/05/2024",
    ] {
        let (status, body) = get_json(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_range_span_is_capped() {
    let app = create_test_app(sample_events());

    let (status, body) = get_json(&app, "/api/stats?start=0001-01-01&end=9999-12-31").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("range spans"));

    let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let end = start + chrono::Duration::days(api::analytics::MAX_RANGE_DAYS - 1);
    let (status, body) = get_json(&app, &format!("/api/stats?start={start}&end={end}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len() as i64, api::analytics::MAX_RANGE_DAYS);
}

#[tokio::test]
async fn test_overall_stats() {
    let app = create_test_app(sample_events());

    let (status, body) = get_json(&app, "/api/stats/overall").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "all-time");
    assert_eq!(body["total_usage"], 5);
    assert_eq!(body["unique_users"], 3);
    assert_eq!(body["commands"]["google"], 3);
    assert_eq!(body["top_commands"][1]["command"], "github");
}

#[tokio::test]
async fn test_stats_without_log_file() {
    let app = create_test_app(vec![]);

    let (status, body) = get_json(&app, "/api/stats/overall").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_usage"], 0);
}

#[tokio::test]
async fn test_cors_headers_on_api() {
    let app = create_test_app(sample_events());

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/stats/overall")
                .header(header::ORIGIN, "https://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_dashboard_is_served() {
    let app = create_test_app(vec![]);

    for uri in ["/dashboard", "/dashboard/index.html"] {
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/dashboard/missing.js")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dashboard_static_dir_override() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<p>custom dashboard</p>").unwrap();

    let logger = Arc::new(UsageLogger::new(dir.path().join("usage.log")));
    let router = api::create_api_router(
        Arc::new(StatsAggregator::new(logger)),
        DashboardConfig {
            static_dir: Some(dir.path().to_string_lossy().into_owned()),
        },
    );

    let response = router
        .oneshot(Request::builder().uri("/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"<p>custom dashboard</p>");
}
