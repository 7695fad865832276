//! HTTP surface tests, driven through the router without a socket.

#![cfg(feature = "http")]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use toprank::http::router;
use toprank::sources::{GovernorLimiter, MemoryContributionStore};
use toprank::RankingService;

fn service() -> RankingService {
    RankingService::builder()
        .contributions(MemoryContributionStore::new(vec![
            json!({"project": {"id": 1}, "created": "2020-01-02T00:00:00", "net_votes": 2}),
            json!({"project": {"id": 1}, "created": "2020-01-03T00:00:00", "net_votes": 5}),
            json!({"project": {"id": 2}, "created": "2020-01-04T00:00:00", "net_votes": 1}),
        ]))
        .limiter(GovernorLimiter::new(1, 1))
        .build()
}

async fn get(service: &RankingService, uri: &str) -> (StatusCode, Value) {
    let response = router(service.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn settle(service: &RankingService, uri: &str) -> (StatusCode, Value) {
    for _ in 0..100 {
        let (status, body) = get(service, uri).await;
        if body["status"] != json!(1) {
            return (status, body);
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("task for {uri} never finished");
}

#[tokio::test]
async fn admission_then_poll() {
    let service = service();
    let uri = "/api/rankings?start_date=2020-01-01&end_date=2020-01-08";

    let (status, body) = get(&service, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!(1));
    assert_eq!(body["statusMessage"], json!("Task is being processed"));

    let (status, body) = settle(&service, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": 0,
            "statusMessage": "Task completed",
            "results": [
                {"project": {"id": 1}, "count": 2},
                {"project": {"id": 2}, "count": 1},
            ],
        })
    );
}

#[tokio::test]
async fn invalid_limit_is_bad_request() {
    let (status, body) = get(&service(), "/api/rankings?limit=150").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "limit is invalid or too high"}));
}

#[tokio::test]
async fn unknown_sort_is_bad_request() {
    let (status, body) = get(&service(), "/api/rankings?sort_by=stars").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "invalid sort_by: 'stars'"}));
}

#[tokio::test]
async fn second_expensive_miss_is_throttled() {
    let service = service();
    let base = "/api/rankings?start_date=2020-01-01&end_date=2020-01-08&include_rewards=true";

    let (status, _) = get(&service, base).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&service, &format!("{base}&limit=2")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({"error": "too many requests"}));
}

#[tokio::test]
async fn health_reports_live_tasks() {
    let service = service();
    let (_, body) = get(&service, "/health").await;
    assert_eq!(body, json!({"status": "ok", "tasks": 0}));

    get(&service, "/api/rankings?start_date=2020-01-01&end_date=2020-01-08").await;
    let (status, body) = get(&service, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "tasks": 1}));
}
