//! Integration tests for the simulator control endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` with an
//! in-memory broker behind the controller.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fleetwatch_broker::{MemoryBroker, MemoryPublisher};
use fleetwatch_core::config::CoordinateBounds;
use fleetwatch_simulator::{CoordinateGenerator, PublishController, build_router};
use serde_json::Value;
use tower::ServiceExt;

fn make_app(broker: &MemoryBroker) -> Router {
    let controller = PublishController::new(
        MemoryPublisher::new(broker.clone(), "vehicle/coordinates"),
        CoordinateGenerator::new(CoordinateBounds::default()).unwrap(),
        Duration::from_secs(1),
    );
    build_router(Arc::new(controller))
}

async fn post_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn publish_echoes_the_position() {
    let broker = MemoryBroker::new();
    let app = make_app(&broker);

    let (status, json) = post_json(&app, "/vehicle/publish").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Coordinates published");
    let latitude = json["data"]["latitude"].as_f64().unwrap();
    assert!((34.0..=34.1).contains(&latitude));
    assert!(json["data"]["timestamp"].as_u64().unwrap() > 0);
    assert_eq!(broker.published(), 1);
}

#[tokio::test]
async fn publish_with_broker_down_is_503() {
    let broker = MemoryBroker::new();
    broker.set_reachable(false);
    let app = make_app(&broker);

    let (status, json) = post_json(&app, "/vehicle/publish").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], 503);
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent_and_stop_acknowledges() {
    let broker = MemoryBroker::new();
    let app = make_app(&broker);

    let (status, json) = post_json(&app, "/vehicle/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["started"], true);
    assert_eq!(json["message"], "Continuous publishing started");

    let (_, json) = post_json(&app, "/vehicle/start").await;
    assert_eq!(json["started"], false);

    let (_, json) = post_json(&app, "/vehicle/stop").await;
    assert_eq!(json["stopped"], true);
    assert_eq!(json["message"], "Continuous publishing stopped");

    let (_, json) = post_json(&app, "/vehicle/stop").await;
    assert_eq!(json["stopped"], false);
}

#[tokio::test]
async fn get_is_not_allowed() {
    let app = make_app(&MemoryBroker::new());
    let response = app
        .oneshot(Request::builder().uri("/vehicle/start").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
