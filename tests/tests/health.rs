//! Tests for health check endpoints.
//!
//! Health is process-global, so every test that flips component state lives
//! in a single test function.

use axum::http::StatusCode;
use integration_tests::setup::TestContext;
use telemetry::health;

/// Test /health endpoint returns proper structure
#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    for field in [
        "status",
        "registryConnected",
        "geolocationAvailable",
        "activeClients",
    ] {
        assert!(body.get(field).is_some(), "Response should have '{field}'");
    }

    let status = body["status"].as_str().unwrap_or("");
    assert!(
        matches!(status, "healthy" | "degraded" | "unhealthy"),
        "unexpected status '{status}'"
    );
}

/// Test liveness probe always succeeds
#[tokio::test]
async fn test_liveness_probe() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server.get("/health/live").await.assert_status_ok();
}

/// Readiness follows the registry; geolocation only degrades
#[tokio::test]
async fn test_readiness_tracks_registry_health() {
    let ctx = TestContext::new();
    let server = ctx.server();

    ctx.registry.set_unhealthy(false);
    ctx.state.maintain();
    health().geolocation.set_healthy();

    server.get("/health/ready").await.assert_status_ok();
    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["registryConnected"], true);

    health().geolocation.set_unhealthy("lookup timed out");
    server.get("/health/ready").await.assert_status_ok();
    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["geolocationAvailable"], false);

    ctx.registry.set_unhealthy(true);
    ctx.state.maintain();
    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["registryConnected"], false);

    ctx.registry.set_unhealthy(false);
    ctx.state.maintain();
    health().geolocation.set_healthy();
    server.get("/health/ready").await.assert_status_ok();
}
