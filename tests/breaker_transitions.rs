//! Circuit breaker transitions observed through the client.

mod common;

use common::{breaker_config, client_with, response};
use std::time::Duration;
use tool_client::ErrorCode;

#[tokio::test]
async fn breaker_trips_after_full_failing_window_and_fails_fast() {
    let script = (0..4).map(|_| response(500, "boom")).collect();
    let (client, mock) = client_with("breaker-tool", breaker_config(4, 1000, 1), script);

    for _ in 0..4 {
        let error = client.get("/fail").send().await.unwrap_err();
        assert_eq!(error.code, ErrorCode::UpstreamError);
    }
    assert_eq!(mock.calls(), 4);

    // Fifth call during cooldown is rejected without a network call.
    let error = client.get("/fast-fail").send().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::CircuitOpen);
    assert_eq!(error.hint.as_deref(), Some("breaker cooling down"));
    assert!(error.http.is_none());
    assert_eq!(mock.calls(), 4);
}

#[tokio::test]
async fn half_open_probe_success_closes_breaker_and_clears_window() {
    let mut script: Vec<_> = (0..4).map(|_| response(500, "down")).collect();
    script.push(response(200, r#"{"ok":true}"#));
    script.extend((0..4).map(|_| response(500, "down again")));
    let (client, mock) = client_with("recovering-tool", breaker_config(4, 50, 1), script);

    for _ in 0..4 {
        client.get("/fail").send().await.unwrap_err();
    }
    tokio::time::sleep(Duration::from_millis(60)).await;

    // First admission after cooldown is the half-open probe.
    let recovered = client.get("/recover").send().await.unwrap();
    assert_eq!(recovered.status, 200);
    assert_eq!(mock.calls(), 5);

    // Recovery cleared the window: three failures stay under the threshold
    // because the window must refill completely before a re-trip.
    for _ in 0..3 {
        let error = client.get("/fail").send().await.unwrap_err();
        assert_eq!(error.code, ErrorCode::UpstreamError);
    }
    let error = client.get("/fail").send().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::UpstreamError);
    assert_eq!(mock.calls(), 9);

    let error = client.get("/fail").send().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::CircuitOpen);
    assert_eq!(mock.calls(), 9);
}

#[tokio::test]
async fn half_open_probe_failure_retrips_without_window_refill() {
    let script = (0..5).map(|_| response(503, "still down")).collect();
    let (client, mock) = client_with("flapping-tool", breaker_config(4, 50, 1), script);

    for _ in 0..4 {
        client.get("/fail").send().await.unwrap_err();
    }
    tokio::time::sleep(Duration::from_millis(60)).await;

    // The probe is admitted, fails, and re-arms the cooldown immediately.
    let error = client.get("/probe").send().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::UpstreamError);
    assert_eq!(mock.calls(), 5);

    let error = client.get("/again").send().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::CircuitOpen);
    assert_eq!(mock.calls(), 5);
}

#[tokio::test]
async fn retried_failures_count_toward_the_breaker_window() {
    // One logical GET burns through all retries; each failed attempt lands
    // in the window, so a single call can trip the breaker.
    let mut config = breaker_config(4, 1000, 1);
    config.retry.max_retries = 3;
    let script = (0..4).map(|_| response(500, "boom")).collect();
    let (client, mock) = client_with("retry-breaker", config, script);

    let error = client.get("/fail").send().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::UpstreamError);
    assert_eq!(mock.calls(), 4);

    let error = client.get("/fast-fail").send().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::CircuitOpen);
    assert_eq!(mock.calls(), 4);
}

#[tokio::test]
async fn disabled_breaker_never_rejects() {
    let mut config = breaker_config(2, 1000, 1);
    config.breaker.enabled = false;
    let script = (0..6).map(|_| response(500, "boom")).collect();
    let (client, mock) = client_with("unguarded-tool", config, script);

    for _ in 0..6 {
        let error = client.get("/fail").send().await.unwrap_err();
        assert_eq!(error.code, ErrorCode::UpstreamError);
    }
    assert_eq!(mock.calls(), 6);
}
