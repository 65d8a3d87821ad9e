//! Canonical error surfaces observed through the client.

mod common;

use common::{client_with, fast_config, redirect, response};
use tool_client::config::ClientConfig;
use tool_client::{ErrorCode, TraceId};

#[tokio::test]
async fn not_found_carries_code_status_hint_and_tool() {
    let script = vec![response(404, r#"{"detail":"no such widget"}"#)];
    let (client, _mock) = client_with("widget-tool", fast_config(), script);

    let error = client.get("/widgets/9").send().await.unwrap_err();
    assert_eq!(error.tool, "widget-tool");
    assert_eq!(error.code, ErrorCode::NotFound);
    assert_eq!(error.http, Some(404));
    assert_eq!(error.detail.as_deref(), Some("no such widget"));
    assert_eq!(error.hint.as_deref(), Some("verify resource exists"));
}

#[tokio::test]
async fn unauthorized_and_forbidden_map_distinctly() {
    let script = vec![response(401, ""), response(403, "")];
    let (client, _mock) = client_with("auth-tool", fast_config(), script);

    let unauthorized = client.get("/secret").send().await.unwrap_err();
    assert_eq!(unauthorized.code, ErrorCode::Unauthorized);
    assert_eq!(unauthorized.hint.as_deref(), Some("provide valid credentials"));

    let forbidden = client.get("/secret").send().await.unwrap_err();
    assert_eq!(forbidden.code, ErrorCode::Forbidden);
    assert_eq!(forbidden.hint.as_deref(), Some("check tool permissions"));
}

#[tokio::test]
async fn unrecognized_status_maps_to_unexpected_status() {
    let script = vec![response(418, "teapot")];
    let (client, _mock) = client_with("odd-tool", fast_config(), script);

    let error = client.get("/brew").send().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::UnexpectedStatus);
    assert_eq!(error.http, Some(418));
    assert!(error.hint.is_none());
}

#[tokio::test]
async fn trace_id_is_zero_filled_without_an_active_trace() {
    let script = vec![response(500, "boom")];
    let (client, _mock) = client_with("trace-tool", fast_config(), script);

    let error = client.post("/x").send().await.unwrap_err();
    assert_eq!(error.trace_id, TraceId::ZERO);
    assert_eq!(error.trace_id.to_string(), "0".repeat(32));
}

#[tokio::test]
async fn rehinting_builds_a_new_error_with_identical_fields() {
    let script = vec![response(429, "slow down")];
    let mut config = fast_config();
    config.retry.max_retries = 0;
    let (client, _mock) = client_with("limited-tool", config, script);

    let error = client.get("/x").send().await.unwrap_err();
    assert_eq!(error.hint.as_deref(), Some("honor Retry-After header"));

    let rehinted = error.clone().with_hint("back off for a minute");
    assert_eq!(rehinted.hint.as_deref(), Some("back off for a minute"));
    assert_eq!(rehinted.code, error.code);
    assert_eq!(rehinted.http, error.http);
    assert_eq!(rehinted.detail, error.detail);
}

#[tokio::test]
async fn error_serializes_with_string_code_and_trace_id() {
    let script = vec![response(503, r#"{"message":"maintenance"}"#)];
    let mut config = fast_config();
    config.retry.max_retries = 0;
    let (client, _mock) = client_with("json-tool", config, script);

    let error = client.get("/x").send().await.unwrap_err();
    let value = error.to_value();
    assert_eq!(value["code"], "upstream_error");
    assert_eq!(value["http"], 503);
    assert_eq!(value["detail"], "maintenance");
    assert_eq!(value["trace_id"], "0".repeat(32));
}

#[tokio::test]
async fn redirect_to_a_disallowed_host_is_a_terminal_unknown_error() {
    let script = vec![redirect(302, "https://evil.example/exfil")];
    let config = ClientConfig {
        allowed_hosts: vec!["tool.example".into()],
        ..fast_config()
    };
    let (client, mock) = client_with("guarded-tool", config, script);

    let error = client.get("/x").send().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::UnknownError);
    assert!(error.detail.unwrap().contains("evil.example"));
    assert_eq!(mock.calls(), 1);
}
