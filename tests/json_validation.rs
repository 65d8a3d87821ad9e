//! JSON body handling and strict model validation.

mod common;

use common::{client_with, fast_config, response};
use serde::Deserialize;
use serde_json::json;
use tool_client::ErrorCode;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct Widget {
    name: String,
    count: u32,
}

#[tokio::test]
async fn send_json_decodes_the_body() {
    let script = vec![response(200, r#"{"name":"bolt","count":3}"#)];
    let (client, _mock) = client_with("widget-tool", fast_config(), script);

    let value = client.get("/widget").send_json().await.unwrap().unwrap();
    assert_eq!(value, json!({"name": "bolt", "count": 3}));
}

#[tokio::test]
async fn send_json_returns_none_for_an_empty_body() {
    let script = vec![response(204, "")];
    let (client, _mock) = client_with("widget-tool", fast_config(), script);

    let value = client.get("/widget").send_json().await.unwrap();
    assert!(value.is_none());
}

#[tokio::test]
async fn invalid_json_maps_to_schema_validation_error() {
    let script = vec![response(200, "not json {")];
    let (client, _mock) = client_with("widget-tool", fast_config(), script);

    let error = client.get("/widget").send_json().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::SchemaValidationError);
    assert_eq!(
        error.detail.as_deref(),
        Some("response payload was not valid JSON")
    );
}

#[tokio::test]
async fn oversized_body_is_rejected_before_decoding() {
    let script = vec![response(200, r#"{"name":"bolt","count":3}"#)];
    let mut config = fast_config();
    config.validation_limit_bytes = 8;
    let (client, _mock) = client_with("widget-tool", config, script);

    let error = client.get("/widget").send_json().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::SchemaValidationError);
    // Size breach is distinguishable from a parse failure.
    assert_eq!(
        error.detail.as_deref(),
        Some("response body exceeds validation limit")
    );
}

#[tokio::test]
async fn send_typed_decodes_a_conforming_body() {
    let script = vec![response(200, r#"{"name":"bolt","count":3}"#)];
    let (client, _mock) = client_with("widget-tool", fast_config(), script);

    let widget: Widget = client.get("/widget").send_typed().await.unwrap();
    assert_eq!(
        widget,
        Widget {
            name: "bolt".into(),
            count: 3
        }
    );
}

#[tokio::test]
async fn unexpected_extra_field_names_the_offender() {
    let script = vec![response(200, r#"{"name":"bolt","count":3,"bogus":1}"#)];
    let (client, _mock) = client_with("widget-tool", fast_config(), script);

    let error = client.get("/widget").send_typed::<Widget>().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::SchemaValidationError);
    assert!(error.detail.unwrap().contains("bogus"));
}

#[tokio::test]
async fn wrong_field_type_fails_strict_validation() {
    let script = vec![response(200, r#"{"name":"bolt","count":"three"}"#)];
    let (client, _mock) = client_with("widget-tool", fast_config(), script);

    let error = client.get("/widget").send_typed::<Widget>().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::SchemaValidationError);
    assert!(error.detail.unwrap().contains("invalid type"));
}

#[tokio::test]
async fn send_typed_rejects_an_empty_body() {
    let script = vec![response(200, "")];
    let (client, _mock) = client_with("widget-tool", fast_config(), script);

    let error = client.get("/widget").send_typed::<Widget>().await.unwrap_err();
    assert_eq!(error.code, ErrorCode::SchemaValidationError);
    assert_eq!(error.detail.as_deref(), Some("response body was empty"));
}
