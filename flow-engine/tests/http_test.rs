//! reqwest transport against a local mock server

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use flow_engine::prelude::*;

#[tokio::test]
async fn test_reqwest_http_sends_method_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ticker"))
        .and(header("x-api-key", "secret"))
        .and(body_json(json!({ "symbol": "BTCUSDT" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "price": "51000.5" })))
        .mount(&server)
        .await;

    let http = ReqwestHttp::new().unwrap();
    let response = http
        .call(HttpRequest {
            method: "POST".to_string(),
            url: format!("{}/ticker", server.uri()),
            headers: BTreeMap::from([("x-api-key".to_string(), "secret".to_string())]),
            body: Some(r#"{"symbol":"BTCUSDT"}"#.to_string()),
            timeout: Duration::from_secs(5),
        })
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["price"], json!("51000.5"));
}

#[tokio::test]
async fn test_api_node_extracts_and_casts_through_reqwest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "items": [{ "price": "51000.5" }] } })),
        )
        .mount(&server)
        .await;

    let harness = Harness::with_http(Arc::new(ReqwestHttp::new().unwrap()));
    harness
        .add_strategy(
            1,
            vec![
                output(
                    node(
                        1,
                        1,
                        "api",
                        json!({
                            "url": format!("{}/quote", server.uri()),
                            "extractPath": "data.items[0].price",
                            "castToNumber": true
                        }),
                    ),
                    "price",
                ),
                node(
                    2,
                    1,
                    "condition",
                    json!({ "left": "price", "operator": ">=", "right": 51000 }),
                ),
                telegram(3, 1, "Price {{price}}"),
            ],
            vec![edge(1, 1, None, 2), edge(1, 2, Some("true"), 3)],
        )
        .await;

    let result = harness.interpreter.execute(1, TriggerKind::Manual).await.unwrap();

    assert!(result.success);
    assert_eq!(result.variables["price"], json!(51000.5));
    assert_eq!(harness.sender.texts(), vec!["Price 51000.5".to_string()]);
}

#[tokio::test]
async fn test_non_success_status_is_a_soft_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let harness = Harness::with_http(Arc::new(ReqwestHttp::new().unwrap()));
    harness
        .add_strategy(
            1,
            vec![
                output(
                    node(1, 1, "api", json!({ "url": format!("{}/quote", server.uri()) })),
                    "quote",
                ),
                telegram(2, 1, "done"),
            ],
            vec![edge(1, 1, None, 2)],
        )
        .await;

    let result = harness.interpreter.execute(1, TriggerKind::Manual).await.unwrap();

    assert!(result.success);
    let api_log = &result.logs[0];
    assert!(api_log.error.as_ref().unwrap().contains("HTTP 503"));
    assert_eq!(api_log.output.as_ref().unwrap()["status"], json!(503));
    assert_eq!(harness.sender.sent().len(), 1);
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let harness = Harness::with_http(Arc::new(ReqwestHttp::new().unwrap()));
    harness
        .add_strategy(
            1,
            vec![node(
                1,
                1,
                "api",
                json!({ "url": format!("{}/slow", server.uri()), "timeoutSecs": 1 }),
            )],
            vec![],
        )
        .await;

    let result = harness.interpreter.execute(1, TriggerKind::Manual).await.unwrap();

    assert!(result.success);
    assert!(result.logs[0].error.is_some());
}
