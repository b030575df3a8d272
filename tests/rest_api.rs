//! End-to-end tests for the REST surface: health, group listing, and the
//! post-commit change hook.

#![allow(clippy::panic)]

mod common;

use reqwest::StatusCode;
use serde_json::{Value, json};

use product_feed_gateway::config::AuthPolicy;

use common::{config, connect_joined, next_json, spawn_gateway, token};

async fn body_json(response: reqwest::Response) -> Value {
    let Ok(body) = response.json::<Value>().await else {
        panic!("response body was not JSON");
    };
    body
}

fn error_code(body: &Value) -> Option<u64> {
    body.get("error")
        .and_then(|e| e.get("code"))
        .and_then(Value::as_u64)
}

#[tokio::test]
async fn health_reports_live_connections() {
    let gateway = spawn_gateway(config(AuthPolicy::Reject)).await;
    let _client = connect_joined(&gateway, Some(&token(1, 3600))).await;

    let Ok(response) = reqwest::get(gateway.http_url("/health")).await else {
        panic!("health request failed");
    };
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.get("status").and_then(Value::as_str), Some("healthy"));
    assert_eq!(body.get("connections").and_then(Value::as_u64), Some(1));
}

#[tokio::test]
async fn groups_lists_membership() {
    let gateway = spawn_gateway(config(AuthPolicy::Reject)).await;

    let Ok(response) = reqwest::get(gateway.http_url("/api/v1/groups")).await else {
        panic!("groups request failed");
    };
    let empty = body_json(response).await;
    assert_eq!(empty, json!({"data": [], "total_connections": 0}));

    let _a = connect_joined(&gateway, Some(&token(1, 3600))).await;
    let _b = connect_joined(&gateway, Some(&token(2, 3600))).await;

    let Ok(response) = reqwest::get(gateway.http_url("/api/v1/groups")).await else {
        panic!("groups request failed");
    };
    let listed = body_json(response).await;
    assert_eq!(
        listed,
        json!({"data": [{"name": "products", "members": 2}], "total_connections": 2})
    );
}

#[tokio::test]
async fn publish_requires_bearer_token() {
    let gateway = spawn_gateway(config(AuthPolicy::AllowAnonymous)).await;
    let http = reqwest::Client::new();
    let url = gateway.http_url("/api/v1/events");
    let payload = json!({"action": "create", "data": {"id": 1}});

    let Ok(missing) = http.post(&url).json(&payload).send().await else {
        panic!("request failed");
    };
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body_json(missing).await), Some(2001));

    let Ok(expired) = http
        .post(&url)
        .bearer_auth(token(1, -600))
        .json(&payload)
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn publish_rejects_malformed_body() {
    let gateway = spawn_gateway(config(AuthPolicy::Reject)).await;
    let http = reqwest::Client::new();
    let url = gateway.http_url("/api/v1/events");

    let Ok(bad_action) = http
        .post(&url)
        .bearer_auth(token(1, 3600))
        .json(&json!({"action": "upsert", "data": {}}))
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(bad_action.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body_json(bad_action).await), Some(1001));

    let Ok(blank_group) = http
        .post(&url)
        .bearer_auth(token(1, 3600))
        .json(&json!({"action": "create", "data": {}, "group": "  "}))
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(blank_group.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn published_change_reaches_stream() {
    let gateway = spawn_gateway(config(AuthPolicy::Reject)).await;
    let mut client = connect_joined(&gateway, Some(&token(4, 3600))).await;

    let Ok(response) = reqwest::Client::new()
        .post(gateway.http_url("/api/v1/events"))
        .bearer_auth(token(99, 3600))
        .json(&json!({"action": "update", "data": {"id": 12, "stock": 3}}))
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        body_json(response).await,
        json!({"accepted": true, "group": "products", "action": "update"})
    );

    let frame = next_json(&mut client).await;
    assert_eq!(
        frame,
        json!({"action": "update", "data": {"id": 12, "stock": 3}})
    );
}
