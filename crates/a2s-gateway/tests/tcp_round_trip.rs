//! End-to-end: real sockets, a fake asynchronous target, and reqwest as the
//! caller.
//!
//! The fake target accepts the forwarded request with 202, then calls back
//! through the gateway a moment later, the way a job runner would.

use a2s_gateway::{GatewayConfig, GatewayService};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;

/// Accepts the job, answers later on the injected callback address
async fn fake_target(State(client): State<reqwest::Client>, Json(job): Json<Value>) -> StatusCode {
    let Some(callback) = job["A2S"]["callbackAddress"].as_str().map(str::to_string) else {
        return StatusCode::BAD_REQUEST;
    };
    let answer = job["a"].as_i64().unwrap_or_default() + 1;

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = client
            .post(callback)
            .json(&json!({ "result": answer }))
            .send()
            .await;
    });

    StatusCode::ACCEPTED
}

async fn spawn_fake_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/job", post(fake_target))
        .with_state(reqwest::Client::new());
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}

async fn spawn_gateway() -> (SocketAddr, GatewayService) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = GatewayConfig::default();
    config.bridge.public_url = format!("http://{addr}");
    let service = GatewayService::new(config).unwrap();

    let app = service.router();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    });
    (addr, service)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bridge_round_trip_over_tcp() {
    let target = spawn_fake_target().await;
    let (gateway, service) = spawn_gateway().await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("http://{gateway}/targets"))
        .json(&json!({
            "requestID": "adder",
            "proxyAddr": format!("http://{target}/job"),
            "echoProxy": true,
            "expire": 5,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["requestId"], "adder");

    let response = client
        .post(format!("http://{gateway}/bridge/adder"))
        .json(&json!({ "a": 41 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "result": 42 }));

    assert!(service.table().is_empty());
    let metrics = service.metrics();
    assert_eq!(metrics.fulfilled_total.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.callbacks_acknowledged.load(Ordering::Relaxed), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_target_still_waits_for_callback() {
    let (gateway, service) = spawn_gateway().await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{gateway}/targets"))
        .json(&json!({
            "requestID": "offline",
            // Nothing listens on the discard port
            "proxyAddr": "http://127.0.0.1:9/job",
            "expire": 5,
        }))
        .send()
        .await
        .unwrap();

    let waiting = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .post(format!("http://{gateway}/bridge/offline"))
                .json(&json!({}))
                .send()
                .await
        })
    };

    // Wait for the bridge to register, then complete it out of band
    let table = service.table();
    let id = loop {
        if let Some(id) = table.list_pending().first().copied() {
            break id;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };

    let ack = client
        .post(format!("http://{gateway}/bridge/callback/{id}"))
        .json(&json!({ "ok": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(ack.status(), reqwest::StatusCode::OK);

    let response = waiting.await.unwrap().unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({ "ok": true }));
}
