//! The client over a real WebSocket, against a local echo server that
//! mirrors the mock transport's `{ received: true, ... }` wrapping.

#![allow(clippy::panic)]

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use campus_realtime::transport::WsConnector;
use campus_realtime::{ClientConfig, ConnectionState, Message};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsFrame;

use common::{assert_superset, capture, client, next_within};

const WAIT: Duration = Duration::from_secs(5);

/// Starts an echo server on an ephemeral port.
async fn echo_server() -> SocketAddr {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind echo server");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("echo server address");
    };
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(frame)) = socket.next().await {
                    let WsFrame::Text(text) = frame else {
                        continue;
                    };
                    let Ok(mut value) = serde_json::from_str::<Value>(text.as_str()) else {
                        continue;
                    };
                    let mut payload = json!({"received": true});
                    if let (Some(wrapped), Some(original)) = (
                        payload.as_object_mut(),
                        value.get("payload").and_then(Value::as_object),
                    ) {
                        wrapped.extend(original.clone());
                    }
                    value["payload"] = payload;
                    if socket.send(WsFrame::text(value.to_string())).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

#[tokio::test]
async fn chat_round_trip_over_websocket() {
    let addr = echo_server().await;
    let client = client(ClientConfig::new(format!("ws://{addr}/ws")), WsConnector::new());
    let (_sub, mut chats) = capture(&client, "chat_message");

    let connected = tokio::time::timeout(WAIT, client.connect()).await;
    assert!(matches!(connected, Ok(Ok(()))), "connect failed: {connected:?}");
    assert_eq!(client.state(), ConnectionState::Connected);

    assert!(client.send_chat_message("u1", "u2", "hello", Some("room1".into())));
    let payload = next_within(&mut chats, WAIT).await;
    assert_superset(
        &payload,
        &json!({"received": true, "senderId": "u1", "content": "hello", "roomId": "room1"}),
    );

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn send_and_wait_over_websocket() {
    let addr = echo_server().await;
    let client = client(ClientConfig::new(format!("ws://{addr}/ws")), WsConnector::new());
    let connected = tokio::time::timeout(WAIT, client.connect()).await;
    assert!(matches!(connected, Ok(Ok(()))));

    let response = client
        .send_and_wait_with_timeout(
            Message::new("grade_update", json!({"studentId": "s1", "grade": "B+"})),
            WAIT,
        )
        .await;
    let response = match response {
        Ok(response) => response,
        Err(e) => panic!("echo should answer: {e}"),
    };
    assert!(response.id.is_some());
    assert_eq!(response.payload["grade"], "B+");
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn unreachable_server_fails_connect() {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind placeholder listener");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("placeholder listener address");
    };
    drop(listener);

    let client = client(ClientConfig::new(format!("ws://{addr}/ws")), WsConnector::new());
    let result = tokio::time::timeout(WAIT, client.connect()).await;
    let err = match result {
        Ok(Err(err)) => err,
        other => panic!("connect should fail: {other:?}"),
    };
    assert!(err.is_connection());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
