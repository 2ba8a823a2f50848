//! Shared helpers for the integration tests.

#![allow(dead_code, clippy::panic)]

use std::time::Duration;

use campus_realtime::transport::Connector;
use campus_realtime::{ClientConfig, ConnectionState, RealtimeClient, StateChange, Subscription};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

/// Builds a client, panicking on invalid configuration.
pub fn client(config: ClientConfig, connector: impl Connector) -> RealtimeClient {
    let Ok(client) = RealtimeClient::new(config, connector) else {
        panic!("test configuration must be valid");
    };
    client
}

/// Forwards every payload of `event_type` into a channel.
pub fn capture(
    client: &RealtimeClient,
    event_type: &str,
) -> (Subscription, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sub = client.on(event_type, move |payload| {
        tx.send(payload.clone()).map_err(|e| e.to_string())?;
        Ok(())
    });
    (sub, rx)
}

/// Receives the next value or panics after `within`.
pub async fn next_within<T>(rx: &mut mpsc::UnboundedReceiver<T>, within: Duration) -> T {
    match tokio::time::timeout(within, rx.recv()).await {
        Ok(Some(value)) => value,
        Ok(None) => panic!("channel closed"),
        Err(_) => panic!("nothing received within {within:?}"),
    }
}

/// Collects transitions until the client reaches `target`.
pub async fn transitions_until(
    rx: &mut broadcast::Receiver<StateChange>,
    target: ConnectionState,
    within: Duration,
) -> Vec<StateChange> {
    let mut seen = Vec::new();
    let collect = async {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    seen.push(change);
                    if change.to == target {
                        break;
                    }
                }
                Err(e) => panic!("state bus failed: {e}"),
            }
        }
    };
    if tokio::time::timeout(within, collect).await.is_err() {
        panic!("state {target} not reached within {within:?}; saw {seen:?}");
    }
    seen
}

/// Asserts `actual` contains every key/value of `expected`.
pub fn assert_superset(actual: &Value, expected: &Value) {
    let (Some(actual_map), Some(expected_map)) = (actual.as_object(), expected.as_object()) else {
        panic!("both values must be objects: {actual} / {expected}");
    };
    for (key, value) in expected_map {
        assert_eq!(actual_map.get(key), Some(value), "mismatch on key {key}");
    }
}
