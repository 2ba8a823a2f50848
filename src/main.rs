//! campus-realtime monitor.
//!
//! Connects to the configured endpoint (or the mock transport when
//! `REALTIME_MOCK=true`), logs every routed message and state transition,
//! and disconnects cleanly on Ctrl-C.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use campus_realtime::api::Severity;
use campus_realtime::transport::{MockConnector, WsConnector};
use campus_realtime::{CATCH_ALL, ClientConfig, ClientHooks, RealtimeClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ClientConfig::from_env().context("loading realtime configuration")?;
    let use_mock = matches!(
        std::env::var("REALTIME_MOCK").ok().as_deref(),
        Some("true") | Some("TRUE") | Some("1")
    );
    tracing::info!(url = %config.url, mock = use_mock, "starting campus-realtime monitor");

    let hooks = ClientHooks::new()
        .on_connect(|| tracing::info!("connected"))
        .on_disconnect(|reason| tracing::warn!(reason, "disconnected"))
        .on_error(|error| tracing::error!(error = %error, code = error.error_code(), "realtime error"));

    let client = if use_mock {
        RealtimeClient::with_hooks(config, hooks, MockConnector::new())?
    } else {
        RealtimeClient::with_hooks(config, hooks, WsConnector::new())?
    };

    // Log every routed message
    let _all = client.on(CATCH_ALL, |message| {
        tracing::info!(%message, "message");
        Ok(())
    });

    // Log state transitions
    let mut transitions = client.subscribe_state();
    tokio::spawn(async move {
        while let Ok(change) = transitions.recv().await {
            tracing::info!(from = %change.from, to = %change.to, "state");
        }
    });

    client.connect().await.context("connecting")?;

    if use_mock {
        client.send_notification(
            "monitor",
            "mock transport online",
            Severity::Info,
            None,
        );
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;

    let stats = client.stats();
    tracing::info!(
        messages = stats.message_count,
        reconnects = stats.reconnect_count,
        "shutting down"
    );
    client.disconnect();

    Ok(())
}
