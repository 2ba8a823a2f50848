//! # campus-realtime
//!
//! Reconnecting publish/subscribe WebSocket client for the school
//! management dashboards: attendance, grades, fees, assignments, chat,
//! presence and notifications.
//!
//! The client adds request/response correlation on top of the
//! fire-and-forget channel and ships a deterministic mock transport so the
//! dashboards (and the test suite) run without a live server.
//!
//! ## Architecture
//!
//! ```text
//! Collaborators (dashboards, hooks)
//!     │
//!     ├── Typed convenience API (api/)
//!     │
//!     ├── RealtimeClient: lifecycle, reconnect, heartbeat (client/manager)
//!     ├── MessageRouter: by kind and by correlation id (client/router)
//!     ├── Correlator: send_and_wait (client/correlator)
//!     │
//!     └── Transport (transport/): WsConnector | MockConnector
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use campus_realtime::{ClientConfig, RealtimeClient, transport::WsConnector};
//!
//! # async fn run() -> Result<(), campus_realtime::RealtimeError> {
//! let client = RealtimeClient::new(ClientConfig::new("ws://localhost:8080/ws"), WsConnector)?;
//! let _sub = client.on("notification", |payload| {
//!     println!("notification: {payload}");
//!     Ok(())
//! });
//! client.connect().await?;
//! client.send_chat_message("u1", "u2", "hello", Some("room1".into()));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod transport;

pub use client::{CATCH_ALL, ListenerId, ListenerResult, RealtimeClient, Subscription};
pub use config::{ClientConfig, ClientHooks};
pub use domain::{ConnectionState, ConnectionStats, EventKind, Message, StateChange};
pub use error::{RealtimeError, TransportError};
