//! Client configuration and lifecycle hooks.
//!
//! [`ClientConfig`] holds the plain settings and can be loaded from
//! environment variables (or a `.env` file via `dotenvy`), 12-factor style.
//! [`ClientHooks`] carries the optional `on_message` / `on_connect` /
//! `on_disconnect` / `on_error` callbacks.
//!
//! | Variable                          | Default                  |
//! |-----------------------------------|--------------------------|
//! | `REALTIME_URL`                    | `ws://localhost:8080/ws` |
//! | `REALTIME_AUTO_CONNECT`           | `false`                  |
//! | `REALTIME_RECONNECT_ATTEMPTS`     | `5`                      |
//! | `REALTIME_RECONNECT_INTERVAL_MS`  | `3000`                   |
//! | `REALTIME_HEARTBEAT_INTERVAL_MS`  | `30000`                  |
//! | `REALTIME_REQUEST_TIMEOUT_MS`     | `5000`                   |
//! | `REALTIME_OUTBOUND_QUEUE_LIMIT`   | unbounded                |

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::Message;
use crate::error::RealtimeError;

/// Default endpoint.
pub const DEFAULT_URL: &str = "ws://localhost:8080/ws";
/// Default number of automatic reconnect attempts.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
/// Default fixed delay between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);
/// Default keep-alive period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);
/// Default `send_and_wait` deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Settings for a [`crate::RealtimeClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Endpoint handed to the connector.
    pub url: String,
    /// Start connecting as soon as the client is built.
    pub auto_connect: bool,
    /// Automatic reconnect attempts after an unexpected close.
    pub reconnect_attempts: u32,
    /// Fixed delay before each automatic reconnect attempt.
    pub reconnect_interval: Duration,
    /// Keep-alive period while connected.
    pub heartbeat_interval: Duration,
    /// Deadline used by `send_and_wait` when none is given.
    pub request_timeout: Duration,
    /// Maximum number of messages kept while disconnected. When full the
    /// oldest message is dropped. `None` keeps every message.
    pub outbound_queue_limit: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            auto_connect: false,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            outbound_queue_limit: None,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for `url` with default settings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Falls back to the defaults when a variable is missing or unparsable.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidConfig`] if the resulting settings
    /// fail [`ClientConfig::validate`].
    pub fn from_env() -> Result<Self, RealtimeError> {
        dotenvy::dotenv().ok();

        let config = Self {
            url: std::env::var("REALTIME_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()),
            auto_connect: parse_env_bool("REALTIME_AUTO_CONNECT", false),
            reconnect_attempts: parse_env(
                "REALTIME_RECONNECT_ATTEMPTS",
                DEFAULT_RECONNECT_ATTEMPTS,
            ),
            reconnect_interval: parse_env_millis(
                "REALTIME_RECONNECT_INTERVAL_MS",
                DEFAULT_RECONNECT_INTERVAL,
            ),
            heartbeat_interval: parse_env_millis(
                "REALTIME_HEARTBEAT_INTERVAL_MS",
                DEFAULT_HEARTBEAT_INTERVAL,
            ),
            request_timeout: parse_env_millis(
                "REALTIME_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT,
            ),
            outbound_queue_limit: std::env::var("REALTIME_OUTBOUND_QUEUE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks settings that would make timers spin.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidConfig`] for an empty URL or a zero
    /// reconnect, heartbeat or request interval.
    pub fn validate(&self) -> Result<(), RealtimeError> {
        if self.url.trim().is_empty() {
            return Err(RealtimeError::InvalidConfig("url must not be empty".into()));
        }
        if self.reconnect_interval.is_zero() {
            return Err(RealtimeError::InvalidConfig(
                "reconnect interval must be positive".into(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(RealtimeError::InvalidConfig(
                "heartbeat interval must be positive".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(RealtimeError::InvalidConfig(
                "request timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Sets the endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Enables or disables connecting on construction.
    #[must_use]
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Sets the number of automatic reconnect attempts.
    #[must_use]
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Sets the fixed delay between reconnect attempts.
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the keep-alive period.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the default `send_and_wait` deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Caps the outbound queue kept while disconnected.
    #[must_use]
    pub fn with_outbound_queue_limit(mut self, limit: usize) -> Self {
        self.outbound_queue_limit = Some(limit);
        self
    }
}

/// Called with every routed inbound message.
pub type MessageHook = Arc<dyn Fn(&Message) + Send + Sync>;
/// Called when the transport opens.
pub type ConnectHook = Arc<dyn Fn() + Send + Sync>;
/// Called with the close reason when the transport closes.
pub type DisconnectHook = Arc<dyn Fn(&str) + Send + Sync>;
/// Called with connection and decode errors.
pub type ErrorHook = Arc<dyn Fn(&RealtimeError) + Send + Sync>;

/// Optional lifecycle callbacks.
///
/// Hooks run on the connection's driver task. A panicking hook is caught
/// and logged like a panicking listener.
#[derive(Clone, Default)]
pub struct ClientHooks {
    pub(crate) on_message: Option<MessageHook>,
    pub(crate) on_connect: Option<ConnectHook>,
    pub(crate) on_disconnect: Option<DisconnectHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl ClientHooks {
    /// Creates an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `on_message` hook.
    #[must_use]
    pub fn on_message(mut self, hook: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(hook));
        self
    }

    /// Sets the `on_connect` hook.
    #[must_use]
    pub fn on_connect(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(hook));
        self
    }

    /// Sets the `on_disconnect` hook.
    #[must_use]
    pub fn on_disconnect(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(hook));
        self
    }

    /// Sets the `on_error` hook.
    #[must_use]
    pub fn on_error(mut self, hook: impl Fn(&RealtimeError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for ClientHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHooks")
            .field("on_message", &self.on_message.is_some())
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable holding milliseconds.
fn parse_env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

/// Parses an environment variable as a boolean (`true`/`TRUE`/`1` or
/// `false`/`FALSE`/`0`). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}
