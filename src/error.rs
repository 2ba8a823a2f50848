//! Client error types with stable error code mapping.
//!
//! [`RealtimeError`] is the central error type of the client. Only the
//! explicit round-trip contracts ([`crate::RealtimeClient::connect`] and
//! [`crate::RealtimeClient::send_and_wait`]) hand it back to callers; every
//! other failure is recovered locally and reported through the `on_error`
//! hook and `tracing`.

/// Client-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category       | Caller advice              |
/// |-----------|----------------|----------------------------|
/// | 1000–1999 | Connection     | reconnect, then retry      |
/// | 2000–2999 | Request        | retry the request          |
/// | 3000–3999 | Data           | fix the payload / peer     |
/// | 4000–4999 | Configuration  | fix the configuration      |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    /// Transport-level open or send failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The channel is not open, so the message could not be sent.
    #[error("not connected")]
    NotConnected,

    /// The client was disconnected while the operation was in flight.
    #[error("disconnected before the operation completed")]
    Disconnected,

    /// No matching response arrived before the deadline.
    #[error("request {id} timed out after {timeout_ms} ms")]
    Timeout {
        /// Correlation id of the expired request.
        id: String,
        /// Deadline that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// An inbound frame could not be decoded into a message.
    #[error("undecodable frame: {0}")]
    Decode(String),

    /// An outbound message could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RealtimeError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Connection(_) => 1001,
            Self::NotConnected => 1002,
            Self::Disconnected => 1003,
            Self::Timeout { .. } => 2001,
            Self::Decode(_) => 3001,
            Self::Serialization(_) => 3002,
            Self::InvalidConfig(_) => 4001,
        }
    }

    /// Returns `true` if this is a request deadline error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the error stems from the channel not being usable.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::NotConnected | Self::Disconnected
        )
    }
}

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<TransportError> for RealtimeError {
    fn from(err: TransportError) -> Self {
        Self::Connection(err.to_string())
    }
}

/// Errors raised synchronously by a [`crate::transport::Transport`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The transport has been closed and accepts no more frames.
    #[error("transport closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_distinguishable_from_connection_errors() {
        let timeout = RealtimeError::Timeout {
            id: "1-abc".to_string(),
            timeout_ms: 50,
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_connection());
        assert!(RealtimeError::NotConnected.is_connection());
        assert!(!RealtimeError::NotConnected.is_timeout());
        assert_ne!(timeout.error_code(), RealtimeError::NotConnected.error_code());
    }

    #[test]
    fn transport_error_maps_to_connection() {
        let err: RealtimeError = TransportError::Closed.into();
        assert_eq!(err, RealtimeError::Connection("transport closed".to_string()));
        assert_eq!(err.error_code(), 1001);
    }

    #[test]
    fn display_includes_deadline() {
        let err = RealtimeError::Timeout {
            id: "x".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "request x timed out after 5000 ms");
    }
}
