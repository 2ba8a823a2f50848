//! Broadcast channel for connection state transitions.
//!
//! [`StateBus`] wraps a [`tokio::sync::broadcast`] channel. The connection
//! manager publishes a [`StateChange`] on every transition so diagnostics
//! panels and tests can observe the full sequence instead of polling.

use tokio::sync::broadcast;

use super::StateChange;

/// Default capacity of the transition channel.
pub const DEFAULT_STATE_BUS_CAPACITY: usize = 64;

/// Broadcast bus for [`StateChange`]s.
///
/// When the ring buffer is full the oldest transitions are dropped for
/// lagging receivers.
#[derive(Debug, Clone)]
pub struct StateBus {
    sender: broadcast::Sender<StateChange>,
}

impl StateBus {
    /// Creates a new `StateBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a transition to all subscribers.
    ///
    /// Returns the number of receivers that received it. Without receivers
    /// the transition is silently dropped.
    pub fn publish(&self, change: StateChange) -> usize {
        self.sender.send(change).unwrap_or(0)
    }

    /// Creates a receiver for all future transitions.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_BUS_CAPACITY)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ConnectionState;

    fn change(from: ConnectionState, to: ConnectionState) -> StateChange {
        StateChange { from, to }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = StateBus::default();
        let count = bus.publish(change(
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
        ));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn subscriber_receives_transitions_in_order() {
        let bus = StateBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(change(
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
        ));
        bus.publish(change(ConnectionState::Connecting, ConnectionState::Connected));

        let Ok(first) = rx.recv().await else {
            panic!("expected first transition");
        };
        let Ok(second) = rx.recv().await else {
            panic!("expected second transition");
        };
        assert_eq!(first.to, ConnectionState::Connecting);
        assert_eq!(second.from, ConnectionState::Connecting);
        assert_eq!(second.to, ConnectionState::Connected);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus = StateBus::new(0);
        let _rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);
    }
}
