//! Request/response correlation over the fire-and-forget channel.
//!
//! [`Correlator::send_and_wait`] stamps an outbound message with a fresh
//! correlation id, registers a one-shot listener for that id *before*
//! sending, and waits for the matching response or the deadline. The
//! pending entry, the router registration and the timer are released
//! together by a drop guard, whichever way the wait ends (response,
//! timeout, failed send, or the caller dropping the future).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::router::{ListenerId, MessageRouter};
use crate::domain::Message;
use crate::error::RealtimeError;

/// Bookkeeping for one in-flight request.
#[derive(Debug, Clone)]
struct PendingRequest {
    created_at: Instant,
}

/// Tracks in-flight `send_and_wait` requests.
#[derive(Debug, Clone, Default)]
pub struct Correlator {
    pending: Arc<Mutex<HashMap<String, PendingRequest>>>,
}

impl Correlator {
    /// Creates an empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `message` through `send` and waits for the response carrying
    /// the same correlation id.
    ///
    /// Any `id` already set on `message` is replaced. `send` must not queue:
    /// it either hands the frame to an open transport or fails.
    ///
    /// # Errors
    ///
    /// - the error returned by `send`, immediately, if the send fails;
    /// - [`RealtimeError::Timeout`] if no response arrives within `timeout`;
    /// - [`RealtimeError::Disconnected`] if the router's listeners are
    ///   cleared (explicit `disconnect()`) while waiting.
    pub async fn send_and_wait<S>(
        &self,
        router: &MessageRouter,
        mut message: Message,
        timeout: Duration,
        send: S,
    ) -> Result<Message, RealtimeError>
    where
        S: FnOnce(&Message) -> Result<(), RealtimeError>,
    {
        let id = next_request_id();
        message.id = Some(id.clone());

        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let listener = router.on_correlation(id.clone(), move |response| {
            let sender = match slot.lock() {
                Ok(mut guard) => guard.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            if let Some(sender) = sender {
                let _ = sender.send(response.clone());
            }
        });
        self.lock().insert(
            id.clone(),
            PendingRequest {
                created_at: Instant::now(),
            },
        );
        let guard = PendingGuard {
            pending: &self.pending,
            router,
            id: &id,
            listener,
        };

        if let Err(e) = send(&message) {
            tracing::debug!(request_id = %id, error = %e, "request not sent");
            return Err(e);
        }

        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(RealtimeError::Disconnected),
            Err(_) => Err(RealtimeError::Timeout {
                id: id.clone(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        let elapsed_ms = self
            .lock()
            .get(&id)
            .map(|req| u64::try_from(req.created_at.elapsed().as_millis()).unwrap_or(u64::MAX));
        drop(guard);

        match &outcome {
            Ok(_) => tracing::debug!(request_id = %id, elapsed_ms, "request answered"),
            Err(e) => tracing::debug!(request_id = %id, error = %e, "request failed"),
        }
        outcome
    }

    /// Number of requests still waiting for a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        lock_pending(&self.pending)
    }
}

/// Removes the pending entry and the correlation listener on drop.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<String, PendingRequest>>,
    router: &'a MessageRouter,
    id: &'a str,
    listener: ListenerId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock_pending(self.pending).remove(self.id);
        self.router.off_correlation(self.id, Some(self.listener));
    }
}

fn lock_pending(
    pending: &Mutex<HashMap<String, PendingRequest>>,
) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
    match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Generates a correlation id: creation millis plus a random v4 suffix.
#[must_use]
pub fn next_request_id() -> String {
    format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}
