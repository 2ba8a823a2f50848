//! Connection manager: transport lifecycle, reconnection and heartbeat.
//!
//! [`RealtimeClient`] owns at most one transport at a time. Each transport
//! gets a driver task that processes its [`TransportEvent`]s in order;
//! events from a transport that has since been replaced are ignored by
//! generation number. Shared state lives behind a mutex that is never held
//! while listeners or hooks run.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::correlator::Correlator;
use super::router::{ListenerId, ListenerResult, MessageRouter, Subscription, guarded};
use crate::config::{ClientConfig, ClientHooks};
use crate::domain::{
    ConnectionState, ConnectionStats, EventKind, Message, StateBus, StateChange,
};
use crate::error::RealtimeError;
use crate::transport::{Connector, Transport, TransportEvent};

/// Who started the transport currently opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// `connect()` / `reconnect()` / auto-connect.
    Manual,
    /// Scheduled by the reconnect policy.
    Automatic,
}

type OpenWaiter = oneshot::Sender<Result<(), RealtimeError>>;

struct ConnState {
    state: ConnectionState,
    attempt: Attempt,
    generation: u64,
    transport: Option<Box<dyn Transport>>,
    driver: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    open_waiters: Vec<OpenWaiter>,
    outbound_queue: VecDeque<Message>,
    message_count: u64,
    last_message_at: Option<DateTime<Utc>>,
    reconnect_count: u32,
}

impl ConnState {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: Attempt::Manual,
            generation: 0,
            transport: None,
            driver: None,
            heartbeat: None,
            reconnect_timer: None,
            open_waiters: Vec::new(),
            outbound_queue: VecDeque::new(),
            message_count: 0,
            last_message_at: None,
            reconnect_count: 0,
        }
    }

    fn stop_timers(&mut self) {
        abort_task(&mut self.reconnect_timer);
        abort_task(&mut self.heartbeat);
    }
}

struct ClientInner {
    config: ClientConfig,
    hooks: ClientHooks,
    connector: Arc<dyn Connector>,
    router: MessageRouter,
    correlator: Correlator,
    state_bus: StateBus,
    conn: Mutex<ConnState>,
}

/// Reconnecting publish/subscribe client.
///
/// Cheap to clone; clones share one connection. The connection is torn
/// down when the last clone is dropped.
///
/// # Send discipline
///
/// [`RealtimeClient::send`] never fails loudly: while the channel is not
/// connected it appends the message to a local outbound queue and returns
/// `false`. The queue is never flushed automatically; use
/// [`RealtimeClient::take_queued`] to resend explicitly. The queue is
/// unbounded unless [`ClientConfig::outbound_queue_limit`] is set.
/// [`RealtimeClient::send_and_wait`] does not queue and fails fast with
/// [`RealtimeError::NotConnected`].
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

impl RealtimeClient {
    /// Creates a client without lifecycle hooks.
    ///
    /// # Errors
    ///
    /// See [`RealtimeClient::with_hooks`].
    pub fn new(config: ClientConfig, connector: impl Connector) -> Result<Self, RealtimeError> {
        Self::with_hooks(config, ClientHooks::default(), connector)
    }

    /// Creates a client. Starts connecting immediately when
    /// `config.auto_connect` is set; the outcome is reported through the
    /// hooks and [`RealtimeClient::subscribe_state`].
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidConfig`] if the configuration fails
    /// validation, or if `auto_connect` is set outside a tokio runtime.
    pub fn with_hooks(
        config: ClientConfig,
        hooks: ClientHooks,
        connector: impl Connector,
    ) -> Result<Self, RealtimeError> {
        config.validate()?;
        if config.auto_connect && tokio::runtime::Handle::try_current().is_err() {
            return Err(RealtimeError::InvalidConfig(
                "auto_connect requires a running tokio runtime".into(),
            ));
        }

        let auto_connect = config.auto_connect;
        let client = Self {
            inner: Arc::new(ClientInner {
                config,
                hooks,
                connector: Arc::new(connector),
                router: MessageRouter::new(),
                correlator: Correlator::new(),
                state_bus: StateBus::default(),
                conn: Mutex::new(ConnState::new()),
            }),
        };
        if auto_connect {
            drop(client.inner.start_connect());
        }
        Ok(client)
    }

    /// Opens the connection and resolves once the transport is open.
    ///
    /// A no-op when already connected. Joins the attempt in flight when
    /// already connecting. Otherwise cancels any pending automatic
    /// reconnect, resets the attempt counter and opens a fresh transport.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Connection`] if the transport reports an
    /// error or closes before opening, and [`RealtimeError::Disconnected`]
    /// if `disconnect()` is called while opening.
    pub async fn connect(&self) -> Result<(), RealtimeError> {
        let opened = self.inner.start_connect();
        opened.await.unwrap_or(Err(RealtimeError::Disconnected))
    }

    /// Closes the connection and stops all timers. Idempotent.
    ///
    /// Also clears every event and correlation listener and resets the
    /// reconnect counter. Message statistics are kept.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// `disconnect()` followed by a `connect()` that is not awaited.
    pub fn reconnect(&self) {
        self.inner.disconnect();
        drop(self.inner.start_connect());
    }

    /// Sends a fire-and-forget message.
    ///
    /// Returns `true` if the frame was handed to the open transport. When
    /// not connected the message is queued locally and `false` is returned;
    /// transport failures are reported to `on_error` and also return
    /// `false`.
    pub fn send(&self, message: Message) -> bool {
        self.inner.send(message)
    }

    /// Sends `message` and waits for the response with the same correlation
    /// id, using the configured request timeout.
    ///
    /// # Errors
    ///
    /// See [`RealtimeClient::send_and_wait_with_timeout`].
    pub async fn send_and_wait(&self, message: Message) -> Result<Message, RealtimeError> {
        self.send_and_wait_with_timeout(message, self.inner.config.request_timeout)
            .await
    }

    /// Sends `message` and waits up to `timeout` for the matching response.
    ///
    /// # Errors
    ///
    /// - [`RealtimeError::NotConnected`] immediately when not connected
    ///   (the message is not queued);
    /// - [`RealtimeError::Connection`] immediately if the transport refuses
    ///   the frame;
    /// - [`RealtimeError::Timeout`] when the deadline passes;
    /// - [`RealtimeError::Disconnected`] if `disconnect()` is called while
    ///   waiting.
    pub async fn send_and_wait_with_timeout(
        &self,
        message: Message,
        timeout: Duration,
    ) -> Result<Message, RealtimeError> {
        let inner = &self.inner;
        inner
            .correlator
            .send_and_wait(&inner.router, message, timeout, |m| inner.try_send(m))
            .await
    }

    /// Registers `listener` for messages of `event_type`.
    ///
    /// The listener receives the message payload, or the full message when
    /// registered under [`super::router::CATCH_ALL`] (`"message"`).
    pub fn on<F>(&self, event_type: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        self.inner.router.on(event_type, listener)
    }

    /// Removes one listener of `event_type`, or all of them when
    /// `listener` is `None`.
    pub fn off(&self, event_type: &str, listener: Option<ListenerId>) {
        let removed = self.inner.router.off(event_type, listener);
        tracing::trace!(event_type, removed, "listeners removed");
    }

    /// Number of listeners registered for `event_type`.
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner.router.listener_count(event_type)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Returns `true` while the transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Snapshot of the connection statistics.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        let conn = self.inner.lock();
        ConnectionStats {
            connected: conn.state.is_connected(),
            message_count: conn.message_count,
            last_message_at: conn.last_message_at,
            reconnect_count: conn.reconnect_count,
        }
    }

    /// Receiver of every future state transition.
    #[must_use]
    pub fn subscribe_state(&self) -> broadcast::Receiver<StateChange> {
        self.inner.state_bus.subscribe()
    }

    /// Number of messages queued while disconnected.
    ///
    /// Grows with every `send` during an outage unless
    /// [`ClientConfig::outbound_queue_limit`] caps it.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.inner.lock().outbound_queue.len()
    }

    /// Removes and returns the messages queued while disconnected, oldest
    /// first.
    pub fn take_queued(&self) -> Vec<Message> {
        self.inner.lock().outbound_queue.drain(..).collect()
    }

    /// Number of `send_and_wait` calls still waiting for a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_requests()
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conn = self.inner.lock();
        f.debug_struct("RealtimeClient")
            .field("url", &self.inner.config.url)
            .field("state", &conn.state)
            .field("generation", &conn.generation)
            .field("queued", &conn.outbound_queue.len())
            .field("connector", &self.inner.connector)
            .finish()
    }
}

impl ClientInner {
    fn lock(&self) -> MutexGuard<'_, ConnState> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn transition(&self, conn: &mut ConnState, to: ConnectionState) {
        let from = conn.state;
        if from == to {
            return;
        }
        conn.state = to;
        tracing::debug!(from = %from, to = %to, "connection state changed");
        self.state_bus.publish(StateChange { from, to });
    }

    fn start_connect(self: &Arc<Self>) -> oneshot::Receiver<Result<(), RealtimeError>> {
        let (tx, rx) = oneshot::channel();
        let mut conn = self.lock();
        match conn.state {
            ConnectionState::Connected => {
                let _ = tx.send(Ok(()));
            }
            ConnectionState::Connecting => {
                conn.attempt = Attempt::Manual;
                conn.reconnect_count = 0;
                conn.open_waiters.push(tx);
            }
            ConnectionState::Disconnected
            | ConnectionState::Reconnecting
            | ConnectionState::Failed => {
                abort_task(&mut conn.reconnect_timer);
                conn.reconnect_count = 0;
                conn.open_waiters.push(tx);
                self.open_transport(&mut conn, Attempt::Manual);
            }
        }
        rx
    }

    fn open_transport(self: &Arc<Self>, conn: &mut ConnState, attempt: Attempt) {
        if let Some(stale) = conn.transport.take() {
            stale.close();
        }
        abort_task(&mut conn.driver);
        abort_task(&mut conn.heartbeat);

        conn.generation += 1;
        conn.attempt = attempt;
        let generation = conn.generation;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tracing::info!(
            url = %self.config.url,
            generation,
            automatic = attempt == Attempt::Automatic,
            "opening transport"
        );
        conn.transport = Some(self.connector.open(&self.config.url, events_tx));
        self.transition(conn, ConnectionState::Connecting);
        conn.driver = Some(tokio::spawn(drive(
            Arc::downgrade(self),
            generation,
            events_rx,
        )));
    }

    fn disconnect(&self) {
        let (transport, waiters, was_active) = {
            let mut conn = self.lock();
            conn.generation += 1;
            conn.stop_timers();
            abort_task(&mut conn.driver);
            conn.reconnect_count = 0;
            let was_active = matches!(
                conn.state,
                ConnectionState::Connected | ConnectionState::Connecting
            );
            self.transition(&mut conn, ConnectionState::Disconnected);
            (
                conn.transport.take(),
                std::mem::take(&mut conn.open_waiters),
                was_active,
            )
        };

        if let Some(transport) = transport {
            transport.close();
        }
        self.router.clear();
        for waiter in waiters {
            let _ = waiter.send(Err(RealtimeError::Disconnected));
        }
        if was_active {
            tracing::info!(url = %self.config.url, "disconnected");
            self.notify_disconnect("client disconnect");
        }
    }

    fn send(&self, message: Message) -> bool {
        let mut conn = self.lock();
        if !conn.state.is_connected() {
            tracing::debug!(
                event_type = %message.kind,
                state = %conn.state,
                "not connected, message queued"
            );
            conn.outbound_queue.push_back(message);
            if let Some(limit) = self.config.outbound_queue_limit {
                while conn.outbound_queue.len() > limit {
                    if let Some(dropped) = conn.outbound_queue.pop_front() {
                        tracing::warn!(
                            event_type = %dropped.kind,
                            limit,
                            "outbound queue full, dropping oldest message"
                        );
                    }
                }
            }
            return false;
        }

        let result = message
            .to_frame()
            .and_then(|frame| match conn.transport.as_ref() {
                Some(transport) => transport.send(frame).map_err(RealtimeError::from),
                None => Err(RealtimeError::NotConnected),
            });
        drop(conn);

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(event_type = %message.kind, error = %e, "send failed");
                self.notify_error(&e);
                false
            }
        }
    }

    fn try_send(&self, message: &Message) -> Result<(), RealtimeError> {
        let frame = message.to_frame()?;
        let conn = self.lock();
        if !conn.state.is_connected() {
            return Err(RealtimeError::NotConnected);
        }
        match conn.transport.as_ref() {
            Some(transport) => Ok(transport.send(frame)?),
            None => Err(RealtimeError::NotConnected),
        }
    }

    fn handle_event(self: &Arc<Self>, generation: u64, event: TransportEvent) {
        if self.lock().generation != generation {
            tracing::trace!(generation, "ignoring event from replaced transport");
            return;
        }
        match event {
            TransportEvent::Open => self.handle_open(generation),
            TransportEvent::Message(frame) => self.handle_frame(&frame),
            TransportEvent::Error(reason) => self.handle_error(generation, reason),
            TransportEvent::Close { code, reason } => self.handle_close(generation, code, &reason),
        }
    }

    fn handle_open(self: &Arc<Self>, generation: u64) {
        let waiters = {
            let mut conn = self.lock();
            if conn.generation != generation {
                return;
            }
            conn.reconnect_count = 0;
            self.transition(&mut conn, ConnectionState::Connected);
            abort_task(&mut conn.heartbeat);
            conn.heartbeat = Some(tokio::spawn(heartbeat(
                Arc::downgrade(self),
                generation,
                self.config.heartbeat_interval,
            )));
            std::mem::take(&mut conn.open_waiters)
        };

        tracing::info!(url = %self.config.url, "connected");
        for waiter in waiters {
            let _ = waiter.send(Ok(()));
        }
        if let Some(hook) = &self.hooks.on_connect {
            let _ = guarded("on_connect hook", || hook());
        }
    }

    fn handle_frame(&self, frame: &str) {
        let message = match Message::from_frame(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                self.notify_error(&e);
                return;
            }
        };

        {
            let mut conn = self.lock();
            conn.message_count += 1;
            conn.last_message_at = Some(Utc::now());
        }

        let invoked = self.router.dispatch(&message);
        tracing::trace!(event_type = %message.kind, invoked, "message routed");
        if let Some(hook) = &self.hooks.on_message {
            let _ = guarded("on_message hook", || hook(&message));
        }
    }

    fn handle_error(&self, generation: u64, reason: String) {
        let error = RealtimeError::Connection(reason);
        let waiters = {
            let mut conn = self.lock();
            if conn.generation == generation && conn.state == ConnectionState::Connecting {
                std::mem::take(&mut conn.open_waiters)
            } else {
                Vec::new()
            }
        };

        tracing::warn!(error = %error, "transport error");
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }
        self.notify_error(&error);
    }

    fn handle_close(self: &Arc<Self>, generation: u64, code: Option<u16>, reason: &str) {
        let mut exhausted = false;
        let waiters = {
            let mut conn = self.lock();
            if conn.generation != generation {
                return;
            }
            conn.transport = None;
            conn.driver = None;
            abort_task(&mut conn.heartbeat);

            let retry = matches!(
                (conn.state, conn.attempt),
                (ConnectionState::Connected, _) | (ConnectionState::Connecting, Attempt::Automatic)
            );
            if retry {
                exhausted = !self.schedule_reconnect(&mut conn);
            } else {
                self.transition(&mut conn, ConnectionState::Disconnected);
            }
            std::mem::take(&mut conn.open_waiters)
        };

        tracing::info!(code = ?code, reason, "transport closed");
        for waiter in waiters {
            let _ = waiter.send(Err(RealtimeError::Connection(format!(
                "closed before open: {reason}"
            ))));
        }
        self.notify_disconnect(reason);
        if exhausted {
            self.notify_error(&RealtimeError::Connection(format!(
                "gave up after {} reconnect attempts",
                self.config.reconnect_attempts
            )));
        }
    }

    /// Schedules the next automatic attempt. Returns `false` and enters
    /// `Failed` once the attempts are used up.
    fn schedule_reconnect(self: &Arc<Self>, conn: &mut ConnState) -> bool {
        if conn.reconnect_count >= self.config.reconnect_attempts {
            tracing::warn!(
                attempts = conn.reconnect_count,
                "reconnect attempts exhausted"
            );
            self.transition(conn, ConnectionState::Failed);
            return false;
        }

        conn.reconnect_count += 1;
        self.transition(conn, ConnectionState::Reconnecting);
        tracing::info!(
            attempt = conn.reconnect_count,
            max_attempts = self.config.reconnect_attempts,
            delay_ms = u64::try_from(self.config.reconnect_interval.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );

        abort_task(&mut conn.reconnect_timer);
        conn.reconnect_timer = Some(tokio::spawn(reconnect_after(
            Arc::downgrade(self),
            conn.generation,
            self.config.reconnect_interval,
        )));
        true
    }

    fn run_scheduled_reconnect(self: &Arc<Self>, generation: u64) {
        let mut conn = self.lock();
        if conn.generation != generation || conn.state != ConnectionState::Reconnecting {
            return;
        }
        conn.reconnect_timer = None;
        self.open_transport(&mut conn, Attempt::Automatic);
    }

    /// Sends one keep-alive frame. Returns `false` once the heartbeat
    /// belongs to a replaced or closed transport.
    fn heartbeat_tick(&self, generation: u64) -> bool {
        {
            let conn = self.lock();
            if conn.generation != generation || !conn.state.is_connected() {
                return false;
            }
        }
        if let Err(e) = self.try_send(&Message::heartbeat()) {
            tracing::debug!(error = %e, "heartbeat not sent");
        }
        true
    }

    /// Reports `error` to the `on_error` hook and routes it to local
    /// `error` listeners. The local event does not count as inbound traffic.
    fn notify_error(&self, error: &RealtimeError) {
        if let Some(hook) = &self.hooks.on_error {
            let _ = guarded("on_error hook", || hook(error));
        }
        let event = Message::new(
            EventKind::ERROR,
            json!({"code": error.error_code(), "message": error.to_string()}),
        );
        self.router.dispatch(&event);
    }

    fn notify_disconnect(&self, reason: &str) {
        if let Some(hook) = &self.hooks.on_disconnect {
            let _ = guarded("on_disconnect hook", || hook(reason));
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        let conn = match self.conn.get_mut() {
            Ok(conn) => conn,
            Err(poisoned) => poisoned.into_inner(),
        };
        conn.stop_timers();
        abort_task(&mut conn.driver);
        if let Some(transport) = conn.transport.take() {
            transport.close();
        }
    }
}

fn abort_task(task: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = task.take() {
        handle.abort();
    }
}

/// Feeds one transport's events to the client until it closes.
async fn drive(
    client: Weak<ClientInner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = client.upgrade() else {
            break;
        };
        let terminal = matches!(event, TransportEvent::Close { .. });
        inner.handle_event(generation, event);
        if terminal {
            break;
        }
    }
}

async fn heartbeat(client: Weak<ClientInner>, generation: u64, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = client.upgrade() else {
            break;
        };
        if !inner.heartbeat_tick(generation) {
            break;
        }
    }
}

async fn reconnect_after(client: Weak<ClientInner>, generation: u64, delay: Duration) {
    tokio::time::sleep(delay).await;
    if let Some(inner) = client.upgrade() {
        inner.run_scheduled_reconnect(generation);
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::transport::MockConnector;
    use tokio_test::assert_ok;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mock_client(connector: &MockConnector) -> RealtimeClient {
        let config = ClientConfig::new("mock://school");
        let Ok(client) = RealtimeClient::new(config, connector.clone()) else {
            panic!("valid config");
        };
        client
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_idempotent() {
        let connector = MockConnector::new();
        let client = mock_client(&connector);

        assert_ok!(client.connect().await);
        assert_ok!(client.connect().await);
        assert_eq!(connector.open_count(), 1);
        assert_eq!(client.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_connects_share_one_transport() {
        let connector = MockConnector::new();
        let client = mock_client(&connector);

        let (a, b) = tokio::join!(client.connect(), client.connect());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_while_disconnected_queues() {
        let connector = MockConnector::new();
        let client = mock_client(&connector);

        assert!(!client.send(Message::new("notification", json!({"n": 1}))));
        assert!(!client.send(Message::new("notification", json!({"n": 2}))));
        assert_eq!(client.queued_len(), 2);

        assert_ok!(client.connect().await);
        assert_eq!(client.queued_len(), 2, "queue is not flushed on connect");

        let queued = client.take_queued();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued.first().map(|m| m.payload.clone()), Some(json!({"n": 1})));
        assert_eq!(client.queued_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_limit_drops_oldest_messages() {
        let config = ClientConfig::new("mock://school").with_outbound_queue_limit(2);
        let Ok(client) = RealtimeClient::new(config, MockConnector::new()) else {
            panic!("valid config");
        };

        for n in 1..=4 {
            assert!(!client.send(Message::new("notification", json!({"n": n}))));
        }
        assert_eq!(client.queued_len(), 2);
        let kept: Vec<Value> = client.take_queued().into_iter().map(|m| m.payload).collect();
        assert_eq!(kept, vec![json!({"n": 3}), json!({"n": 4})]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_manual_connect_stays_disconnected() {
        let connector = MockConnector::new();
        connector.set_reachable(false);
        let client = mock_client(&connector);

        let result = client.connect().await;
        assert!(matches!(result, Err(RealtimeError::Connection(_))));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_errors_reach_error_listeners() {
        let connector = MockConnector::new();
        connector.set_reachable(false);
        let client = mock_client(&connector);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = client.on("error", move |payload| {
            tx.send(payload.clone()).map_err(|e| e.to_string())?;
            Ok(())
        });

        assert!(client.connect().await.is_err());
        let Some(payload) = rx.recv().await else {
            panic!("expected an error event");
        };
        assert_eq!(payload["code"], 1001);
        assert_eq!(client.stats().message_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_rejects_inflight_connect() {
        let connector = MockConnector::new();
        let client = mock_client(&connector);

        let pending = client.inner.start_connect();
        client.disconnect();
        assert_eq!(pending.await.ok(), Some(Err(RealtimeError::Disconnected)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_sends_ping_every_interval() {
        let connector = MockConnector::new();
        let config = ClientConfig::new("mock://school")
            .with_heartbeat_interval(Duration::from_secs(30));
        let Ok(client) = RealtimeClient::new(config, connector) else {
            panic!("valid config");
        };
        let pings = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pings);
        let _sub = client.on("ping", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_ok!(client.connect().await);
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(pings.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(62)).await;
        assert_eq!(pings.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_last_handle_closes_transport() {
        let connector = MockConnector::new();
        let client = mock_client(&connector);
        assert_ok!(client.connect().await);
        assert_eq!(connector.live_connections(), 1);

        drop(client);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(connector.live_connections(), 0);
    }

    #[test]
    fn auto_connect_outside_runtime_is_rejected() {
        let config = ClientConfig::new("mock://school").with_auto_connect(true);
        let result = RealtimeClient::new(config, MockConnector::new());
        assert!(matches!(result, Err(RealtimeError::InvalidConfig(_))));
    }
}
