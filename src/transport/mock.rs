//! Deterministic in-process transport for running without a live server.
//!
//! A mock transport opens after a fixed delay, then echoes every frame back
//! after a simulated round-trip, wrapped as
//! `{ ...original, payload: { received: true, ...originalPayload } }`.
//! Frames sent before the simulated open are queued and echoed in order
//! once open. Under `tokio::time::pause` the whole exchange is
//! deterministic.
//!
//! The connector doubles as the "server side" for tests and offline
//! dashboards: it can push frames, drop connections, refuse new ones and
//! report what the client sent.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{Connector, EventSender, Transport, TransportEvent};
use crate::error::TransportError;

/// Default delay before a mock transport reports `Open`.
pub const DEFAULT_OPEN_DELAY: Duration = Duration::from_millis(100);

/// Default simulated round-trip before an echo is delivered.
pub const DEFAULT_ECHO_DELAY: Duration = Duration::from_millis(50);

/// Close code reported for a simulated network drop.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when the client closes the transport.
const NORMAL_CLOSURE: u16 = 1000;

/// Out-of-band instructions for a running mock transport.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Control {
    /// Client-initiated close.
    Close,
    /// Simulated network drop.
    Drop,
    /// Server-initiated frame.
    Push(String),
}

#[derive(Debug)]
struct MockShared {
    open_delay: Duration,
    echo_delay: Duration,
    echo: AtomicBool,
    reachable: AtomicBool,
    opens: AtomicUsize,
    live: Mutex<Vec<mpsc::WeakUnboundedSender<Control>>>,
    sent: Mutex<Vec<String>>,
}

/// Connector producing mock transports.
///
/// Clones share settings and bookkeeping, so a test can keep one clone to
/// steer the transports a [`crate::RealtimeClient`] opens through another.
#[derive(Debug, Clone)]
pub struct MockConnector {
    shared: Arc<MockShared>,
}

impl MockConnector {
    /// Creates a connector with the default delays and echo enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::with_delays(DEFAULT_OPEN_DELAY, DEFAULT_ECHO_DELAY)
    }

    /// Creates a connector with custom open and round-trip delays.
    #[must_use]
    pub fn with_delays(open_delay: Duration, echo_delay: Duration) -> Self {
        Self {
            shared: Arc::new(MockShared {
                open_delay,
                echo_delay,
                echo: AtomicBool::new(true),
                reachable: AtomicBool::new(true),
                opens: AtomicUsize::new(0),
                live: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Enables or disables echoing, returning the connector.
    #[must_use]
    pub fn with_echo(self, echo: bool) -> Self {
        self.set_echo(echo);
        self
    }

    /// Enables or disables echoing for all current and future transports.
    pub fn set_echo(&self, echo: bool) {
        self.shared.echo.store(echo, Ordering::Release);
    }

    /// Controls whether future opens succeed. An unreachable endpoint
    /// reports `Error` then `Close` after the open delay.
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, Ordering::Release);
    }

    /// Number of transports opened through this connector.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::Acquire)
    }

    /// Frames delivered to the simulated peer so far, in delivery order.
    #[must_use]
    pub fn sent_frames(&self) -> Vec<String> {
        lock(&self.shared.sent).clone()
    }

    /// Simulates a network drop on every running transport.
    ///
    /// Returns the number of transports that were dropped.
    pub fn drop_connections(&self) -> usize {
        self.broadcast(&Control::Drop)
    }

    /// Delivers `frame` from the simulated peer to every running transport.
    /// Frames pushed before a transport opens arrive right after `Open`.
    ///
    /// Returns the number of transports the frame was pushed to.
    pub fn push_frame(&self, frame: impl Into<String>) -> usize {
        self.broadcast(&Control::Push(frame.into()))
    }

    /// Number of transports that have not closed yet.
    #[must_use]
    pub fn live_connections(&self) -> usize {
        self.prune_live().len()
    }

    fn broadcast(&self, control: &Control) -> usize {
        self.prune_live()
            .iter()
            .filter(|tx| tx.send(control.clone()).is_ok())
            .count()
    }

    fn prune_live(&self) -> Vec<mpsc::UnboundedSender<Control>> {
        let mut live = lock(&self.shared.live);
        live.retain(|weak| weak.strong_count() > 0);
        live.iter()
            .filter_map(mpsc::WeakUnboundedSender::upgrade)
            .filter(|tx| !tx.is_closed())
            .collect()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MockConnector {
    fn open(&self, url: &str, events: EventSender) -> Box<dyn Transport> {
        let opened = self.shared.opens.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(url = %url, opened, "opening mock transport");

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        lock(&self.shared.live).push(control_tx.downgrade());

        tokio::spawn(run_mock(
            Arc::clone(&self.shared),
            frame_rx,
            control_rx,
            events,
        ));

        Box::new(MockTransport {
            frames: frame_tx,
            control: control_tx,
        })
    }
}

/// Handle to a mock transport task. Dropping it closes the transport.
#[derive(Debug)]
struct MockTransport {
    frames: mpsc::UnboundedSender<String>,
    control: mpsc::UnboundedSender<Control>,
}

impl Transport for MockTransport {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        self.frames.send(frame).map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        let _ = self.control.send(Control::Close);
    }
}

async fn run_mock(
    shared: Arc<MockShared>,
    mut frames: mpsc::UnboundedReceiver<String>,
    mut control: mpsc::UnboundedReceiver<Control>,
    events: EventSender,
) {
    // Simulated handshake
    let open_at = Instant::now() + shared.open_delay;
    let mut early_pushes = Vec::new();
    loop {
        tokio::select! {
            biased;
            ctl = control.recv() => match ctl {
                Some(Control::Push(frame)) => early_pushes.push(frame),
                Some(Control::Drop) => return emit_close(&events, ABNORMAL_CLOSURE, "simulated network drop"),
                Some(Control::Close) | None => return emit_close(&events, NORMAL_CLOSURE, "closed before open"),
            },
            () = tokio::time::sleep_until(open_at) => break,
        }
    }

    if !shared.reachable.load(Ordering::Acquire) {
        let _ = events.send(TransportEvent::Error(
            "mock endpoint unreachable".to_string(),
        ));
        return emit_close(&events, ABNORMAL_CLOSURE, "mock endpoint unreachable");
    }

    let _ = events.send(TransportEvent::Open);
    for frame in early_pushes {
        let _ = events.send(TransportEvent::Message(frame));
    }

    // Echoes share one delay, so due times are monotonic and the queue
    // stays FIFO.
    let mut echoes: VecDeque<(Instant, String)> = VecDeque::new();
    loop {
        let next_due = echoes.front().map(|(due, _)| *due);
        tokio::select! {
            biased;
            ctl = control.recv() => match ctl {
                Some(Control::Push(frame)) => {
                    let _ = events.send(TransportEvent::Message(frame));
                }
                Some(Control::Drop) => return emit_close(&events, ABNORMAL_CLOSURE, "simulated network drop"),
                Some(Control::Close) | None => return emit_close(&events, NORMAL_CLOSURE, "closed by client"),
            },
            () = wait_until(next_due) => {
                if let Some((_, echo)) = echoes.pop_front() {
                    let _ = events.send(TransportEvent::Message(echo));
                }
            }
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    return emit_close(&events, NORMAL_CLOSURE, "transport dropped");
                };
                lock(&shared.sent).push(frame.clone());
                if !shared.echo.load(Ordering::Acquire) {
                    continue;
                }
                match echo_frame(&frame) {
                    Some(echo) => echoes.push_back((Instant::now() + shared.echo_delay, echo)),
                    None => tracing::debug!("mock transport ignored non-object frame"),
                }
            }
        }
    }
}

async fn wait_until(due: Option<Instant>) {
    match due {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn emit_close(events: &EventSender, code: u16, reason: &str) {
    let _ = events.send(TransportEvent::Close {
        code: Some(code),
        reason: reason.to_owned(),
    });
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Wraps a frame's payload as `{ received: true, ...originalPayload }`.
///
/// Returns `None` if the frame is not a JSON object.
fn echo_frame(frame: &str) -> Option<String> {
    let mut value: Value = serde_json::from_str(frame).ok()?;
    let fields = value.as_object_mut()?;

    let mut payload = Map::new();
    payload.insert("received".to_string(), Value::Bool(true));
    if let Some(Value::Object(original)) = fields.remove("payload") {
        payload.extend(original);
    }
    fields.insert("payload".to_string(), Value::Object(payload));

    serde_json::to_string(&value).ok()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use serde_json::json;

    fn parse(frame: &str) -> Value {
        serde_json::from_str(frame).unwrap_or_default()
    }

    #[test]
    fn echo_wraps_payload_and_keeps_fields() {
        let frame = json!({"type": "notification", "id": "7", "payload": {"title": "t"}});
        let Some(echo) = echo_frame(&frame.to_string()) else {
            panic!("object frames are echoed");
        };
        let echo = parse(&echo);
        assert_eq!(echo["type"], "notification");
        assert_eq!(echo["id"], "7");
        assert_eq!(echo["payload"], json!({"received": true, "title": "t"}));
    }

    #[test]
    fn original_payload_overrides_received_flag() {
        let frame = json!({"type": "x", "payload": {"received": false}});
        let echo = echo_frame(&frame.to_string()).map(|e| parse(&e));
        assert_eq!(echo.map(|e| e["payload"].clone()), Some(json!({"received": false})));
    }

    #[test]
    fn non_object_payload_becomes_received_only() {
        let frame = json!({"type": "x", "payload": 5});
        let echo = echo_frame(&frame.to_string()).map(|e| parse(&e));
        assert_eq!(echo.map(|e| e["payload"].clone()), Some(json!({"received": true})));
        assert!(echo_frame("[1,2]").is_none());
        assert!(echo_frame("garbage").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn pre_open_sends_are_echoed_in_order() {
        let connector = MockConnector::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = connector.open("mock://school", tx);

        for n in 1..=3 {
            let frame = json!({"type": "notification", "payload": {"n": n}});
            assert_ok!(transport.send(frame.to_string()));
        }

        assert_eq!(rx.recv().await, Some(TransportEvent::Open));
        for n in 1..=3 {
            let Some(TransportEvent::Message(echo)) = rx.recv().await else {
                panic!("expected echo {n}");
            };
            assert_eq!(parse(&echo)["payload"]["n"], n);
        }
        assert_eq!(connector.sent_frames().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn open_reports_after_fixed_delay() {
        let connector = MockConnector::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = Instant::now();
        let _transport = connector.open("mock://school", tx);

        assert_eq!(rx.recv().await, Some(TransportEvent::Open));
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_OPEN_DELAY);
        assert!(elapsed < DEFAULT_OPEN_DELAY + Duration::from_millis(5));
        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_endpoint_errors_then_closes() {
        let connector = MockConnector::new();
        connector.set_reachable(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _transport = connector.open("mock://school", tx);

        assert!(matches!(rx.recv().await, Some(TransportEvent::Error(_))));
        assert!(matches!(
            rx.recv().await,
            Some(TransportEvent::Close {
                code: Some(ABNORMAL_CLOSURE),
                ..
            })
        ));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_connections_closes_abnormally() {
        let connector = MockConnector::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = connector.open("mock://school", tx);
        assert_eq!(rx.recv().await, Some(TransportEvent::Open));
        assert_eq!(connector.live_connections(), 1);

        assert_eq!(connector.drop_connections(), 1);
        assert!(matches!(
            rx.recv().await,
            Some(TransportEvent::Close {
                code: Some(ABNORMAL_CLOSURE),
                ..
            })
        ));
        assert_eq!(rx.recv().await, None);
        assert_err!(transport.send("{}".to_string()));
        assert_eq!(connector.live_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pushes_before_open_arrive_after_open() {
        let connector = MockConnector::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _transport = connector.open("mock://school", tx);

        assert_eq!(connector.push_frame(r#"{"type":"notice_update"}"#), 1);
        assert_eq!(rx.recv().await, Some(TransportEvent::Open));
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::Message(r#"{"type":"notice_update"}"#.to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn push_does_not_delay_pending_echo() {
        let connector = MockConnector::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = connector.open("mock://school", tx);
        assert_eq!(rx.recv().await, Some(TransportEvent::Open));

        let sent_at = Instant::now();
        assert_ok!(transport.send(json!({"type": "a"}).to_string()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        connector.push_frame(r#"{"type":"b"}"#);

        let Some(TransportEvent::Message(first)) = rx.recv().await else {
            panic!("expected pushed frame");
        };
        assert_eq!(parse(&first)["type"], "b");
        let Some(TransportEvent::Message(second)) = rx.recv().await else {
            panic!("expected echo");
        };
        assert_eq!(parse(&second)["type"], "a");
        assert!(sent_at.elapsed() < DEFAULT_ECHO_DELAY + Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_echo_stays_silent_but_records() {
        let connector = MockConnector::new().with_echo(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = connector.open("mock://school", tx);
        assert_eq!(rx.recv().await, Some(TransportEvent::Open));

        assert_ok!(transport.send(json!({"type": "x"}).to_string()));
        let waited = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(waited.is_err(), "no echo expected");
        assert_eq!(connector.sent_frames().len(), 1);

        transport.close();
        assert!(matches!(
            rx.recv().await,
            Some(TransportEvent::Close {
                code: Some(NORMAL_CLOSURE),
                ..
            })
        ));
    }
}
