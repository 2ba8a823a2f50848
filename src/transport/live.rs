//! Live WebSocket transport backed by `tokio-tungstenite`.
//!
//! Each transport runs one background task that connects, then multiplexes
//! outbound frames and inbound socket messages with `tokio::select!`.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsFrame;

use super::{Connector, EventSender, Transport, TransportEvent};
use crate::error::TransportError;

/// Close code sent when the client closes the socket itself.
const NORMAL_CLOSURE: u16 = 1000;

/// Opens real WebSocket connections (`ws://` or `wss://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Creates a new connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn open(&self, url: &str, events: EventSender) -> Box<dyn Transport> {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();
        tokio::spawn(run_socket(url.to_owned(), frame_rx, close_rx, events));
        Box::new(WsTransport {
            frames: frame_tx,
            close: std::sync::Mutex::new(Some(close_tx)),
        })
    }
}

/// Handle to a socket task. Dropping it closes the socket.
#[derive(Debug)]
struct WsTransport {
    frames: mpsc::UnboundedSender<String>,
    close: std::sync::Mutex<Option<oneshot::Sender<()>>>,
}

impl Transport for WsTransport {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        self.frames.send(frame).map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        let sender = match self.close.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = sender {
            let _ = tx.send(());
        }
    }
}

/// Connects to `url` and pumps frames until either side closes.
async fn run_socket(
    url: String,
    mut frames: mpsc::UnboundedReceiver<String>,
    mut close_rx: oneshot::Receiver<()>,
    events: EventSender,
) {
    tracing::debug!(url = %url, "opening websocket");

    let stream = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "websocket connect failed");
                let _ = events.send(TransportEvent::Error(e.to_string()));
                let _ = events.send(TransportEvent::Close {
                    code: None,
                    reason: e.to_string(),
                });
                return;
            }
        },
        _ = &mut close_rx => {
            let _ = events.send(TransportEvent::Close {
                code: None,
                reason: "closed before open".to_string(),
            });
            return;
        }
    };

    let _ = events.send(TransportEvent::Open);
    let (mut ws_tx, mut ws_rx) = stream.split();

    loop {
        tokio::select! {
            // Outbound frame from the client
            frame = frames.recv() => {
                let Some(text) = frame else {
                    let _ = ws_tx.close().await;
                    emit_close(&events, Some(NORMAL_CLOSURE), "transport dropped");
                    break;
                };
                if let Err(e) = ws_tx.send(WsFrame::text(text)).await {
                    tracing::warn!(error = %e, "websocket send failed");
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    emit_close(&events, None, &e.to_string());
                    break;
                }
            }
            // Close requested by the client
            _ = &mut close_rx => {
                let _ = ws_tx.close().await;
                emit_close(&events, Some(NORMAL_CLOSURE), "closed by client");
                break;
            }
            // Inbound frame from the server
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(WsFrame::Text(text))) => {
                        let _ = events.send(TransportEvent::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(WsFrame::Close(frame))) => {
                        let (code, reason) = frame.map_or((None, String::new()), |f| {
                            (Some(u16::from(f.code)), f.reason.as_str().to_owned())
                        });
                        emit_close(&events, code, &reason);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "websocket receive failed");
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        emit_close(&events, None, &e.to_string());
                        break;
                    }
                    None => {
                        emit_close(&events, None, "stream ended");
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!(url = %url, "websocket closed");
}

fn emit_close(events: &EventSender, code: Option<u16>, reason: &str) {
    let _ = events.send(TransportEvent::Close {
        code,
        reason: reason.to_owned(),
    });
}
