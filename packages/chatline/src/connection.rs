//! Streaming connection to the conversational backend.
//!
//! One lifecycle task owns the socket and walks
//! `Connecting → Connected → Disconnected → (fixed delay) → Connecting`
//! forever, until the owning [`ConnectionHandle`] is shut down or dropped.
//! Decoded frames and state changes flow to the caller over an mpsc channel.

use std::fmt;
use std::time::Duration;

use chat_protocol::{InboundFrame, OutboundFrame};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    Frame(InboundFrame),
}

/// Anything that can push user text towards the backend.
pub trait TextSender {
    /// Returns false when the text was dropped because nothing is connected.
    fn send_text(&self, text: &str) -> bool;
}

pub struct ConnectionManager {
    url: Url,
    reconnect_delay: Duration,
    event_capacity: usize,
}

impl ConnectionManager {
    /// `url` must already carry the session id; see `ServerConfig::ws_url`.
    pub fn new(url: Url, config: &ConnectionConfig) -> Self {
        Self {
            url,
            reconnect_delay: config.reconnect_delay,
            event_capacity: config.event_capacity,
        }
    }

    /// Spawn the lifecycle task. Must be called inside a tokio runtime.
    pub fn start(self) -> (ConnectionHandle, mpsc::Receiver<ConnectionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(self.event_capacity);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_lifecycle(
            self.url,
            self.reconnect_delay,
            outbound_rx,
            event_tx,
            state_tx,
            cancel.clone(),
        ));

        let handle = ConnectionHandle {
            outbound: outbound_tx,
            state: state_rx,
            cancel,
            task: Some(task),
        };
        (handle, event_rx)
    }
}

/// Owned reference to a running connection. Dropping it stops the task.
pub struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<String>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    #[allow(dead_code)]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Close the socket, cancel any pending reconnect timer, and wait for
    /// the lifecycle task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("connection task ended abnormally: {}", e);
            }
        }
    }
}

impl TextSender for ConnectionHandle {
    fn send_text(&self, text: &str) -> bool {
        if !self.state().is_connected() {
            debug!("not connected, dropping outbound text");
            return false;
        }
        let json = match OutboundFrame::new(text).to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to encode outbound frame: {}", e);
                return false;
            }
        };
        self.outbound.send(json).is_ok()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PumpEnd {
    Closed,
    Cancelled,
}

async fn run_lifecycle(
    url: Url,
    reconnect_delay: Duration,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::Sender<ConnectionEvent>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
) {
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        if !set_state(&state_tx, &events, &cancel, ConnectionState::Connecting).await {
            break;
        }
        debug!(url = %url, attempt, "connecting");

        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((ws, _)) => {
                // Text queued during the previous connection's teardown is lost.
                let mut stale = 0usize;
                while outbound.try_recv().is_ok() {
                    stale += 1;
                }
                if stale > 0 {
                    debug!(stale, "discarded outbound text from previous connection");
                }

                if !set_state(&state_tx, &events, &cancel, ConnectionState::Connected).await {
                    break;
                }
                info!(url = %url, attempt, "connected");

                if pump(ws, &mut outbound, &events, &cancel).await == PumpEnd::Cancelled {
                    break;
                }
                info!(attempt, "connection lost");
            }
            Err(e) => {
                warn!(url = %url, attempt, "connection attempt failed: {}", e);
            }
        }

        if !set_state(&state_tx, &events, &cancel, ConnectionState::Disconnected).await {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }

    state_tx.send_replace(ConnectionState::Disconnected);
    debug!("connection task stopped");
}

/// Shuttle frames both ways until the socket ends or the token fires.
async fn pump(
    ws: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    events: &mpsc::Sender<ConnectionEvent>,
    cancel: &CancellationToken,
) -> PumpEnd {
    let (mut ws_write, mut ws_read) = ws.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_write.send(Message::Close(None)).await;
                return PumpEnd::Cancelled;
            }

            Some(json) = outbound.recv() => {
                if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                    warn!("send failed: {}", e);
                    return PumpEnd::Closed;
                }
            }

            msg = ws_read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !forward_frame(text.as_str(), events, cancel).await {
                            return PumpEnd::Cancelled;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "server closed the socket");
                        return PumpEnd::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("read failed: {}", e);
                        return PumpEnd::Closed;
                    }
                    None => return PumpEnd::Closed,
                }
            }
        }
    }
}

/// Decode one text frame and pass it on. Undecodable frames are dropped.
async fn forward_frame(
    text: &str,
    events: &mpsc::Sender<ConnectionEvent>,
    cancel: &CancellationToken,
) -> bool {
    match InboundFrame::decode(text) {
        Ok(frame) => emit(events, cancel, ConnectionEvent::Frame(frame)).await,
        Err(e) => {
            debug!("dropping inbound frame: {}", e);
            true
        }
    }
}

async fn set_state(
    state_tx: &watch::Sender<ConnectionState>,
    events: &mpsc::Sender<ConnectionEvent>,
    cancel: &CancellationToken,
    state: ConnectionState,
) -> bool {
    state_tx.send_replace(state);
    emit(events, cancel, ConnectionEvent::StateChanged(state)).await
}

/// False once the receiver is gone or the task was cancelled.
async fn emit(
    events: &mpsc::Sender<ConnectionEvent>,
    cancel: &CancellationToken,
    event: ConnectionEvent,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}
