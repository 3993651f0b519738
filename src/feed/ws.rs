//! Streaming client for the live quake push feed.
//!
//! Maintains a persistent WebSocket connection and delivers decoded
//! earthquake records (code 551) to an unbounded channel, while reporting
//! connectivity transitions to a [`ConnectionStatus`] notifier.
//!
//! State machine:
//! - Disconnected -> Connecting on start and on every retry
//! - Connecting -> Connected on handshake (status flips true)
//! - Connected -> Disconnected on close or transport error (status flips
//!   false); transport errors are not retried directly, they surface as the
//!   close that drives the retry schedule
//! - Disconnected -> Connecting after a flat delay (default 5s, no backoff,
//!   no jitter, no retry cap; the upstream feed is public and this is a
//!   deliberate simplicity trade-off carried over as-is)
//! - Any -> Stopped, only via [`WsStopHandle::stop`]
//!
//! Parse failures skip the offending frame without closing the connection.
//! The feed is receive-only; the client never sends application messages.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::feed::status::ConnectionStatus;
use crate::models::{QuakeEvent, CODE_EARTHQUAKE};

/// Counters for observability; every value is monotonic.
#[derive(Debug, Default)]
pub struct WsMetrics {
    pub connect_attempts: AtomicU64,
    pub connects: AtomicU64,
    pub disconnects: AtomicU64,
    pub messages_received: AtomicU64,
    pub events_forwarded: AtomicU64,
    pub frames_filtered: AtomicU64,
    pub parse_failures: AtomicU64,
    pub reconnects_scheduled: AtomicU64,
}

/// Idempotent cancellation handle. Cheap to clone; the first `stop` (and
/// every one after it) moves the client to its terminal state: the pending
/// reconnect timer is cancelled, the live connection is closed, and no
/// further event or status delivery occurs.
#[derive(Clone)]
pub struct WsStopHandle {
    stop_tx: watch::Sender<bool>,
}

impl WsStopHandle {
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

/// Outcome of one connection attempt's stream phase.
enum StreamEnd {
    /// Transport closed or errored; schedule a retry.
    Closed,
    /// Terminal cancellation observed.
    Stopped,
}

pub struct QuakeWsClient {
    config: FeedConfig,
    event_tx: mpsc::UnboundedSender<QuakeEvent>,
    status: Arc<ConnectionStatus>,
    stop_tx: watch::Sender<bool>,
    metrics: Arc<WsMetrics>,
}

impl QuakeWsClient {
    /// Create a client; returns the receiver end of the event channel.
    pub fn new(
        config: FeedConfig,
        status: Arc<ConnectionStatus>,
    ) -> (Self, mpsc::UnboundedReceiver<QuakeEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, _) = watch::channel(false);

        let client = Self {
            config,
            event_tx,
            status,
            stop_tx,
            metrics: Arc::new(WsMetrics::default()),
        };

        (client, event_rx)
    }

    pub fn stop_handle(&self) -> WsStopHandle {
        WsStopHandle {
            stop_tx: self.stop_tx.clone(),
        }
    }

    pub fn metrics(&self) -> Arc<WsMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Connect and stream until cancelled, reconnecting after the fixed
    /// delay on every close. Runs until the stop handle fires.
    pub async fn run(&self) {
        let mut stop_rx = self.stop_tx.subscribe();

        loop {
            if *stop_rx.borrow() {
                break;
            }

            self.metrics.connect_attempts.fetch_add(1, Ordering::Relaxed);

            match self.connect_and_stream(&mut stop_rx).await {
                Ok(StreamEnd::Stopped) => break,
                Ok(StreamEnd::Closed) => {
                    // Status already flipped at the close site.
                }
                Err(e) => {
                    warn!(error = %e, "quake WS connection attempt failed");
                    if !*stop_rx.borrow() {
                        self.status.set(false);
                    }
                }
            }

            if *stop_rx.borrow() {
                break;
            }

            self.metrics
                .reconnects_scheduled
                .fetch_add(1, Ordering::Relaxed);
            debug!(delay = ?self.config.reconnect_delay, "reconnecting after delay");

            tokio::select! {
                _ = sleep(self.config.reconnect_delay) => {}
                // Cancellation clears the pending timer rather than letting
                // it fire into a stopped client.
                _ = stop_rx.changed() => break,
            }
        }

        info!("quake WS client stopped");
    }

    async fn connect_and_stream(&self, stop_rx: &mut watch::Receiver<bool>) -> Result<StreamEnd> {
        info!(url = %self.config.ws_url, "connecting to quake feed");

        let (ws_stream, resp) = tokio::select! {
            res = connect_async(self.config.ws_url.as_str()) => {
                res.context("Failed to connect to quake WS")?
            }
            _ = stop_rx.changed() => return Ok(StreamEnd::Stopped),
        };

        info!(status = %resp.status(), "connected to quake feed");
        self.metrics.connects.fetch_add(1, Ordering::Relaxed);
        self.status.set(true);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(StreamEnd::Stopped);
                }

                msg = read.next() => {
                    let Some(msg) = msg else {
                        return Ok(self.on_disconnect(stop_rx, "stream ended"));
                    };

                    match msg {
                        Ok(Message::Text(text)) => {
                            self.metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                            if let Some(event) = self.decode_frame(&text) {
                                // Terminal flag guards delivery: a frame
                                // already in flight when stop() lands is
                                // dropped, not forwarded.
                                if *stop_rx.borrow() {
                                    let _ = write.send(Message::Close(None)).await;
                                    return Ok(StreamEnd::Stopped);
                                }
                                self.metrics.events_forwarded.fetch_add(1, Ordering::Relaxed);
                                if self.event_tx.send(event).is_err() {
                                    debug!("event receiver dropped, closing stream");
                                    return Ok(self.on_disconnect(stop_rx, "receiver dropped"));
                                }
                            }
                        }
                        Ok(Message::Ping(payload)) => {
                            if write.send(Message::Pong(payload)).await.is_err() {
                                return Ok(self.on_disconnect(stop_rx, "pong send failed"));
                            }
                        }
                        Ok(Message::Close(frame)) => {
                            debug!(?frame, "quake WS closed by server");
                            return Ok(self.on_disconnect(stop_rx, "server close"));
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "quake WS transport error");
                            return Ok(self.on_disconnect(stop_rx, "transport error"));
                        }
                    }
                }
            }
        }
    }

    /// Connected -> Disconnected transition. Status is only emitted when the
    /// client has not been cancelled.
    fn on_disconnect(&self, stop_rx: &watch::Receiver<bool>, reason: &str) -> StreamEnd {
        self.metrics.disconnects.fetch_add(1, Ordering::Relaxed);
        if *stop_rx.borrow() {
            return StreamEnd::Stopped;
        }
        info!(reason, "disconnected from quake feed");
        self.status.set(false);
        StreamEnd::Closed
    }

    /// Decode one inbound text frame. Only earthquake-information frames
    /// (code 551) come back as records; everything else is filtered or, if
    /// malformed, logged and skipped without touching the connection.
    fn decode_frame(&self, text: &str) -> Option<QuakeEvent> {
        let envelope: WsEnvelope = match serde_json::from_str(text) {
            Ok(env) => env,
            Err(e) => {
                self.metrics.parse_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "failed to parse quake WS frame, skipping");
                return None;
            }
        };

        if envelope.code != CODE_EARTHQUAKE {
            self.metrics.frames_filtered.fetch_add(1, Ordering::Relaxed);
            debug!(code = envelope.code, "dropping non-earthquake frame");
            return None;
        }

        match serde_json::from_str::<QuakeEvent>(text) {
            Ok(event) => Some(event),
            Err(e) => {
                self.metrics.parse_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "malformed earthquake frame, skipping");
                None
            }
        }
    }
}

/// Minimal envelope used for the type filter before a full decode.
#[derive(Debug, Deserialize)]
struct WsEnvelope {
    #[serde(default)]
    code: i64,
}
