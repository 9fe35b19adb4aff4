//! Per-connection reader and writer tasks.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::time;

use crate::config::Config;
use crate::error::RelayError;

use super::connection::{ClientConnection, Outbox};
use super::hub::{BroadcastHub, HubError};

/// How long the writer may take to flush its closing frames once the reader
/// has stopped.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Timing limits applied to every chat session.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub keepalive_interval: Duration,
    pub idle_timeout: Duration,
}

impl From<&Config> for SessionLimits {
    fn from(config: &Config) -> Self {
        Self {
            keepalive_interval: config.keepalive_interval,
            idle_timeout: config.idle_timeout,
        }
    }
}

/// Join `connection` to the hub and pump the socket until either side gives
/// up, then leave.
pub async fn run_session(
    socket: WebSocket,
    hub: Arc<BroadcastHub>,
    connection: ClientConnection,
    outbox: Outbox,
    limits: SessionLimits,
) {
    let (mut ws_tx, ws_rx) = socket.split();

    let subscription = match hub.join(connection) {
        Ok(subscription) => subscription,
        Err(HubError::Closed) => {
            let _ = send_close(&mut ws_tx, close_code::AWAY, "Chat room is shutting down").await;
            return;
        }
        Err(err @ HubError::MembershipExhausted) => {
            tracing::error!(error = %err, "chat membership state is unusable, aborting");
            std::process::abort();
        }
    };
    let connection_id = subscription.connection_id().to_string();

    let mut writer = tokio::spawn(write_loop(ws_tx, outbox, limits.keepalive_interval));
    let mut reader = tokio::spawn(read_loop(
        ws_rx,
        Arc::clone(&hub),
        connection_id.clone(),
        limits.idle_timeout,
    ));

    let (side, outcome) = tokio::select! {
        outcome = &mut reader => {
            // Leaving releases the outbox, so the writer drains and closes.
            hub.leave(&subscription);
            if time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
                writer.abort();
            }
            ("reader", outcome)
        }
        outcome = &mut writer => {
            reader.abort();
            hub.leave(&subscription);
            ("writer", outcome)
        }
    };

    match outcome {
        Ok(Ok(())) => tracing::debug!(connection_id = %connection_id, side, "chat session ended"),
        Ok(Err(err)) => {
            tracing::debug!(connection_id = %connection_id, side, error = %err, "chat session failed")
        }
        Err(err) => {
            tracing::warn!(connection_id = %connection_id, side, error = %err, "chat session task died")
        }
    }
}

/// Publish every inbound text frame until the peer closes, errors, or goes
/// quiet for longer than `idle_timeout`.
async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    hub: Arc<BroadcastHub>,
    connection_id: String,
    idle_timeout: Duration,
) -> Result<(), RelayError> {
    loop {
        let message = match time::timeout(idle_timeout, ws_rx.next()).await {
            Ok(Some(message)) => message?,
            Ok(None) => return Ok(()),
            Err(_elapsed) => {
                tracing::debug!(connection_id = %connection_id, "idle timeout, closing");
                return Ok(());
            }
        };

        match message {
            Message::Text(text) => {
                let delivery = hub.publish(text.as_str())?;
                tracing::trace!(
                    connection_id = %connection_id,
                    delivered = delivery.delivered,
                    dropped = delivery.dropped,
                    "chat message published"
                );
            }
            Message::Binary(_) => {
                tracing::debug!(connection_id = %connection_id, "ignoring binary frame");
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Ok(()),
        }
    }
}

/// Write queued messages to the socket, pinging every `keepalive`. Ends when
/// the hub releases the connection or a write fails.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbox: Outbox,
    keepalive: Duration,
) -> Result<(), RelayError> {
    let connection_id = outbox.id().to_string();
    let mut keepalive_timer = time::interval(keepalive);
    keepalive_timer.tick().await; // First tick fires immediately; skip it.

    loop {
        tokio::select! {
            next = outbox.next() => match next {
                Some(message) => {
                    if let Err(err) = ws_tx.send(Message::Text(message.to_string().into())).await {
                        let _ = ws_tx.flush().await;
                        return Err(err.into());
                    }
                }
                None => {
                    tracing::debug!(connection_id = %connection_id, "released by hub, closing");
                    if send_close(&mut ws_tx, close_code::AWAY, "Disconnected from chat")
                        .await
                        .is_err()
                    {
                        // Peer closed first; push out the queued close reply.
                        let _ = ws_tx.flush().await;
                    }
                    return Ok(());
                }
            },
            _ = keepalive_timer.tick() => ws_tx.send(Message::Ping(Bytes::new())).await?,
        }
    }
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
