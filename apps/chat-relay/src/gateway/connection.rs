//! Per-connection handle the hub delivers into.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use chat_common::id::{self, PrefixedId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// An immutable chat line. Cloning shares the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage(Arc<str>);

impl Deref for ChatMessage {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChatMessage {
    fn from(text: &str) -> Self {
        Self(Arc::from(text))
    }
}

impl From<String> for ChatMessage {
    fn from(text: String) -> Self {
        Self(Arc::from(text))
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a message could not be queued for a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendFailure {
    #[error("outbound queue full")]
    QueueFull,
    #[error("connection closed")]
    Closed,
}

/// One accepted websocket participant, as the hub sees it: an identity and
/// a non-blocking way to queue outbound messages.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    id: String,
    outbound: mpsc::Sender<ChatMessage>,
}

impl PrefixedId for ClientConnection {
    const PREFIX: &'static str = id::prefix::CONNECTION;
}

impl ClientConnection {
    /// Open a connection with an outbound queue bounded to `capacity`
    /// messages. The returned [`Outbox`] is drained by the writer task.
    pub fn open(capacity: usize) -> (Self, Outbox) {
        let (outbound, inbound) = mpsc::channel(capacity.max(1));
        let id = Self::generate();
        let outbox = Outbox {
            id: id.clone(),
            rx: inbound,
        };
        (Self { id, outbound }, outbox)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue a message without waiting.
    pub fn try_deliver(&self, message: ChatMessage) -> Result<(), SendFailure> {
        self.outbound.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => SendFailure::QueueFull,
            TrySendError::Closed(_) => SendFailure::Closed,
        })
    }
}

/// Receive side of a connection's outbound queue.
///
/// Yields `None` once every [`ClientConnection`] clone for it has been
/// dropped, which happens when the hub releases the membership.
#[derive(Debug)]
pub struct Outbox {
    id: String,
    rx: mpsc::Receiver<ChatMessage>,
}

impl Outbox {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn next(&mut self) -> Option<ChatMessage> {
        self.rx.recv().await
    }

    /// Take a queued message if one is ready.
    pub fn try_next(&mut self) -> Option<ChatMessage> {
        self.rx.try_recv().ok()
    }
}
