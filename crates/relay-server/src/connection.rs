//! Per-connection send handle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use relay_core::messages::RelayEvent;
use relay_core::{ConnectionId, DeliveryError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The send/close capability of one transport connection.
///
/// Role and identity live with the connection's session loop and in the
/// registry maps, not here.
pub struct Connection {
    pub id: ConnectionId,
    tx: mpsc::Sender<Arc<String>>,
    connected_at: Instant,
    last_seen: Mutex<Instant>,
    dropped_messages: AtomicU64,
    closed: AtomicBool,
    closer: CancellationToken,
}

impl Connection {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            closer: CancellationToken::new(),
        }
    }

    /// Queue a text frame for the writer task.
    pub fn send(&self, message: Arc<String>) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(DeliveryError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), DeliveryError> {
        self.send(Arc::new(text.into()))
    }

    pub fn send_event(&self, event: &RelayEvent) -> Result<(), DeliveryError> {
        match event.to_json() {
            Some(json) => self.send(Arc::new(json)),
            None => Err(DeliveryError::Encode),
        }
    }

    /// Record inbound activity (any frame, including pongs).
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark closed and signal the session loop. Returns `false` if the
    /// connection was already closed.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        self.closer.cancel();
        first
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once [`Connection::close`] has been called.
    pub async fn closed(&self) {
        self.closer.cancelled().await;
    }
}
