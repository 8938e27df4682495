//! Connection teardown and the idle sweep.

use std::sync::Arc;
use std::time::Duration;

use relay_core::Role;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::registry::ConnectionRegistry;

/// Why a connection is being torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent a close frame or the stream ended.
    PeerClosed,
    TransportError,
    /// No inbound traffic within the client timeout.
    Idle,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::TransportError => "transport_error",
            Self::Idle => "idle",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Unregister `conn` and release its transport. Safe to call any number of
/// times from any task; only the first call has an effect.
///
/// Returns the role the connection held, or `None` if it was already gone.
pub fn close_connection(
    registry: &ConnectionRegistry,
    conn: &Connection,
    reason: CloseReason,
) -> Option<Role> {
    let role = registry.unregister(&conn.id);
    let first_close = conn.close();
    match &role {
        Some(role) => info!(
            conn_id = %conn.id,
            role = %role,
            reason = reason.as_str(),
            age_ms = saturating_millis(conn.age()),
            dropped = conn.drop_count(),
            "connection closed"
        ),
        None if first_close => {
            debug!(conn_id = %conn.id, reason = reason.as_str(), "closed unregistered connection");
        }
        None => {}
    }
    role
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Close every connection that has been silent for `timeout`. Returns how
/// many were closed.
pub fn sweep_idle(registry: &ConnectionRegistry, timeout: Duration) -> usize {
    let idle = registry.idle_connections(timeout);
    for conn in &idle {
        let _ = close_connection(registry, conn, CloseReason::Idle);
    }
    idle.len()
}

/// Periodic idle sweep until `shutdown` is cancelled.
pub fn start_sweep_task(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    timeout: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let _ = ticker.tick().await;
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = sweep_idle(&registry, timeout);
                    if removed > 0 {
                        info!(removed, "idle connection sweep");
                    }
                }
            }
        }
    })
}
