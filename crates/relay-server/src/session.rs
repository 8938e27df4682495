//! One WebSocket connection from accept to teardown.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use relay_core::Role;
use relay_settings::HandshakeMode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::connection::Connection;
use crate::handshake;
use crate::lifecycle::{self, CloseReason};
use crate::router::RelayRouter;

/// Shared pieces every session needs.
#[derive(Clone)]
pub struct SessionContext {
    pub router: Arc<RelayRouter>,
    pub heartbeat_interval: Duration,
    pub shutdown: CancellationToken,
}

/// Drive a connection until the peer leaves, the transport fails, the idle
/// sweep closes it, or the server shuts down.
///
/// Inbound messages of one connection are handled strictly in arrival
/// order; a slow enrichment call holds back only this connection.
pub async fn run_session(socket: WebSocket, mode: HandshakeMode, ctx: SessionContext) {
    let registry = Arc::clone(ctx.router.registry());
    let (conn, rx) = registry.connect();
    let role = handshake::accept(&registry, &conn, mode);

    let (ws_tx, mut ws_rx) = socket.split();
    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        rx,
        Arc::clone(&conn),
        ctx.heartbeat_interval,
        ctx.shutdown.clone(),
    ));

    let (reason, writer_finished) = tokio::select! {
        reason = read_loop(&mut ws_rx, &conn, role, &ctx) => (reason, false),
        _ = &mut writer => (CloseReason::TransportError, true),
    };

    let _ = lifecycle::close_connection(&registry, &conn, reason);
    if !writer_finished {
        let _ = writer.await;
    }
}

async fn read_loop(
    ws_rx: &mut SplitStream<WebSocket>,
    conn: &Arc<Connection>,
    mut role: Role,
    ctx: &SessionContext,
) -> CloseReason {
    loop {
        let frame = tokio::select! {
            () = ctx.shutdown.cancelled() => return CloseReason::Shutdown,
            // Only the idle sweep closes a live connection from outside.
            () = conn.closed() => return CloseReason::Idle,
            frame = ws_rx.next() => frame,
        };

        let msg = match frame {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(conn_id = %conn.id, error = %e, "websocket read failed");
                return CloseReason::TransportError;
            }
            None => return CloseReason::PeerClosed,
        };
        conn.touch();

        match msg {
            WsMessage::Text(text) => handle_text(conn, &mut role, text.as_str(), ctx).await,
            WsMessage::Binary(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                handle_text(conn, &mut role, &text, ctx).await;
            }
            WsMessage::Close(_) => return CloseReason::PeerClosed,
            // axum answers pings itself
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
        }
    }
}

async fn handle_text(conn: &Arc<Connection>, role: &mut Role, text: &str, ctx: &SessionContext) {
    if role.is_classified() {
        let outcome = ctx.router.route(conn, role, text).await;
        trace!(conn_id = %conn.id, ?outcome, "message routed");
    } else {
        *role = handshake::classify(ctx.router.registry(), conn, text);
    }
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, WsMessage>,
    mut rx: mpsc::Receiver<Arc<String>>,
    conn: Arc<Connection>,
    heartbeat_interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ping_interval = tokio::time::interval(heartbeat_interval);
    let _ = ping_interval.tick().await;

    loop {
        tokio::select! {
            () = conn.closed() => break,
            () = shutdown.cancelled() => break,
            msg = rx.recv() => {
                let Some(text) = msg else { break };
                if ws_tx.send(WsMessage::Text(text.to_string().into())).await.is_err() {
                    debug!(conn_id = %conn.id, "websocket write failed");
                    return;
                }
            }
            _ = ping_interval.tick() => {
                if ws_tx.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                    return;
                }
                trace!(conn_id = %conn.id, "sent ping");
            }
        }
    }

    let _ = ws_tx.send(WsMessage::Close(None)).await;
}
