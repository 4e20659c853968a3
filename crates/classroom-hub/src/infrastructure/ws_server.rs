//! WebSocket server for teacher UI clients.
//!
//! Each accepted connection is upgraded to a WebSocket, registered with the
//! [`ClientBroadcaster`], and then served by one task that:
//!
//! - writes every queued [`PushMessage`](crate::domain::PushMessage) as a JSON
//!   text frame, and
//! - reads from the socket only to notice when the client goes away.
//!
//! The push channel is one-way; anything a UI client sends is ignored.
//!
//! Shutdown is driven by a shared `AtomicBool` set from `main.rs`, checked by
//! the accept loop every 200 ms.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use crate::domain::HubConfig;
use crate::infrastructure::broadcaster::ClientBroadcaster;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves UI clients until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    config: HubConfig,
    broadcaster: Arc<ClientBroadcaster>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind hub listener on {}", config.bind_addr))?;
    info!("push hub listening on {}", config.bind_addr);

    serve(listener, broadcaster, running).await
}

/// Runs the accept loop on an already bound listener.
///
/// # Errors
///
/// Currently never fails; accept errors are logged and the loop continues.
pub async fn serve(
    listener: TcpListener,
    broadcaster: Arc<ClientBroadcaster>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping hub accept loop");
            break;
        }

        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("new UI client connection from {peer_addr}");
                let broadcaster = Arc::clone(&broadcaster);
                tokio::spawn(async move {
                    handle_ui_client(stream, peer_addr, broadcaster).await;
                });
            }
            Ok(Err(e)) => error!("hub accept error: {e}"),
            Err(_) => {
                // No connection in the last 200 ms; re-check `running`.
            }
        }
    }

    Ok(())
}

// ── Per-client handler ────────────────────────────────────────────────────────

async fn handle_ui_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    broadcaster: Arc<ClientBroadcaster>,
) {
    match run_client(stream, peer_addr, broadcaster).await {
        Ok(()) => info!("UI client {peer_addr} disconnected"),
        Err(e) => warn!("UI client {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    broadcaster: Arc<ClientBroadcaster>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // Register only after the handshake so half-open sockets never count as clients.
    let (client_id, mut queue) = broadcaster.register();
    info!(%client_id, "UI client {peer_addr} subscribed to pushes");

    let result: anyhow::Result<()> = loop {
        tokio::select! {
            queued = queue.recv() => {
                let Some(message) = queued else {
                    break Ok(());
                };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!(%client_id, "push serialization error: {e}");
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(WsMessage::Text(text)).await {
                    break Err(anyhow::Error::new(e).context("push write failed"));
                }
            }
            incoming = ws_rx.next() => match incoming {
                None | Some(Ok(WsMessage::Close(_))) => break Ok(()),
                Some(Ok(_)) => debug!(%client_id, "ignoring frame from UI client"),
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => break Ok(()),
                Some(Err(e)) => break Err(anyhow::Error::new(e).context("UI client read failed")),
            },
        }
    };

    broadcaster.unregister(client_id);
    result
}
