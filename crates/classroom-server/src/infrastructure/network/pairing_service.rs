//! TCP endpoint for student tablets.
//!
//! # Connection lifecycle (for beginners)
//!
//! 1. The accept loop in [`PairingProtocolService::serve`] hands every socket
//!    to its own Tokio task.
//! 2. The socket is split.  A writer task drains a bounded channel of
//!    [`ServerCommand`]s and writes them as frames; the reader loop runs in
//!    the connection task itself.
//! 3. The first useful frame must be `PAIRING_REQUEST`.  The device id is
//!    registered with the [`DeviceRegistry`] (new or already paired), the
//!    connection is bound to it, and `PAIRING_ACK` is queued.
//! 4. After that, `STATUS_UPDATE` and `HAND_RAISED` become
//!    [`ProtocolEvent`]s, `HAND_RAISED` is answered with `HAND_ACK`, and
//!    `DISTRIBUTE_ACK` cancels a pending distribution deadline.  A status
//!    report of `LOCKED` (or `ON_TASK`/`IDLE`) also confirms a pending lock
//!    (or unlock) command.
//! 5. When the socket closes, or nothing arrives for the heartbeat timeout,
//!    the device is still paired; only its live channel goes away and
//!    `Disconnected` is published.  Tablets send `STATUS_UPDATE` every few
//!    seconds, so silence means the peer is gone even if TCP never noticed.
//!
//! A bad frame never closes the connection.  Frames with an unknown opcode or
//! an unparsable payload are skipped by their declared length.  An oversized
//! frame is skipped in full, including bytes that have not arrived yet.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use classroom_core::protocol::{decode_device_message_limited, encode_command, HEADER_SIZE};
use classroom_core::{
    ControlCommand, DeviceMessage, DeviceStatus, EventBus, ProtocolError, ProtocolEvent,
    ServerCommand,
};
use dashmap::DashMap;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::deadlines::{ControlDeadlines, DistributionDeadlines};
use crate::application::{
    ControlChannel, DeliveryTracker, DeviceRegistry, ServiceError, ServiceResult,
};

/// Commands queued per connection before `send_command` reports `QueueFull`.
const COMMAND_QUEUE_DEPTH: usize = 64;

/// Settings for the tablet endpoint.
#[derive(Debug, Clone)]
pub struct PairingConfig {
    pub bind_addr: SocketAddr,
    /// How long a tablet has to fetch newly assigned material.
    pub distribution_deadline: Duration,
    /// How long a tablet has to confirm a lock, unlock or config refresh.
    pub control_deadline: Duration,
    /// A bound connection with no inbound bytes for this long is dropped.
    pub heartbeat_timeout: Duration,
    /// Largest accepted frame payload.
    pub max_frame_bytes: usize,
}

/// Why a command could not be queued.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("device {0} has no live connection")]
    NotConnected(Uuid),

    #[error("command queue for device {0} is full")]
    QueueFull(Uuid),
}

pub struct PairingProtocolService {
    config: PairingConfig,
    registry: Arc<DeviceRegistry>,
    events: EventBus<ProtocolEvent>,
    /// Command channel of each bound connection.  A reconnect replaces the
    /// entry; a closing connection only removes its own entry.
    connections: DashMap<Uuid, mpsc::Sender<ServerCommand>>,
    deadlines: DistributionDeadlines,
    control_deadlines: ControlDeadlines,
}

impl PairingProtocolService {
    pub fn new(config: PairingConfig, registry: Arc<DeviceRegistry>) -> Self {
        let events = EventBus::new();
        let deadlines =
            DistributionDeadlines::distribution(config.distribution_deadline, events.clone());
        let control_deadlines = ControlDeadlines::control(config.control_deadline, events.clone());
        Self {
            config,
            registry,
            events,
            connections: DashMap::new(),
            deadlines,
            control_deadlines,
        }
    }

    /// Bus carrying [`ProtocolEvent`]s from every connection.
    pub fn events(&self) -> &EventBus<ProtocolEvent> {
        &self.events
    }

    pub fn deadlines(&self) -> &DistributionDeadlines {
        &self.deadlines
    }

    pub fn control_deadlines(&self) -> &ControlDeadlines {
        &self.control_deadlines
    }

    /// Whether `device_id` currently has a bound connection.
    pub fn is_connected(&self, device_id: Uuid) -> bool {
        self.connections.contains_key(&device_id)
    }

    pub fn connected_count(&self) -> usize {
        self.connections.len()
    }

    /// Queues `command` on the device's live connection without waiting.
    ///
    /// # Errors
    ///
    /// - [`NetworkError::NotConnected`] if no connection is bound to the
    ///   device, or it has just closed.
    /// - [`NetworkError::QueueFull`] if the connection's queue is saturated.
    pub fn send_command(&self, device_id: Uuid, command: ServerCommand) -> Result<(), NetworkError> {
        let sender = self
            .connections
            .get(&device_id)
            .map(|entry| entry.value().clone())
            .ok_or(NetworkError::NotConnected(device_id))?;
        sender.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NetworkError::QueueFull(device_id),
            mpsc::error::TrySendError::Closed(_) => NetworkError::NotConnected(device_id),
        })
    }

    /// Queues a control command and starts its confirmation deadline.
    ///
    /// Nothing is tracked when the command cannot be queued.
    ///
    /// # Errors
    ///
    /// As [`Self::send_command`].
    pub fn send_control(&self, device_id: Uuid, command: ControlCommand) -> Result<(), NetworkError> {
        // Started first so a fast confirmation cannot arrive before the entry.
        self.control_deadlines.start((device_id, command));
        match self.send_command(device_id, command.server_command()) {
            Ok(()) => {
                info!(%device_id, %command, "control command sent");
                Ok(())
            }
            Err(e) => {
                self.control_deadlines.acknowledge((device_id, command));
                Err(e)
            }
        }
    }

    /// Binds the configured address and serves until `running` is cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn run(self: Arc<Self>, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .with_context(|| format!("failed to bind device listener on {}", self.config.bind_addr))?;
        self.serve(listener, running).await
    }

    /// Accept loop over an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's local address cannot be read.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        running: Arc<AtomicBool>,
    ) -> anyhow::Result<()> {
        let local = listener.local_addr().context("device listener has no local address")?;
        info!("device protocol listening on {local}");

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping device accept loop");
                break;
            }

            // A short timeout lets the loop notice the shutdown flag while idle.
            match timeout(Duration::from_millis(200), listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    debug!(%peer, "device connection accepted");
                    let service = Arc::clone(&self);
                    tokio::spawn(async move {
                        service.handle_connection(stream, peer).await;
                    });
                }
                Ok(Err(e)) => error!("device accept error: {e}"),
                Err(_) => {}
            }
        }

        Ok(())
    }

    // ── Per-connection handling ───────────────────────────────────────────────

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        match self.run_connection(stream, peer).await {
            Ok(()) => debug!(%peer, "device connection closed"),
            Err(e) => warn!(%peer, "device connection closed with error: {e:#}"),
        }
    }

    async fn run_connection(&self, stream: TcpStream, peer: SocketAddr) -> anyhow::Result<()> {
        let (mut read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let writer = tokio::spawn(write_commands(write_half, rx, peer));

        let mut conn = Connection {
            peer,
            tx,
            device_id: None,
        };
        let mut recv_buf: Vec<u8> = Vec::with_capacity(4096);
        let mut read_tmp = vec![0u8; 4096];
        // Bytes of an oversized frame still to be thrown away.
        let mut skip_remaining: usize = 0;

        let heartbeat_timeout = self.config.heartbeat_timeout;
        let result = loop {
            let n = match timeout(heartbeat_timeout, read_half.read(&mut read_tmp)).await {
                Ok(Ok(0)) => break Ok(()),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => break Err(anyhow::Error::new(e).context("read from device failed")),
                Err(_) => {
                    info!(%peer, device_id = ?conn.device_id, ?heartbeat_timeout, "no heartbeat; dropping connection");
                    break Ok(());
                }
            };

            let mut chunk = &read_tmp[..n];
            if skip_remaining > 0 {
                let skipped = skip_remaining.min(chunk.len());
                skip_remaining -= skipped;
                chunk = &chunk[skipped..];
            }
            recv_buf.extend_from_slice(chunk);

            loop {
                match decode_device_message_limited(&recv_buf, self.config.max_frame_bytes) {
                    Ok((msg, consumed)) => {
                        recv_buf.drain(..consumed);
                        self.dispatch(&mut conn, msg).await;
                    }
                    Err(ProtocolError::InsufficientData { .. }) => break,
                    Err(ProtocolError::FrameTooLarge { declared, max }) => {
                        warn!(%peer, declared, max, "oversized frame; discarding it");
                        let frame_len = HEADER_SIZE.saturating_add(declared);
                        let buffered = recv_buf.len().min(frame_len);
                        recv_buf.drain(..buffered);
                        skip_remaining = frame_len - buffered;
                        if skip_remaining > 0 {
                            recv_buf.clear();
                            break;
                        }
                    }
                    Err(e) => match e.skip_len() {
                        Some(len) => {
                            warn!(%peer, error = %e, "dropping malformed frame");
                            recv_buf.drain(..len.min(recv_buf.len()));
                        }
                        None => {
                            warn!(%peer, error = %e, "undecodable data; clearing receive buffer");
                            recv_buf.clear();
                            break;
                        }
                    },
                }
            }
        };

        if let Some(device_id) = conn.device_id {
            let removed = self
                .connections
                .remove_if(&device_id, |_, sender| sender.same_channel(&conn.tx))
                .is_some();
            if removed {
                info!(%device_id, %peer, "device disconnected");
                self.events.publish(&ProtocolEvent::Disconnected { device_id });
            }
        }
        writer.abort();
        result
    }

    async fn dispatch(&self, conn: &mut Connection, msg: DeviceMessage) {
        let peer = conn.peer;
        match msg {
            DeviceMessage::PairingRequest { device_id } => {
                self.pair(conn, device_id).await;
            }
            DeviceMessage::StatusUpdate(report) => {
                if conn.accepts(report.device_id, "STATUS_UPDATE") {
                    debug!(device_id = %report.device_id, status = ?report.status, "status update");
                    self.confirm_by_status(report.device_id, report.status);
                    self.events.publish(&ProtocolEvent::StatusUpdate(report));
                }
            }
            DeviceMessage::HandRaised { device_id } => {
                if conn.accepts(device_id, "HAND_RAISED") {
                    info!(%device_id, "hand raised");
                    self.events.publish(&ProtocolEvent::HandRaised { device_id });
                    conn.reply(ServerCommand::HandAck { device_id }).await;
                }
            }
            DeviceMessage::DistributeAck { device_id } => {
                if conn.accepts(device_id, "DISTRIBUTE_ACK") {
                    let cancelled = self.deadlines.acknowledge(device_id);
                    debug!(%device_id, %peer, cancelled, "distribution acknowledged");
                }
            }
        }
    }

    fn confirm_by_status(&self, device_id: Uuid, status: DeviceStatus) {
        for command in [ControlCommand::LockScreen, ControlCommand::UnlockScreen] {
            if command.confirmed_by_status(status)
                && self.control_deadlines.acknowledge((device_id, command))
            {
                debug!(%device_id, %command, "control command confirmed by status");
            }
        }
    }

    async fn pair(&self, conn: &mut Connection, device_id: Uuid) {
        if let Some(bound) = conn.device_id {
            if bound != device_id {
                warn!(peer = %conn.peer, %bound, claimed = %device_id, "connection already bound; pairing request dropped");
                return;
            }
        }

        match self.registry.register_device(device_id).await {
            Ok(newly_paired) => {
                debug!(%device_id, newly_paired, "pairing request accepted");
            }
            Err(e) => {
                error!(%device_id, peer = %conn.peer, "pairing failed: {e}");
                return;
            }
        }

        conn.device_id = Some(device_id);
        if let Some(previous) = self.connections.insert(device_id, conn.tx.clone()) {
            if !previous.same_channel(&conn.tx) {
                info!(%device_id, "device reconnected; replacing previous connection");
            }
        }
        conn.reply(ServerCommand::PairingAck).await;
    }
}

impl DeliveryTracker for PairingProtocolService {
    fn materials_assigned(&self, device_id: Uuid) {
        self.deadlines.start(device_id);
        match self.send_command(device_id, ServerCommand::DistributeMaterial) {
            Ok(()) => debug!(%device_id, "distribution notice queued"),
            Err(NetworkError::NotConnected(_)) => {
                debug!(%device_id, "device offline; it must fetch before the deadline")
            }
            Err(e) => warn!(%device_id, "distribution notice not sent: {e}"),
        }
    }

    fn delivery_acknowledged(&self, device_id: Uuid) {
        self.deadlines.acknowledge(device_id);
    }
}

impl ControlChannel for PairingProtocolService {
    fn send_control(&self, device_id: Uuid, command: ControlCommand) -> ServiceResult<()> {
        PairingProtocolService::send_control(self, device_id, command)
            .map_err(|e| ServiceError::Unavailable(e.to_string()))
    }

    fn config_fetched(&self, device_id: Uuid) {
        if self
            .control_deadlines
            .acknowledge((device_id, ControlCommand::RefreshConfig))
        {
            debug!(%device_id, "config refresh confirmed by fetch");
        }
    }
}

/// State owned by one connection task.
struct Connection {
    peer: SocketAddr,
    tx: mpsc::Sender<ServerCommand>,
    device_id: Option<Uuid>,
}

impl Connection {
    /// Whether a frame claiming to come from `claimed` may be processed.
    fn accepts(&self, claimed: Uuid, kind: &str) -> bool {
        match self.device_id {
            Some(bound) if bound == claimed => true,
            Some(bound) => {
                warn!(peer = %self.peer, %bound, %claimed, "{kind} for another device dropped");
                false
            }
            None => {
                warn!(peer = %self.peer, %claimed, "{kind} before pairing dropped");
                false
            }
        }
    }

    async fn reply(&self, command: ServerCommand) {
        if self.tx.send(command).await.is_err() {
            debug!(peer = %self.peer, "writer gone; reply dropped");
        }
    }
}

async fn write_commands(
    mut write_half: OwnedWriteHalf,
    mut rx: mpsc::Receiver<ServerCommand>,
    peer: SocketAddr,
) {
    while let Some(command) = rx.recv().await {
        let bytes = encode_command(&command);
        if let Err(e) = write_half.write_all(&bytes).await {
            warn!(%peer, "write to device failed: {e}");
            break;
        }
    }
}
