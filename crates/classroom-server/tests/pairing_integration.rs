//! Integration tests for the tablet TCP protocol.
//!
//! Each test binds the service to an ephemeral port and drives it with a
//! plain `TcpStream` speaking the binary frame format.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use classroom_core::protocol::{decode_command, encode_device_message, encode_frame, Opcode};
use classroom_core::{
    ControlCommand, DeviceMessage, DeviceStatus, DeviceStatusReport, ProtocolError, ProtocolEvent,
    RegistryEvent, ServerCommand, Subscription,
};
use classroom_server::application::{DeviceRegistry, DistributionService};
use classroom_server::infrastructure::network::{PairingConfig, PairingProtocolService};
use classroom_server::infrastructure::storage::memory::{
    MemoryDeviceRepository, MemoryMaterialRepository, MemoryQuestionRepository,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(5);

// ── Harness ───────────────────────────────────────────────────────────────────

struct Server {
    addr: std::net::SocketAddr,
    service: Arc<PairingProtocolService>,
    registry: Arc<DeviceRegistry>,
    running: Arc<AtomicBool>,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

fn config(deadline: Duration, max_frame_bytes: usize) -> PairingConfig {
    PairingConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        distribution_deadline: deadline,
        control_deadline: deadline,
        heartbeat_timeout: Duration::from_secs(30),
        max_frame_bytes,
    }
}

async fn start_server(deadline: Duration, max_frame_bytes: usize) -> Server {
    start_server_with(config(deadline, max_frame_bytes)).await
}

async fn start_server_with(config: PairingConfig) -> Server {
    let registry = Arc::new(DeviceRegistry::new(Arc::new(MemoryDeviceRepository::new())));
    let service = Arc::new(PairingProtocolService::new(config, Arc::clone(&registry)));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));
    tokio::spawn(Arc::clone(&service).serve(listener, Arc::clone(&running)));
    Server {
        addr,
        service,
        registry,
        running,
    }
}

/// Collects protocol events into a channel for the lifetime of the guard.
fn record_events(
    service: &PairingProtocolService,
) -> (Subscription, mpsc::UnboundedReceiver<ProtocolEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sub = service.events().subscribe(move |event| {
        let _ = tx.send(event.clone());
    });
    (sub, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ProtocolEvent>) -> ProtocolEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("no event within timeout")
        .expect("event channel closed")
}

struct Tablet {
    id: Uuid,
    stream: TcpStream,
    buf: Vec<u8>,
}

impl Tablet {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream: TcpStream::connect(addr).await.unwrap(),
            buf: Vec::new(),
        }
    }

    async fn send(&mut self, msg: DeviceMessage) {
        let bytes = encode_device_message(&msg).unwrap();
        self.stream.write_all(&bytes).await.unwrap();
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    async fn recv(&mut self) -> ServerCommand {
        timeout(WAIT, async {
            loop {
                match decode_command(&self.buf) {
                    Ok((command, consumed)) => {
                        self.buf.drain(..consumed);
                        return command;
                    }
                    Err(ProtocolError::InsufficientData { .. }) => {
                        let mut tmp = [0u8; 1024];
                        let n = self.stream.read(&mut tmp).await.unwrap();
                        assert!(n > 0, "server closed the connection");
                        self.buf.extend_from_slice(&tmp[..n]);
                    }
                    Err(e) => panic!("bad frame from server: {e}"),
                }
            }
        })
        .await
        .expect("no command within timeout")
    }

    async fn pair(&mut self) {
        self.send(DeviceMessage::PairingRequest { device_id: self.id })
            .await;
        assert_eq!(self.recv().await, ServerCommand::PairingAck);
    }

    fn status(&self, status: DeviceStatus) -> DeviceMessage {
        DeviceMessage::StatusUpdate(DeviceStatusReport {
            device_id: self.id,
            status,
            battery_level: Some(50),
            current_material_id: None,
            student_view: None,
            timestamp: 1_700_000_000_000,
        })
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never became true");
}

// ── Pairing ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pairing_request_is_acknowledged_and_registers_device() {
    // Arrange
    let server = start_server(Duration::from_secs(30), 1024).await;
    let (tx, mut paired) = mpsc::unbounded_channel();
    let _sub = server.registry.events().subscribe(move |event| {
        let _ = tx.send(event.clone());
    });
    let mut tablet = Tablet::connect(server.addr).await;

    // Act
    tablet.pair().await;

    // Assert
    assert!(server.registry.is_device_paired(tablet.id).await.unwrap());
    assert!(server.service.is_connected(tablet.id));
    let RegistryEvent::DevicePaired(device) = timeout(WAIT, paired.recv()).await.unwrap().unwrap();
    assert_eq!(device.device_id, tablet.id);
}

#[tokio::test]
async fn test_reconnecting_tablet_pairs_again_without_new_registration() {
    let server = start_server(Duration::from_secs(30), 1024).await;
    let mut first = Tablet::connect(server.addr).await;
    first.pair().await;
    let mut second = Tablet::connect(server.addr).await;
    second.id = first.id;

    second.pair().await;

    assert_eq!(server.registry.paired_devices().await.unwrap().len(), 1);
    assert_eq!(server.service.connected_count(), 1);
}

// ── Device frames ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_frames_before_pairing_are_dropped() {
    // Arrange
    let server = start_server(Duration::from_secs(30), 1024).await;
    let (_sub, mut events) = record_events(&server.service);
    let mut tablet = Tablet::connect(server.addr).await;

    // Act: an unpaired status, then pairing, then a paired status
    tablet.send(tablet.status(DeviceStatus::Idle)).await;
    tablet.pair().await;
    tablet.send(tablet.status(DeviceStatus::OnTask)).await;

    // Assert: only the second status arrives
    match next_event(&mut events).await {
        ProtocolEvent::StatusUpdate(report) => assert_eq!(report.status, DeviceStatus::OnTask),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_frames_claiming_another_device_are_dropped() {
    let server = start_server(Duration::from_secs(30), 1024).await;
    let (_sub, mut events) = record_events(&server.service);
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;

    tablet
        .send(DeviceMessage::HandRaised {
            device_id: Uuid::new_v4(),
        })
        .await;
    tablet.send(DeviceMessage::HandRaised { device_id: tablet.id }).await;

    assert_eq!(
        next_event(&mut events).await,
        ProtocolEvent::HandRaised { device_id: tablet.id }
    );
}

#[tokio::test]
async fn test_hand_raised_publishes_event_and_is_acknowledged() {
    // Arrange
    let server = start_server(Duration::from_secs(30), 1024).await;
    let (_sub, mut events) = record_events(&server.service);
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;

    // Act
    tablet.send(DeviceMessage::HandRaised { device_id: tablet.id }).await;

    // Assert
    assert_eq!(
        tablet.recv().await,
        ServerCommand::HandAck { device_id: tablet.id }
    );
    assert_eq!(
        next_event(&mut events).await,
        ProtocolEvent::HandRaised { device_id: tablet.id }
    );
}

#[tokio::test]
async fn test_events_from_one_connection_keep_socket_order() {
    let server = start_server(Duration::from_secs(30), 1024).await;
    let (_sub, mut events) = record_events(&server.service);
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;

    let statuses = [DeviceStatus::OnTask, DeviceStatus::Idle, DeviceStatus::Locked];
    for status in statuses {
        tablet.send(tablet.status(status)).await;
    }

    for expected in statuses {
        match next_event(&mut events).await {
            ProtocolEvent::StatusUpdate(report) => assert_eq!(report.status, expected),
            other => panic!("unexpected event {other:?}"),
        }
    }
}

// ── Malformed input ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_malformed_frames_are_skipped_without_closing_connection() {
    // Arrange
    let server = start_server(Duration::from_secs(30), 1024).await;
    let (_sub, mut events) = record_events(&server.service);
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;

    // Act: bad JSON, an unknown opcode, a server-only opcode, then a good frame
    tablet
        .send_raw(&encode_frame(Opcode::StatusUpdate, b"{not json"))
        .await;
    tablet.send_raw(&[0xEE, 0, 0, 0, 3, 1, 2, 3]).await;
    tablet.send_raw(&encode_frame(Opcode::LockScreen, &[])).await;
    tablet.send(DeviceMessage::HandRaised { device_id: tablet.id }).await;

    // Assert
    assert_eq!(
        next_event(&mut events).await,
        ProtocolEvent::HandRaised { device_id: tablet.id }
    );
}

#[tokio::test]
async fn test_oversized_frame_is_discarded_in_full() {
    // Arrange: limit of 64 bytes, frame declaring 300
    let server = start_server(Duration::from_secs(30), 64).await;
    let (_sub, mut events) = record_events(&server.service);
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;
    let oversized = encode_frame(Opcode::StatusUpdate, &[b'x'; 300]);

    // Act: header and part of the body, a pause, then the rest
    tablet.send_raw(&oversized[..40]).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    tablet.send_raw(&oversized[40..]).await;
    tablet.send(DeviceMessage::HandRaised { device_id: tablet.id }).await;

    // Assert
    assert_eq!(
        next_event(&mut events).await,
        ProtocolEvent::HandRaised { device_id: tablet.id }
    );
}

// ── Disconnect ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_publishes_event_and_keeps_pairing() {
    // Arrange
    let server = start_server(Duration::from_secs(30), 1024).await;
    let (_sub, mut events) = record_events(&server.service);
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;
    let id = tablet.id;

    // Act
    drop(tablet);

    // Assert
    assert_eq!(
        next_event(&mut events).await,
        ProtocolEvent::Disconnected { device_id: id }
    );
    assert!(!server.service.is_connected(id));
    assert!(server.registry.is_device_paired(id).await.unwrap());
}

#[tokio::test]
async fn test_silent_tablet_is_dropped_after_heartbeat_timeout() {
    // Arrange
    let server = start_server_with(PairingConfig {
        heartbeat_timeout: Duration::from_millis(200),
        ..config(Duration::from_secs(30), 1024)
    })
    .await;
    let (_sub, mut events) = record_events(&server.service);
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;

    // Act: the tablet keeps its socket open but sends nothing

    // Assert
    assert_eq!(
        next_event(&mut events).await,
        ProtocolEvent::Disconnected { device_id: tablet.id }
    );
    assert!(!server.service.is_connected(tablet.id));
    let mut tmp = [0u8; 16];
    let read = timeout(WAIT, tablet.stream.read(&mut tmp)).await.unwrap();
    assert!(matches!(read, Ok(0)), "server should have closed the socket");
}

#[tokio::test]
async fn test_regular_status_updates_keep_connection_alive() {
    let server = start_server_with(PairingConfig {
        heartbeat_timeout: Duration::from_millis(300),
        ..config(Duration::from_secs(30), 1024)
    })
    .await;
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tablet.send(tablet.status(DeviceStatus::OnTask)).await;
    }

    assert!(server.service.is_connected(tablet.id));
}

#[tokio::test]
async fn test_stale_connection_closing_does_not_unbind_replacement() {
    let server = start_server(Duration::from_secs(30), 1024).await;
    let (_sub, mut events) = record_events(&server.service);
    let mut old = Tablet::connect(server.addr).await;
    old.pair().await;
    let mut new = Tablet::connect(server.addr).await;
    new.id = old.id;
    new.pair().await;

    drop(old);
    new.send(DeviceMessage::HandRaised { device_id: new.id }).await;

    assert_eq!(
        next_event(&mut events).await,
        ProtocolEvent::HandRaised { device_id: new.id }
    );
    assert!(server.service.is_connected(new.id));
}

// ── Distribution ──────────────────────────────────────────────────────────────

fn distribution_for(server: &Server) -> DistributionService {
    DistributionService::new(
        Arc::clone(&server.registry),
        Arc::new(MemoryMaterialRepository::new()),
        Arc::new(MemoryQuestionRepository::new()),
    )
    .with_tracker(server.service.clone())
}

#[tokio::test]
async fn test_assignment_notifies_tablet_and_ack_cancels_deadline() {
    // Arrange
    let server = start_server(Duration::from_secs(30), 1024).await;
    let distribution = distribution_for(&server);
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;

    // Act
    distribution
        .assign_materials(tablet.id, Some(vec![Uuid::new_v4()]))
        .unwrap();

    // Assert
    assert_eq!(tablet.recv().await, ServerCommand::DistributeMaterial);
    assert!(server.service.deadlines().is_pending(tablet.id));

    tablet
        .send(DeviceMessage::DistributeAck { device_id: tablet.id })
        .await;
    let service = Arc::clone(&server.service);
    let id = tablet.id;
    wait_until(move || !service.deadlines().is_pending(id)).await;
}

#[tokio::test]
async fn test_unfetched_assignment_times_out() {
    // Arrange
    let server = start_server(Duration::from_millis(100), 1024).await;
    let (_sub, mut events) = record_events(&server.service);
    let distribution = distribution_for(&server);
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;

    // Act
    distribution
        .assign_materials(tablet.id, Some(vec![Uuid::new_v4()]))
        .unwrap();

    // Assert
    assert_eq!(
        next_event(&mut events).await,
        ProtocolEvent::DistributionTimedOut { device_id: tablet.id }
    );
}

// ── Control commands ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_lock_is_confirmed_by_locked_status() {
    // Arrange
    let server = start_server(Duration::from_secs(30), 1024).await;
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;
    let key = (tablet.id, ControlCommand::LockScreen);

    // Act
    server
        .service
        .send_control(tablet.id, ControlCommand::LockScreen)
        .unwrap();

    // Assert
    assert_eq!(tablet.recv().await, ServerCommand::LockScreen);
    assert!(server.service.control_deadlines().is_pending(key));

    tablet.send(tablet.status(DeviceStatus::Locked)).await;
    let service = Arc::clone(&server.service);
    wait_until(move || !service.control_deadlines().is_pending(key)).await;
}

#[tokio::test]
async fn test_unconfirmed_refresh_times_out_with_its_command() {
    // Arrange
    let server = start_server(Duration::from_millis(100), 1024).await;
    let (_sub, mut events) = record_events(&server.service);
    let mut tablet = Tablet::connect(server.addr).await;
    tablet.pair().await;

    // Act: the tablet receives the command but never fetches its config
    server
        .service
        .send_control(tablet.id, ControlCommand::RefreshConfig)
        .unwrap();
    assert_eq!(tablet.recv().await, ServerCommand::RefreshConfig);

    // Assert
    assert_eq!(
        next_event(&mut events).await,
        ProtocolEvent::ControlCommandTimedOut {
            device_id: tablet.id,
            command: ControlCommand::RefreshConfig,
        }
    );
}
