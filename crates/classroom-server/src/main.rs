//! classroom-server binary entry point.
//!
//! Starts the three network surfaces of the classroom hub in one process:
//!
//! | Surface            | Default port | Used by                 |
//! |--------------------|--------------|-------------------------|
//! | HTTP API (`axum`)  | 5911         | tablets, teacher UIs    |
//! | Device protocol    | 5912         | tablets                 |
//! | UDP broadcast      | 5913 (dest)  | unpaired tablets        |
//! | Push hub (WS)      | 5914         | teacher UIs             |
//!
//! # Usage
//!
//! ```text
//! classroom-server [--config <path>] [--bind <ip>] [--http-port <port>]
//!                  [--tcp-port <port>] [--udp-port <port>] [--hub-port <port>]
//!                  [--log-level <level>]
//! ```
//!
//! Every flag falls back to an environment variable, then to the config file
//! (default: the platform config directory's `classroom-hub/server.toml`),
//! then to built-in defaults.
//!
//! | Variable               | Overrides                  |
//! |------------------------|----------------------------|
//! | `CLASSROOM_CONFIG`     | config file path           |
//! | `CLASSROOM_BIND`       | `network.bind_address`     |
//! | `CLASSROOM_HTTP_PORT`  | `network.http_port`        |
//! | `CLASSROOM_TCP_PORT`   | `network.tcp_port`         |
//! | `CLASSROOM_UDP_PORT`   | `network.udp_port`         |
//! | `CLASSROOM_HUB_PORT`   | `network.hub_port`         |
//! | `CLASSROOM_LOG_LEVEL`  | `server.log_level`         |
//!
//! `RUST_LOG` takes precedence over the configured log level.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  ├─ DeviceRegistry ──────────── RegistryEvent ──┐
//!  ├─ PairingProtocolService ──── ProtocolEvent ──┼─► HubEventBridge ─► ClientBroadcaster ─► UI clients
//!  ├─ DistributionService (tracker = PairingProtocolService)
//!  ├─ DeviceControlService (channel = PairingProtocolService)
//!  ├─ discovery broadcaster ─► 255.255.255.255:<udp_port>
//!  └─ axum router ─► Distribution / Response / Feedback / Material /
//!                    Question / Session / DeviceControl services
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use classroom_hub::application::HubEventBridge;
use classroom_hub::domain::HubConfig;
use classroom_hub::infrastructure::{run_server, ClientBroadcaster};
use classroom_server::application::{
    DeviceControlService, DeviceRegistry, DistributionService, FeedbackService, MaterialService,
    QuestionService, ResponseService, SessionService,
};
use classroom_server::infrastructure::http::{create_router, AppState};
use classroom_server::infrastructure::network::discovery::advertised_ip_for;
use classroom_server::infrastructure::network::{
    run_broadcaster, DiscoveryConfig, PairingConfig, PairingProtocolService,
};
use classroom_server::infrastructure::storage::config::{
    default_config_path, load_config, ServerConfig,
};
use classroom_server::infrastructure::storage::memory::{
    MemoryDeviceRepository, MemoryFeedbackRepository, MemoryMaterialRepository,
    MemoryQuestionRepository, MemoryResponseRepository, MemorySessionRepository,
};

// ── CLI ───────────────────────────────────────────────────────────────────────

/// Classroom hub server: pairs student tablets, distributes lesson material,
/// and collects responses.
#[derive(Debug, Parser)]
#[command(name = "classroom-server", about, version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "CLASSROOM_CONFIG")]
    config: Option<PathBuf>,

    /// IP address all listeners bind to.
    #[arg(long, env = "CLASSROOM_BIND")]
    bind: Option<String>,

    /// Port of the tablet HTTP API.
    #[arg(long, env = "CLASSROOM_HTTP_PORT")]
    http_port: Option<u16>,

    /// Port of the tablet TCP protocol.
    #[arg(long, env = "CLASSROOM_TCP_PORT")]
    tcp_port: Option<u16>,

    /// Destination port of the discovery broadcast.
    #[arg(long, env = "CLASSROOM_UDP_PORT")]
    udp_port: Option<u16>,

    /// Port of the teacher-UI push hub.
    #[arg(long, env = "CLASSROOM_HUB_PORT")]
    hub_port: Option<u16>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "CLASSROOM_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file and applies command-line overrides on top.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let path = match self.config {
            Some(path) => path,
            None => default_config_path().context("cannot locate the config directory")?,
        };
        let mut config = load_config(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;

        if let Some(bind) = self.bind {
            config.network.bind_address = bind;
        }
        if let Some(port) = self.http_port {
            config.network.http_port = port;
        }
        if let Some(port) = self.tcp_port {
            config.network.tcp_port = port;
        }
        if let Some(port) = self.udp_port {
            config.network.udp_port = port;
        }
        if let Some(port) = self.hub_port {
            config.network.hub_port = port;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_server_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!("classroom server starting");

    // Shutdown flag shared by every accept loop.
    let running = Arc::new(AtomicBool::new(true));

    // ── Storage and services ──────────────────────────────────────────────────
    let devices = Arc::new(MemoryDeviceRepository::new());
    let materials = Arc::new(MemoryMaterialRepository::new());
    let questions = Arc::new(MemoryQuestionRepository::new());
    let responses = Arc::new(MemoryResponseRepository::new());
    let feedback = Arc::new(MemoryFeedbackRepository::new());
    let sessions = Arc::new(MemorySessionRepository::new());

    let registry = Arc::new(DeviceRegistry::new(devices));
    let pairing = Arc::new(PairingProtocolService::new(
        PairingConfig {
            bind_addr: config.network.tcp_addr(),
            distribution_deadline: config.distribution.deadline(),
            control_deadline: config.protocol.control_deadline(),
            heartbeat_timeout: config.protocol.heartbeat_timeout(),
            max_frame_bytes: config.distribution.max_frame_bytes,
        },
        Arc::clone(&registry),
    ));
    let distribution = Arc::new(
        DistributionService::new(Arc::clone(&registry), materials.clone(), questions.clone())
            .with_tracker(pairing.clone()),
    );
    let control = Arc::new(DeviceControlService::new(
        Arc::clone(&registry),
        pairing.clone(),
    ));
    let material_service = Arc::new(MaterialService::new(
        materials.clone(),
        questions.clone(),
        responses.clone(),
    ));
    let question_service = Arc::new(QuestionService::new(
        questions.clone(),
        materials.clone(),
        responses.clone(),
    ));
    let session_service = Arc::new(SessionService::new(sessions, materials));
    let response_service = Arc::new(ResponseService::new(
        responses.clone(),
        questions.clone(),
        feedback.clone(),
    ));
    let feedback_service = Arc::new(FeedbackService::new(feedback, responses, questions));

    // ── Push hub ──────────────────────────────────────────────────────────────
    let hub_config = HubConfig {
        bind_addr: config.network.hub_addr(),
        ..HubConfig::default()
    };
    let broadcaster = Arc::new(ClientBroadcaster::new(hub_config.client_buffer));
    let bridge = HubEventBridge::new(
        registry.events().clone(),
        pairing.events().clone(),
        broadcaster.clone(),
    );
    bridge.start();

    let hub_task = tokio::spawn(run_server(hub_config, broadcaster, Arc::clone(&running)));

    // ── Device protocol ───────────────────────────────────────────────────────
    let device_task = tokio::spawn(Arc::clone(&pairing).run(Arc::clone(&running)));

    // ── Discovery ─────────────────────────────────────────────────────────────
    let discovery_task = if config.discovery.enabled {
        let discovery = DiscoveryConfig {
            target: DiscoveryConfig::broadcast_target(config.network.udp_port),
            interval: config.discovery.interval(),
            advertised_ip: advertised_ip_for(config.network.bind_ip()),
            http_port: config.network.http_port,
            tcp_port: config.network.tcp_port,
        };
        Some(tokio::spawn(run_broadcaster(discovery, Arc::clone(&running))))
    } else {
        info!("discovery broadcast disabled");
        None
    };

    // ── HTTP API ──────────────────────────────────────────────────────────────
    let state = AppState {
        registry,
        distribution,
        responses: response_service,
        feedback: feedback_service,
        materials: material_service,
        questions: question_service,
        sessions: session_service,
        control,
        device_settings: Arc::new(config.device.clone()),
    };
    let http_addr = config.network.http_addr();
    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {http_addr}"))?;
    info!("HTTP API listening on {http_addr}");

    // ── Ctrl-C ────────────────────────────────────────────────────────────────
    let running_signal = Arc::clone(&running);
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl+C received; shutting down");
        running_signal.store(false, Ordering::Relaxed);
    };

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    running.store(false, Ordering::Relaxed);
    bridge.stop();

    let tasks = [
        ("device protocol", Some(device_task)),
        ("push hub", Some(hub_task)),
        ("discovery", discovery_task),
    ];
    for (name, task) in tasks.into_iter().filter_map(|(name, task)| Some((name, task?))) {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("{name} stopped with error: {e:#}"),
            Err(e) => error!("{name} task panicked: {e}"),
        }
    }

    info!("classroom server stopped");
    Ok(())
}
