//! UDP presence broadcast.
//!
//! Every `interval` the server sends one [`DiscoveryAnnouncement`] to the LAN
//! broadcast address on the discovery port.  A tablet that has never been
//! paired listens on that port, reads the server's IPv4 address and ports
//! from the datagram, and then connects over TCP to pair.
//!
//! # Choosing the advertised address (for beginners)
//!
//! A server bound to `0.0.0.0` listens on every interface, which is not an
//! address a tablet can connect to.  In that case the broadcaster asks the OS
//! which local address it would use to reach the outside world: connecting a
//! UDP socket sends no packets but fills in its local address.  The lookup is
//! repeated every round, so a laptop that changes Wi-Fi networks starts
//! advertising its new address without a restart.
//!
//! If no address can be found the round is skipped with a warning and the
//! loop tries again on the next tick.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use classroom_core::DiscoveryAnnouncement;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Settings for the presence broadcaster.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Where datagrams go; normally `255.255.255.255:<udp_port>`.
    pub target: SocketAddr,
    pub interval: Duration,
    /// Address to advertise.  `None` means look it up every round.
    pub advertised_ip: Option<Ipv4Addr>,
    pub http_port: u16,
    pub tcp_port: u16,
}

impl DiscoveryConfig {
    /// Broadcast target for `udp_port` on the local LAN.
    pub fn broadcast_target(udp_port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), udp_port)
    }
}

/// Broadcasts presence until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the sending socket cannot be created.  Send failures
/// are logged and retried on the next tick.
pub async fn run_broadcaster(config: DiscoveryConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .context("failed to bind discovery socket")?;
    socket
        .set_broadcast(true)
        .context("failed to enable broadcast on discovery socket")?;

    info!(
        target = %config.target,
        interval = ?config.interval,
        "discovery broadcast started"
    );

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while running.load(Ordering::Relaxed) {
        // A short timeout lets the loop notice the shutdown flag between ticks.
        if timeout(Duration::from_millis(200), ticker.tick()).await.is_err() {
            continue;
        }

        let Some(ip) = config.advertised_ip.or_else(local_ipv4) else {
            warn!("could not determine local IPv4 address; skipping broadcast");
            continue;
        };
        let announcement = DiscoveryAnnouncement {
            ip,
            http_port: config.http_port,
            tcp_port: config.tcp_port,
        };

        match socket.send_to(&announcement.encode(), config.target).await {
            Ok(_) => debug!(%ip, http_port = config.http_port, tcp_port = config.tcp_port, "discovery broadcast sent"),
            Err(e) => warn!(target = %config.target, "discovery broadcast failed: {e}"),
        }
    }

    info!("shutdown flag set; stopping discovery broadcast");
    Ok(())
}

/// The advertised address implied by a configured bind address: the address
/// itself when it is a concrete IPv4 address, `None` when it must be looked up.
pub fn advertised_ip_for(bind: IpAddr) -> Option<Ipv4Addr> {
    match bind {
        IpAddr::V4(v4) if !v4.is_unspecified() && !v4.is_loopback() => Some(v4),
        _ => None,
    }
}

/// The local IPv4 address the OS would route LAN traffic from.
fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(v4) if !v4.is_unspecified() && !v4.is_loopback() => Some(v4),
        _ => None,
    }
}
