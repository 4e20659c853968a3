//! HubEventBridge: republishes server events to teacher UI clients.
//!
//! The bridge owns nothing but its subscriptions.  [`HubEventBridge::start`]
//! subscribes one handler to each event bus; [`HubEventBridge::stop`] drops
//! them again.  Because [`Subscription::unsubscribe`] waits for any publish
//! that is running the handler, no push happens after `stop` returns.
//!
//! Handlers run on the publisher's task (a tablet connection, an HTTP
//! request, a deadline timer), so the sink must not block.

use std::sync::{Arc, Mutex, PoisonError};

use classroom_core::{
    ControlCommand, DeviceStatusReport, EventBus, ProtocolEvent, RegistryEvent, Subscription,
};
use tracing::{debug, info, warn};

use crate::domain::{ControlFailurePayload, DeviceIdPayload, PushMessage};

/// Where the bridge delivers push messages.
///
/// Implementations must return promptly: a full or dead client is the
/// implementation's problem, never the caller's.
pub trait PushSink: Send + Sync {
    /// Delivers `message` to every current client and returns how many
    /// accepted it.
    fn push(&self, message: PushMessage) -> usize;
}

// ── Translation ───────────────────────────────────────────────────────────────

pub fn translate_registry_event(event: &RegistryEvent) -> PushMessage {
    match event {
        RegistryEvent::DevicePaired(device) => PushMessage::DevicePaired(device.clone()),
    }
}

/// Maps a protocol event to its push message.
///
/// A dropped connection is shown to the UI as a status change to
/// `DISCONNECTED`.  An unconfirmed config refresh has its own message; an
/// unconfirmed lock or unlock is a `RemoteControlFailed` naming the command.
pub fn translate_protocol_event(event: &ProtocolEvent) -> PushMessage {
    match event {
        ProtocolEvent::StatusUpdate(report) => PushMessage::UpdateDeviceStatus(report.clone()),
        ProtocolEvent::HandRaised { device_id } => PushMessage::HandRaised(DeviceIdPayload {
            device_id: *device_id,
        }),
        ProtocolEvent::DistributionTimedOut { device_id } => {
            PushMessage::DistributionFailed(DeviceIdPayload {
                device_id: *device_id,
            })
        }
        ProtocolEvent::ControlCommandTimedOut {
            device_id,
            command: ControlCommand::RefreshConfig,
        } => PushMessage::ConfigRefreshFailed(DeviceIdPayload {
            device_id: *device_id,
        }),
        ProtocolEvent::ControlCommandTimedOut { device_id, command } => {
            PushMessage::RemoteControlFailed(ControlFailurePayload {
                device_id: *device_id,
                command: *command,
            })
        }
        ProtocolEvent::Disconnected { device_id } => {
            PushMessage::UpdateDeviceStatus(DeviceStatusReport::disconnected(*device_id))
        }
    }
}

// ── Bridge ────────────────────────────────────────────────────────────────────

pub struct HubEventBridge {
    registry_events: EventBus<RegistryEvent>,
    protocol_events: EventBus<ProtocolEvent>,
    sink: Arc<dyn PushSink>,
    /// `Some` while started.
    subscriptions: Mutex<Option<Vec<Subscription>>>,
}

impl HubEventBridge {
    pub fn new(
        registry_events: EventBus<RegistryEvent>,
        protocol_events: EventBus<ProtocolEvent>,
        sink: Arc<dyn PushSink>,
    ) -> Self {
        Self {
            registry_events,
            protocol_events,
            sink,
            subscriptions: Mutex::new(None),
        }
    }

    /// Subscribes to both event buses.  Calling it while already started
    /// logs a warning and changes nothing.
    pub fn start(&self) {
        let mut guard = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            warn!("hub event bridge already started");
            return;
        }

        let sink = Arc::clone(&self.sink);
        let registry = self.registry_events.subscribe(move |event| {
            let message = translate_registry_event(event);
            let delivered = sink.push(message);
            debug!(delivered, "pushed registry event");
        });

        let sink = Arc::clone(&self.sink);
        let protocol = self.protocol_events.subscribe(move |event| {
            let message = translate_protocol_event(event);
            let method = message.method();
            let delivered = sink.push(message);
            debug!(method, delivered, "pushed protocol event");
        });

        *guard = Some(vec![registry, protocol]);
        info!("hub event bridge started");
    }

    /// Unsubscribes from both buses.  A no-op when not started.
    ///
    /// Must not be called from inside a bus handler.
    pub fn stop(&self) {
        let taken = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(subscriptions) = taken else {
            return;
        };
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        info!("hub event bridge stopped");
    }

    pub fn is_running(&self) -> bool {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for HubEventBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
