//! DeviceControlService: teacher commands that change a tablet's state.
//!
//! Locking, unlocking and config refreshes are sent over the tablet's live
//! connection through a [`ControlChannel`].  The channel also owns the
//! confirmation deadlines: if a tablet never confirms, the protocol layer
//! publishes `ControlCommandTimedOut` and the teacher UI is told.

use std::sync::Arc;

use classroom_core::ControlCommand;
use tracing::debug;
use uuid::Uuid;

use super::device_registry::DeviceRegistry;
use super::error::{ServiceError, ServiceResult};

/// Delivers control commands to tablets and hears about config fetches.
///
/// Both calls are made from request-handling contexts and must not block.
pub trait ControlChannel: Send + Sync {
    /// Queues `command` for `device_id` and starts waiting for confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unavailable`] if the device has no live
    /// connection or its queue is full.
    fn send_control(&self, device_id: Uuid, command: ControlCommand) -> ServiceResult<()>;

    /// `device_id` fetched its configuration.
    fn config_fetched(&self, device_id: Uuid);
}

pub struct DeviceControlService {
    registry: Arc<DeviceRegistry>,
    channel: Arc<dyn ControlChannel>,
}

impl DeviceControlService {
    pub fn new(registry: Arc<DeviceRegistry>, channel: Arc<dyn ControlChannel>) -> Self {
        Self { registry, channel }
    }

    /// Sends `command` to a paired device.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the device is not paired.
    /// - [`ServiceError::Unavailable`] if it is paired but offline.
    pub async fn send(&self, device_id: Uuid, command: ControlCommand) -> ServiceResult<()> {
        if !self.registry.is_device_paired(device_id).await? {
            return Err(ServiceError::not_found("Device", device_id));
        }
        self.channel.send_control(device_id, command)
    }

    /// Forwards a config fetch so a pending refresh counts as confirmed.
    pub fn config_fetched(&self, device_id: Uuid) {
        debug!(%device_id, "config fetched");
        self.channel.config_fetched(device_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::memory::MemoryDeviceRepository;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<(Uuid, ControlCommand)>>,
        fetched: Mutex<Vec<Uuid>>,
        offline: bool,
    }

    impl ControlChannel for RecordingChannel {
        fn send_control(&self, device_id: Uuid, command: ControlCommand) -> ServiceResult<()> {
            if self.offline {
                return Err(ServiceError::Unavailable(format!("device {device_id} has no live connection")));
            }
            self.sent.lock().unwrap().push((device_id, command));
            Ok(())
        }

        fn config_fetched(&self, device_id: Uuid) {
            self.fetched.lock().unwrap().push(device_id);
        }
    }

    async fn paired(channel: Arc<RecordingChannel>) -> (DeviceControlService, Uuid) {
        let registry = Arc::new(DeviceRegistry::new(Arc::new(MemoryDeviceRepository::new())));
        let device = Uuid::new_v4();
        registry.register_device(device).await.unwrap();
        (DeviceControlService::new(registry, channel), device)
    }

    #[tokio::test]
    async fn test_command_reaches_channel_for_paired_device() {
        // Arrange
        let channel = Arc::new(RecordingChannel::default());
        let (service, device) = paired(channel.clone()).await;

        // Act
        service.send(device, ControlCommand::LockScreen).await.unwrap();

        // Assert
        assert_eq!(
            *channel.sent.lock().unwrap(),
            vec![(device, ControlCommand::LockScreen)]
        );
    }

    #[tokio::test]
    async fn test_unpaired_device_is_not_found() {
        let channel = Arc::new(RecordingChannel::default());
        let (service, _) = paired(channel.clone()).await;

        let result = service.send(Uuid::new_v4(), ControlCommand::UnlockScreen).await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_device_is_unavailable() {
        let channel = Arc::new(RecordingChannel {
            offline: true,
            ..RecordingChannel::default()
        });
        let (service, device) = paired(channel).await;

        let result = service.send(device, ControlCommand::RefreshConfig).await;

        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_config_fetch_is_forwarded() {
        let channel = Arc::new(RecordingChannel::default());
        let (service, device) = paired(channel.clone()).await;

        service.config_fetched(device);

        assert_eq!(*channel.fetched.lock().unwrap(), vec![device]);
    }
}
