//! DeviceRegistry: the set of tablets allowed to talk to the server.
//!
//! Registration is idempotent.  Registering an id that is already paired is
//! a normal outcome that returns `false`; only the first registration
//! publishes [`RegistryEvent::DevicePaired`].

use std::sync::Arc;

use classroom_core::{EventBus, PairedDevice, RegistryEvent};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::ServiceResult;
use super::repositories::DeviceRepository;

pub struct DeviceRegistry {
    store: Arc<dyn DeviceRepository>,
    events: EventBus<RegistryEvent>,
}

impl DeviceRegistry {
    pub fn new(store: Arc<dyn DeviceRepository>) -> Self {
        Self {
            store,
            events: EventBus::new(),
        }
    }

    /// Bus carrying [`RegistryEvent`]s; clone it to subscribe.
    pub fn events(&self) -> &EventBus<RegistryEvent> {
        &self.events
    }

    /// Registers `device_id`, returning `true` if it was not paired before.
    ///
    /// Concurrent registrations of the same id resolve to exactly one `true`.
    ///
    /// # Errors
    ///
    /// Returns [`super::ServiceError::Storage`] if the store fails.
    pub async fn register_device(&self, device_id: Uuid) -> ServiceResult<bool> {
        let device = PairedDevice::new(device_id);
        let inserted = self.store.insert_if_absent(device.clone()).await?;
        if inserted {
            info!(%device_id, "device paired");
            self.events.publish(&RegistryEvent::DevicePaired(device));
        } else {
            debug!(%device_id, "device already paired");
        }
        Ok(inserted)
    }

    /// # Errors
    ///
    /// Returns [`super::ServiceError::Storage`] if the store fails.
    pub async fn is_device_paired(&self, device_id: Uuid) -> ServiceResult<bool> {
        Ok(self.store.contains(device_id).await?)
    }

    /// # Errors
    ///
    /// Returns [`super::ServiceError::Storage`] if the store fails.
    pub async fn paired_devices(&self) -> ServiceResult<Vec<PairedDevice>> {
        Ok(self.store.list().await?)
    }
}
