//! State shared by every handler.

use std::sync::Arc;

use crate::application::{
    DeviceControlService, DeviceRegistry, DistributionService, FeedbackService, MaterialService,
    QuestionService, ResponseService, SessionService,
};
use crate::infrastructure::storage::config::DeviceSettings;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub distribution: Arc<DistributionService>,
    pub responses: Arc<ResponseService>,
    pub feedback: Arc<FeedbackService>,
    pub materials: Arc<MaterialService>,
    pub questions: Arc<QuestionService>,
    pub sessions: Arc<SessionService>,
    pub control: Arc<DeviceControlService>,
    /// Handed to every tablet by `GET /config/{deviceId}`.
    pub device_settings: Arc<DeviceSettings>,
}
