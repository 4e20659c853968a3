//! Application layer: the services that enforce the classroom rules.
//!
//! # What lives here (for beginners)
//!
//! Every service owns one group of business rules and talks to storage only
//! through the traits in [`repositories`].  Nothing in this layer opens a
//! socket or touches the file system, so each service can be tested with
//! in-memory or mocked repositories.
//!
//! # Sub-modules
//!
//! - **`device_registry`** – Which tablets are paired.  Registration is an
//!   atomic check-and-set and publishes `DevicePaired` once.
//! - **`distribution`** – Material assignments per tablet and fail-closed
//!   bundle assembly.
//! - **`control`** – Lock, unlock and config-refresh commands for paired
//!   tablets.
//! - **`materials`** – Material validation and the delete cascade.
//! - **`sessions`** – The session state machine and its end-time rule.
//! - **`questions`** / **`responses`** – Cross-entity compatibility checks
//!   between materials, questions and student answers.
//! - **`feedback`** – Manual feedback, refused for auto-graded questions.
//! - **`error`** – The [`ServiceError`] taxonomy every service returns.

pub mod control;
pub mod device_registry;
pub mod distribution;
pub mod error;
pub mod feedback;
pub mod materials;
pub mod questions;
pub mod repositories;
pub mod responses;
pub mod sessions;

pub use control::{ControlChannel, DeviceControlService};
pub use device_registry::DeviceRegistry;
pub use distribution::{DeliveryTracker, DistributionBundle, DistributionService};
pub use error::{ServiceError, ServiceResult, StorageError};
pub use feedback::FeedbackService;
pub use materials::MaterialService;
pub use questions::QuestionService;
pub use responses::ResponseService;
pub use sessions::SessionService;
