//! Storage collaborator traits.
//!
//! The services in this layer depend only on these traits.  Production wiring
//! passes the in-memory implementations from
//! `infrastructure::storage::memory`; unit tests use the `mockall` mocks
//! generated below.
//!
//! Cascading deletes of parent entities (lesson → material and so on) are the
//! storage layer's job.  The one ordering this crate owns is question →
//! responses, see [`crate::application::questions::QuestionService`].

use async_trait::async_trait;
use classroom_core::{Feedback, Material, PairedDevice, Question, Response, Session};
use uuid::Uuid;

use super::error::StorageError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Inserts `device` unless its id is already present.
    ///
    /// Must be an atomic check-and-set: of any number of concurrent calls for
    /// the same id, exactly one returns `Ok(true)`.
    async fn insert_if_absent(&self, device: PairedDevice) -> Result<bool, StorageError>;
    async fn contains(&self, device_id: Uuid) -> Result<bool, StorageError>;
    async fn list(&self) -> Result<Vec<PairedDevice>, StorageError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MaterialRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Material>, StorageError>;
    async fn save(&self, material: Material) -> Result<(), StorageError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StorageError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Question>, StorageError>;
    async fn save(&self, question: Question) -> Result<(), StorageError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StorageError>;
    async fn by_material(&self, material_id: Uuid) -> Result<Vec<Question>, StorageError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResponseRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Response>, StorageError>;
    async fn save(&self, response: Response) -> Result<(), StorageError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StorageError>;
    /// Removes every response to `question_id`, returning how many went.
    async fn delete_by_question(&self, question_id: Uuid) -> Result<usize, StorageError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn save(&self, feedback: Feedback) -> Result<(), StorageError>;
    async fn list(&self) -> Result<Vec<Feedback>, StorageError>;
    async fn delete_by_response(&self, response_id: Uuid) -> Result<usize, StorageError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Session>, StorageError>;
    async fn save(&self, session: Session) -> Result<(), StorageError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StorageError>;
    async fn list(&self) -> Result<Vec<Session>, StorageError>;
}
