//! In-memory repositories backed by `DashMap`.
//!
//! Each repository is a sharded concurrent map keyed by entity id.  Nothing is
//! persisted across restarts; a durable backend plugs in by implementing the
//! same traits from `application::repositories`.

use async_trait::async_trait;
use classroom_core::{Feedback, Material, PairedDevice, Question, Response, Session};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::application::error::StorageError;
use crate::application::repositories::{
    DeviceRepository, FeedbackRepository, MaterialRepository, QuestionRepository,
    ResponseRepository, SessionRepository,
};

// ── Devices ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryDeviceRepository {
    devices: DashMap<Uuid, PairedDevice>,
}

impl MemoryDeviceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[async_trait]
impl DeviceRepository for MemoryDeviceRepository {
    async fn insert_if_absent(&self, device: PairedDevice) -> Result<bool, StorageError> {
        // The entry guard holds the shard's write lock, which makes the
        // check and the insert one step.
        match self.devices.entry(device.device_id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(device);
                Ok(true)
            }
        }
    }

    async fn contains(&self, device_id: Uuid) -> Result<bool, StorageError> {
        Ok(self.devices.contains_key(&device_id))
    }

    async fn list(&self) -> Result<Vec<PairedDevice>, StorageError> {
        Ok(self.devices.iter().map(|e| e.value().clone()).collect())
    }
}

// ── Materials ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryMaterialRepository {
    materials: DashMap<Uuid, Material>,
}

impl MemoryMaterialRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MaterialRepository for MemoryMaterialRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Material>, StorageError> {
        Ok(self.materials.get(&id).map(|e| e.value().clone()))
    }

    async fn save(&self, material: Material) -> Result<(), StorageError> {
        self.materials.insert(material.id, material);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
        Ok(self.materials.remove(&id).is_some())
    }
}

// ── Questions ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryQuestionRepository {
    questions: DashMap<Uuid, Question>,
}

impl MemoryQuestionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionRepository for MemoryQuestionRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Question>, StorageError> {
        Ok(self.questions.get(&id).map(|e| e.value().clone()))
    }

    async fn save(&self, question: Question) -> Result<(), StorageError> {
        self.questions.insert(question.id, question);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
        Ok(self.questions.remove(&id).is_some())
    }

    async fn by_material(&self, material_id: Uuid) -> Result<Vec<Question>, StorageError> {
        let mut found: Vec<Question> = self
            .questions
            .iter()
            .filter(|e| e.value().material_id == material_id)
            .map(|e| e.value().clone())
            .collect();
        // Map iteration order is arbitrary; keep bundles stable for tablets.
        found.sort_by(|a, b| a.text.cmp(&b.text).then(a.id.cmp(&b.id)));
        Ok(found)
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryResponseRepository {
    responses: DashMap<Uuid, Response>,
}

impl MemoryResponseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

#[async_trait]
impl ResponseRepository for MemoryResponseRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Response>, StorageError> {
        Ok(self.responses.get(&id).map(|e| e.value().clone()))
    }

    async fn save(&self, response: Response) -> Result<(), StorageError> {
        self.responses.insert(response.id, response);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
        Ok(self.responses.remove(&id).is_some())
    }

    async fn delete_by_question(&self, question_id: Uuid) -> Result<usize, StorageError> {
        let before = self.responses.len();
        self.responses.retain(|_, r| r.question_id != question_id);
        Ok(before.saturating_sub(self.responses.len()))
    }
}

// ── Feedback ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryFeedbackRepository {
    feedback: DashMap<Uuid, Feedback>,
}

impl MemoryFeedbackRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackRepository for MemoryFeedbackRepository {
    async fn save(&self, feedback: Feedback) -> Result<(), StorageError> {
        self.feedback.insert(feedback.id, feedback);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Feedback>, StorageError> {
        Ok(self.feedback.iter().map(|e| e.value().clone()).collect())
    }

    async fn delete_by_response(&self, response_id: Uuid) -> Result<usize, StorageError> {
        let before = self.feedback.len();
        self.feedback.retain(|_, f| f.response_id != response_id);
        Ok(before.saturating_sub(self.feedback.len()))
    }
}

// ── Sessions ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemorySessionRepository {
    sessions: DashMap<Uuid, Session>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Session>, StorageError> {
        Ok(self.sessions.get(&id).map(|e| e.value().clone()))
    }

    async fn save(&self, session: Session) -> Result<(), StorageError> {
        self.sessions.insert(session.id, session);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
        Ok(self.sessions.remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<Session>, StorageError> {
        Ok(self.sessions.iter().map(|e| e.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_insert_if_absent_accepts_only_the_first_insert() {
        let repo = MemoryDeviceRepository::new();
        let id = Uuid::new_v4();

        assert!(repo.insert_if_absent(PairedDevice::new(id)).await.unwrap());
        assert!(!repo.insert_if_absent(PairedDevice::new(id)).await.unwrap());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_insert_if_absent_has_single_winner() {
        // Arrange
        let repo = Arc::new(MemoryDeviceRepository::new());
        let id = Uuid::new_v4();

        // Act: 32 tasks race to insert the same id
        let mut handles = Vec::new();
        for _ in 0..32 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.insert_if_absent(PairedDevice::new(id)).await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        // Assert
        assert_eq!(winners, 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_question_leaves_other_responses() {
        use classroom_core::ResponseAnswer;

        let repo = MemoryResponseRepository::new();
        let q1 = Uuid::new_v4();
        let q2 = Uuid::new_v4();
        let device = Uuid::new_v4();
        for q in [q1, q1, q2] {
            repo.save(Response::new(q, device, ResponseAnswer::TrueFalse { answer: true }))
                .await
                .unwrap();
        }

        let removed = repo.delete_by_question(q1).await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(repo.len(), 1);
    }
}
