//! DistributionService: which material each tablet should receive.
//!
//! # Assignment and bundles (for beginners)
//!
//! The teacher assigns materials to a tablet; the service remembers the set
//! of material ids per device.  When the tablet asks for its content the
//! service assembles a *bundle*: every assigned material plus all questions
//! belonging to those materials.
//!
//! Bundle assembly is fail-closed.  If any assigned material cannot be found,
//! the tablet gets no bundle at all instead of a partial one that would refer
//! to ids it can never resolve.
//!
//! # Delivery tracking
//!
//! When an assignment adds at least one new id, the service tells its
//! [`DeliveryTracker`] so the protocol layer can start a delivery deadline and
//! notify the tablet.  Fetches that count as an acknowledgement are forwarded
//! to the same tracker via [`DistributionService::acknowledge_delivery`].

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use classroom_core::{Material, Question};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::device_registry::DeviceRegistry;
use super::error::{ServiceError, ServiceResult};
use super::repositories::{MaterialRepository, QuestionRepository};

/// Receives notice of new assignments and of acknowledged deliveries.
///
/// Both calls are made from request-handling contexts and must not block.
pub trait DeliveryTracker: Send + Sync {
    /// At least one material was newly assigned to `device_id`.
    fn materials_assigned(&self, device_id: Uuid);

    /// `device_id` fetched its configuration or bundle.
    fn delivery_acknowledged(&self, device_id: Uuid);
}

/// Everything a tablet needs to run its assigned material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionBundle {
    pub materials: Vec<Material>,
    pub questions: Vec<Question>,
}

pub struct DistributionService {
    registry: Arc<DeviceRegistry>,
    materials: Arc<dyn MaterialRepository>,
    questions: Arc<dyn QuestionRepository>,
    /// Never held across an `.await`.
    assignments: Mutex<HashMap<Uuid, BTreeSet<Uuid>>>,
    tracker: Option<Arc<dyn DeliveryTracker>>,
}

impl DistributionService {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        materials: Arc<dyn MaterialRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            registry,
            materials,
            questions,
            assignments: Mutex::new(HashMap::new()),
            tracker: None,
        }
    }

    /// Attaches the tracker notified about assignments and acknowledgements.
    pub fn with_tracker(mut self, tracker: Arc<dyn DeliveryTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Unions `material_ids` into the device's assignment set and returns how
    /// many ids were new.
    ///
    /// `None` models a request that omitted the list entirely; an empty list
    /// is a valid no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] when `material_ids` is `None`.
    pub fn assign_materials(
        &self,
        device_id: Uuid,
        material_ids: Option<Vec<Uuid>>,
    ) -> ServiceResult<usize> {
        let material_ids =
            material_ids.ok_or_else(|| ServiceError::validation("materialIds is required"))?;

        let added = {
            let mut assignments = self.lock_assignments();
            let set = assignments.entry(device_id).or_default();
            material_ids.into_iter().filter(|id| set.insert(*id)).count()
        };

        if added > 0 {
            info!(%device_id, added, "materials assigned");
            if let Some(tracker) = &self.tracker {
                tracker.materials_assigned(device_id);
            }
        }
        Ok(added)
    }

    /// Snapshot of the ids currently assigned to `device_id`.
    pub fn assigned_materials(&self, device_id: Uuid) -> Vec<Uuid> {
        self.lock_assignments()
            .get(&device_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn clear_assignments(&self, device_id: Uuid) {
        if let Some(set) = self.lock_assignments().get_mut(&device_id) {
            set.clear();
        }
        debug!(%device_id, "assignments cleared");
    }

    /// Forwards a delivery acknowledgement to the tracker, if any.
    pub fn acknowledge_delivery(&self, device_id: Uuid) {
        if let Some(tracker) = &self.tracker {
            tracker.delivery_acknowledged(device_id);
        }
    }

    /// Assembles the bundle for `device_id`.
    ///
    /// Returns `Ok(None)` when the device is not paired, has nothing assigned,
    /// or any assigned material cannot be resolved.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Storage`] if a repository fails.
    pub async fn get_distribution_bundle(
        &self,
        device_id: Uuid,
    ) -> ServiceResult<Option<DistributionBundle>> {
        if !self.registry.is_device_paired(device_id).await? {
            debug!(%device_id, "bundle requested by unpaired device");
            return Ok(None);
        }

        let assigned = self.assigned_materials(device_id);
        if assigned.is_empty() {
            return Ok(None);
        }

        let mut materials = Vec::with_capacity(assigned.len());
        for material_id in &assigned {
            match self.materials.get(*material_id).await? {
                Some(material) => materials.push(material),
                None => {
                    warn!(%device_id, %material_id, "assigned material missing; bundle unavailable");
                    return Ok(None);
                }
            }
        }

        let mut questions = Vec::new();
        for material in &materials {
            questions.extend(self.questions.by_material(material.id).await?);
        }

        // A material deleted while questions were loading would leave the
        // bundle pointing at a dangling id.
        for material_id in &assigned {
            if self.materials.get(*material_id).await?.is_none() {
                warn!(%device_id, %material_id, "material removed during assembly; bundle unavailable");
                return Ok(None);
            }
        }

        Ok(Some(DistributionBundle {
            materials,
            questions,
        }))
    }

    fn lock_assignments(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, BTreeSet<Uuid>>> {
        self.assignments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repositories::{MockMaterialRepository, MockQuestionRepository};
    use crate::infrastructure::storage::memory::{
        MemoryDeviceRepository, MemoryMaterialRepository, MemoryQuestionRepository,
    };
    use classroom_core::{MaterialType, QuestionKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ── Test doubles ──────────────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingTracker {
        assigned: Mutex<Vec<Uuid>>,
        acknowledged: Mutex<Vec<Uuid>>,
    }

    impl DeliveryTracker for RecordingTracker {
        fn materials_assigned(&self, device_id: Uuid) {
            self.assigned.lock().unwrap().push(device_id);
        }

        fn delivery_acknowledged(&self, device_id: Uuid) {
            self.acknowledged.lock().unwrap().push(device_id);
        }
    }

    struct Fixture {
        service: DistributionService,
        registry: Arc<DeviceRegistry>,
        materials: Arc<MemoryMaterialRepository>,
        questions: Arc<MemoryQuestionRepository>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(DeviceRegistry::new(Arc::new(MemoryDeviceRepository::new())));
        let materials = Arc::new(MemoryMaterialRepository::new());
        let questions = Arc::new(MemoryQuestionRepository::new());
        let service =
            DistributionService::new(Arc::clone(&registry), materials.clone(), questions.clone());
        Fixture {
            service,
            registry,
            materials,
            questions,
        }
    }

    async fn add_material(fx: &Fixture, title: &str) -> Material {
        let m = Material::new(Uuid::new_v4(), MaterialType::Worksheet, title, "content");
        fx.materials.save(m.clone()).await.unwrap();
        m
    }

    async fn add_question(fx: &Fixture, material: &Material, text: &str) -> Question {
        let q = Question::new(
            material.id,
            text,
            QuestionKind::TrueFalse {
                correct_value: None,
            },
        );
        fx.questions.save(q.clone()).await.unwrap();
        q
    }

    // ── Assignment ────────────────────────────────────────────────────────────

    #[test]
    fn test_assign_without_list_is_rejected() {
        let fx = fixture();
        let result = fx.service.assign_materials(Uuid::new_v4(), None);
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_assign_unions_ids() {
        // Arrange
        let fx = fixture();
        let device = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        // Act
        let first = fx.service.assign_materials(device, Some(vec![a])).unwrap();
        let second = fx.service.assign_materials(device, Some(vec![a, b])).unwrap();

        // Assert
        assert_eq!((first, second), (1, 1));
        let mut assigned = fx.service.assigned_materials(device);
        assigned.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(assigned, expected);
    }

    #[test]
    fn test_tracker_notified_only_when_something_new_is_assigned() {
        let tracker = Arc::new(RecordingTracker::default());
        let fx = fixture();
        let service = DistributionService {
            tracker: Some(tracker.clone()),
            ..fx.service
        };
        let device = Uuid::new_v4();
        let id = Uuid::new_v4();

        service.assign_materials(device, Some(vec![id])).unwrap();
        service.assign_materials(device, Some(vec![id])).unwrap();
        service.assign_materials(device, Some(vec![])).unwrap();

        assert_eq!(*tracker.assigned.lock().unwrap(), vec![device]);
    }

    #[test]
    fn test_acknowledge_delivery_reaches_tracker() {
        let tracker = Arc::new(RecordingTracker::default());
        let fx = fixture();
        let service = fx.service.with_tracker(tracker.clone());
        let device = Uuid::new_v4();

        service.acknowledge_delivery(device);

        assert_eq!(*tracker.acknowledged.lock().unwrap(), vec![device]);
    }

    #[test]
    fn test_clear_assignments_empties_set() {
        let fx = fixture();
        let device = Uuid::new_v4();
        fx.service
            .assign_materials(device, Some(vec![Uuid::new_v4()]))
            .unwrap();

        fx.service.clear_assignments(device);

        assert!(fx.service.assigned_materials(device).is_empty());
    }

    // ── Bundles ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_bundle_contains_materials_and_their_questions() {
        // Arrange
        let fx = fixture();
        let device = Uuid::new_v4();
        fx.registry.register_device(device).await.unwrap();
        let m1 = add_material(&fx, "M1").await;
        let q1 = add_question(&fx, &m1, "Q1").await;
        let q2 = add_question(&fx, &m1, "Q2").await;
        fx.service.assign_materials(device, Some(vec![m1.id])).unwrap();

        // Act
        let bundle = fx.service.get_distribution_bundle(device).await.unwrap();

        // Assert
        let bundle = bundle.expect("bundle must be available");
        assert_eq!(bundle.materials, vec![m1]);
        assert_eq!(bundle.questions, vec![q1, q2]);
    }

    #[tokio::test]
    async fn test_bundle_none_for_unpaired_device() {
        let fx = fixture();
        let device = Uuid::new_v4();
        let m = add_material(&fx, "M").await;
        fx.service.assign_materials(device, Some(vec![m.id])).unwrap();

        assert!(fx.service.get_distribution_bundle(device).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bundle_none_without_assignments() {
        let fx = fixture();
        let device = Uuid::new_v4();
        fx.registry.register_device(device).await.unwrap();

        assert!(fx.service.get_distribution_bundle(device).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bundle_fails_closed_when_one_material_is_missing() {
        // Arrange: assign {A, B}, then make B unresolvable
        let fx = fixture();
        let device = Uuid::new_v4();
        fx.registry.register_device(device).await.unwrap();
        let a = add_material(&fx, "A").await;
        let b = add_material(&fx, "B").await;
        fx.service
            .assign_materials(device, Some(vec![a.id, b.id]))
            .unwrap();
        fx.materials.delete(b.id).await.unwrap();

        // Act
        let bundle = fx.service.get_distribution_bundle(device).await.unwrap();

        // Assert: not {materials: [A]}
        assert!(bundle.is_none());
    }

    #[tokio::test]
    async fn test_bundle_fails_closed_when_material_disappears_mid_assembly() {
        // Arrange: the material resolves on the first lookup only
        let registry = Arc::new(DeviceRegistry::new(Arc::new(MemoryDeviceRepository::new())));
        let device = Uuid::new_v4();
        registry.register_device(device).await.unwrap();
        let material = Material::new(Uuid::new_v4(), MaterialType::Poll, "Vote", "");
        let material_id = material.id;

        let lookups = Arc::new(AtomicUsize::new(0));
        let mut materials = MockMaterialRepository::new();
        {
            let lookups = Arc::clone(&lookups);
            materials.expect_get().returning(move |_| {
                if lookups.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(Some(material.clone()))
                } else {
                    Ok(None)
                }
            });
        }
        let mut questions = MockQuestionRepository::new();
        questions.expect_by_material().returning(|_| Ok(Vec::new()));

        let service = DistributionService::new(registry, Arc::new(materials), Arc::new(questions));
        service
            .assign_materials(device, Some(vec![material_id]))
            .unwrap();

        // Act
        let bundle = service.get_distribution_bundle(device).await.unwrap();

        // Assert
        assert!(bundle.is_none());
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }
}
