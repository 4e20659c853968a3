//! MaterialService: creating, editing and removing lesson material.
//!
//! A material needs a non-blank title and non-blank content.  Deleting a
//! material takes its questions (and their responses) with it, questions
//! first, so nothing is left pointing at a material that no longer exists.

use std::sync::Arc;

use classroom_core::Material;
use tracing::info;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::repositories::{MaterialRepository, QuestionRepository, ResponseRepository};

pub struct MaterialService {
    materials: Arc<dyn MaterialRepository>,
    questions: Arc<dyn QuestionRepository>,
    responses: Arc<dyn ResponseRepository>,
}

impl MaterialService {
    pub fn new(
        materials: Arc<dyn MaterialRepository>,
        questions: Arc<dyn QuestionRepository>,
        responses: Arc<dyn ResponseRepository>,
    ) -> Self {
        Self {
            materials,
            questions,
            responses,
        }
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for a blank title or content.
    pub async fn create_material(&self, material: Material) -> ServiceResult<Material> {
        validate(&material)?;
        self.materials.save(material.clone()).await?;
        info!(material_id = %material.id, kind = %material.material_type, "material created");
        Ok(material)
    }

    /// # Errors
    ///
    /// - [`ServiceError::Validation`] for a blank title or content.
    /// - [`ServiceError::NotFound`] if the material does not exist yet.
    pub async fn update_material(&self, material: Material) -> ServiceResult<Material> {
        validate(&material)?;
        if self.materials.get(material.id).await?.is_none() {
            return Err(ServiceError::not_found("Material", material.id));
        }
        self.materials.save(material.clone()).await?;
        Ok(material)
    }

    pub async fn get_material(&self, id: Uuid) -> ServiceResult<Option<Material>> {
        Ok(self.materials.get(id).await?)
    }

    /// Removes every question on the material (and their responses), then
    /// the material.  Returns whether the material existed.
    pub async fn delete_material(&self, id: Uuid) -> ServiceResult<bool> {
        let questions = self.questions.by_material(id).await?;
        for question in &questions {
            self.responses.delete_by_question(question.id).await?;
            self.questions.delete(question.id).await?;
        }
        let removed = self.materials.delete(id).await?;
        info!(material_id = %id, questions_removed = questions.len(), "material deleted");
        Ok(removed)
    }
}

fn validate(material: &Material) -> ServiceResult<()> {
    if material.title.trim().is_empty() {
        return Err(ServiceError::validation("Material title cannot be empty"));
    }
    if material.content.trim().is_empty() {
        return Err(ServiceError::validation("Material content cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::memory::{
        MemoryMaterialRepository, MemoryQuestionRepository, MemoryResponseRepository,
    };
    use classroom_core::{MaterialType, Question, QuestionKind, Response, ResponseAnswer};

    struct Fixture {
        service: MaterialService,
        questions: Arc<MemoryQuestionRepository>,
        responses: Arc<MemoryResponseRepository>,
    }

    fn fixture() -> Fixture {
        let questions = Arc::new(MemoryQuestionRepository::new());
        let responses = Arc::new(MemoryResponseRepository::new());
        Fixture {
            service: MaterialService::new(
                Arc::new(MemoryMaterialRepository::new()),
                questions.clone(),
                responses.clone(),
            ),
            questions,
            responses,
        }
    }

    fn worksheet() -> Material {
        Material::new(Uuid::new_v4(), MaterialType::Worksheet, "Fractions", "Halves and quarters")
    }

    #[tokio::test]
    async fn test_created_material_can_be_read_back() {
        let fx = fixture();

        let created = fx.service.create_material(worksheet()).await.unwrap();

        assert_eq!(fx.service.get_material(created.id).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_blank_title_or_content_is_rejected() {
        let fx = fixture();
        let mut untitled = worksheet();
        untitled.title = " ".into();
        let mut empty = worksheet();
        empty.content = String::new();

        assert!(matches!(
            fx.service.create_material(untitled).await,
            Err(ServiceError::Validation(msg)) if msg.contains("title")
        ));
        assert!(matches!(
            fx.service.create_material(empty).await,
            Err(ServiceError::Validation(msg)) if msg.contains("content")
        ));
    }

    #[tokio::test]
    async fn test_update_of_unknown_material_is_not_found() {
        let fx = fixture();
        let result = fx.service.update_material(worksheet()).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_takes_questions_and_responses_with_it() {
        // Arrange
        let fx = fixture();
        let material = fx.service.create_material(worksheet()).await.unwrap();
        let question = Question::new(
            material.id,
            "Half of 4?",
            QuestionKind::WrittenAnswer {
                correct_answer: None,
            },
        );
        let response = Response::new(
            question.id,
            Uuid::new_v4(),
            ResponseAnswer::WrittenAnswer { answer: "2".into() },
        );
        fx.questions.save(question.clone()).await.unwrap();
        fx.responses.save(response.clone()).await.unwrap();

        // Act
        let removed = fx.service.delete_material(material.id).await.unwrap();

        // Assert
        assert!(removed);
        assert_eq!(fx.service.get_material(material.id).await.unwrap(), None);
        assert_eq!(fx.questions.get(question.id).await.unwrap(), None);
        assert_eq!(fx.responses.get(response.id).await.unwrap(), None);
    }
}
