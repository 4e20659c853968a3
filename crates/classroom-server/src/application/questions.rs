//! QuestionService: attaching questions to material.
//!
//! Rules, checked in this order:
//!
//! 1. The question itself is well formed (non-blank text, multiple choice
//!    options present, correct index in range).
//! 2. The owning material exists.
//! 3. Reading material holds no questions at all.
//! 4. Poll material holds no written-answer questions.
//!
//! Deleting a question removes its responses first and the question second.
//! That order belongs to this service and is not left to a storage cascade.

use std::sync::Arc;

use classroom_core::{MaterialType, Question, QuestionVariant};
use tracing::info;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::repositories::{MaterialRepository, QuestionRepository, ResponseRepository};

pub struct QuestionService {
    questions: Arc<dyn QuestionRepository>,
    materials: Arc<dyn MaterialRepository>,
    responses: Arc<dyn ResponseRepository>,
}

impl QuestionService {
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        materials: Arc<dyn MaterialRepository>,
        responses: Arc<dyn ResponseRepository>,
    ) -> Self {
        Self {
            questions,
            materials,
            responses,
        }
    }

    /// # Errors
    ///
    /// - [`ServiceError::Validation`] if the question breaks a rule.
    /// - [`ServiceError::NotFound`] if the material does not exist.
    pub async fn create_question(&self, question: Question) -> ServiceResult<Question> {
        self.validate(&question).await?;
        self.questions.save(question.clone()).await?;
        info!(question_id = %question.id, material_id = %question.material_id, "question created");
        Ok(question)
    }

    /// Re-applies every creation rule against the (possibly new) material.
    ///
    /// # Errors
    ///
    /// As [`Self::create_question`], plus [`ServiceError::NotFound`] if the
    /// question does not exist yet.
    pub async fn update_question(&self, question: Question) -> ServiceResult<Question> {
        self.validate(&question).await?;
        if self.questions.get(question.id).await?.is_none() {
            return Err(ServiceError::not_found("Question", question.id));
        }
        self.questions.save(question.clone()).await?;
        Ok(question)
    }

    pub async fn get_question(&self, id: Uuid) -> ServiceResult<Option<Question>> {
        Ok(self.questions.get(id).await?)
    }

    pub async fn questions_for_material(&self, material_id: Uuid) -> ServiceResult<Vec<Question>> {
        Ok(self.questions.by_material(material_id).await?)
    }

    /// Deletes every response to the question, then the question.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Storage`] if either delete fails.  If the
    /// response delete fails the question is left in place.
    pub async fn delete_question(&self, id: Uuid) -> ServiceResult<()> {
        let removed = self.responses.delete_by_question(id).await?;
        self.questions.delete(id).await?;
        info!(question_id = %id, responses_removed = removed, "question deleted");
        Ok(())
    }

    async fn validate(&self, question: &Question) -> ServiceResult<()> {
        question
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let material = self
            .materials
            .get(question.material_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", question.material_id))?;

        match (material.material_type, question.variant()) {
            (MaterialType::Reading, _) => Err(ServiceError::validation(
                "Questions are not allowed on reading material",
            )),
            (MaterialType::Poll, QuestionVariant::WrittenAnswer) => Err(ServiceError::validation(
                "Written questions are not allowed in polls",
            )),
            _ => Ok(()),
        }
    }
}
