//! FeedbackService: teacher feedback on individual responses.
//!
//! Feedback is only accepted where a teacher has to judge the answer by hand.
//! Questions that carry a correct answer are graded automatically and refuse
//! feedback; see [`classroom_core::Question::is_auto_graded`] for exactly which
//! questions count.

use std::sync::Arc;

use classroom_core::Feedback;
use tracing::info;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::repositories::{FeedbackRepository, QuestionRepository, ResponseRepository};

pub struct FeedbackService {
    feedback: Arc<dyn FeedbackRepository>,
    responses: Arc<dyn ResponseRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl FeedbackService {
    pub fn new(
        feedback: Arc<dyn FeedbackRepository>,
        responses: Arc<dyn ResponseRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            feedback,
            responses,
            questions,
        }
    }

    /// Checks and stores `feedback`.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the response or its question is gone.
    ///   This is checked first, even for empty feedback.
    /// - [`ServiceError::Validation`] if the feedback is empty, the question
    ///   is auto-graded, or the marks fall outside `0..=max_score`.
    pub async fn create_feedback(&self, feedback: Feedback) -> ServiceResult<Feedback> {
        let response = self
            .responses
            .get(feedback.response_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Response", feedback.response_id))?;
        let question = self
            .questions
            .get(response.question_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Question", response.question_id))?;

        if !feedback.has_content() {
            return Err(ServiceError::validation(
                "Feedback must carry text or marks",
            ));
        }

        if question.is_auto_graded() {
            return Err(ServiceError::Validation(format!(
                "Feedback cannot be provided for question {}: it has a correct answer and is auto-graded",
                question.id
            )));
        }

        if let Some(marks) = feedback.marks {
            let max_score = question.max_score.ok_or_else(|| {
                ServiceError::validation("Marks given for a question without a maximum score")
            })?;
            if marks < 0 {
                return Err(ServiceError::Validation(format!(
                    "Marks {marks} must not be negative"
                )));
            }
            if i64::from(marks) > i64::from(max_score) {
                return Err(ServiceError::Validation(format!(
                    "Marks {marks} exceed the maximum score {max_score}"
                )));
            }
        }

        self.feedback.save(feedback.clone()).await?;
        info!(feedback_id = %feedback.id, response_id = %feedback.response_id, "feedback stored");
        Ok(feedback)
    }

    /// All feedback on responses submitted by `device_id`.
    pub async fn feedback_for_device(&self, device_id: Uuid) -> ServiceResult<Vec<Feedback>> {
        let mut result = Vec::new();
        for item in self.feedback.list().await? {
            let owned = self
                .responses
                .get(item.response_id)
                .await?
                .is_some_and(|r| r.device_id == device_id);
            if owned {
                result.push(item);
            }
        }
        Ok(result)
    }
}
