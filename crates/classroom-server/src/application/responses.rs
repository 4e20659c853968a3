//! ResponseService: accepting student answers.
//!
//! # Compatibility rules (for beginners)
//!
//! A response is only meaningful against the question it answers:
//!
//! - The response variant must equal the question variant.  A true/false
//!   answer to a multiple choice question is rejected, as are the other five
//!   mismatched pairs.
//! - A multiple choice answer index must point at one of the options, so it
//!   must lie in `0..options.len()`.  Negative indices arrive as `i64` from the
//!   wire and are rejected here rather than at parse time.
//!
//! Batch submission is all-or-nothing: every item is checked before the first
//! one is written.

use std::sync::Arc;

use classroom_core::{Question, QuestionKind, Response, ResponseAnswer};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::repositories::{FeedbackRepository, QuestionRepository, ResponseRepository};

pub struct ResponseService {
    responses: Arc<dyn ResponseRepository>,
    questions: Arc<dyn QuestionRepository>,
    feedback: Arc<dyn FeedbackRepository>,
}

impl ResponseService {
    pub fn new(
        responses: Arc<dyn ResponseRepository>,
        questions: Arc<dyn QuestionRepository>,
        feedback: Arc<dyn FeedbackRepository>,
    ) -> Self {
        Self {
            responses,
            questions,
            feedback,
        }
    }

    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the question does not exist.
    /// - [`ServiceError::Validation`] on a variant mismatch or an out-of-range
    ///   answer index.
    pub async fn create_response(&self, response: Response) -> ServiceResult<Response> {
        self.validate(&response).await?;
        self.responses.save(response.clone()).await?;
        debug!(response_id = %response.id, device_id = %response.device_id, "response stored");
        Ok(response)
    }

    /// # Errors
    ///
    /// As [`Self::create_response`], plus [`ServiceError::NotFound`] if the
    /// response does not exist yet.
    pub async fn update_response(&self, response: Response) -> ServiceResult<Response> {
        if self.responses.get(response.id).await?.is_none() {
            return Err(ServiceError::not_found("Response", response.id));
        }
        self.validate(&response).await?;
        self.responses.save(response.clone()).await?;
        Ok(response)
    }

    /// Validates every response, then persists them all.
    ///
    /// # Errors
    ///
    /// Returns the first failure, prefixed with the offending item's index.
    /// Nothing is written when any item fails.
    pub async fn create_responses(&self, responses: Vec<Response>) -> ServiceResult<usize> {
        if responses.is_empty() {
            return Err(ServiceError::validation("responses must not be empty"));
        }
        for (index, response) in responses.iter().enumerate() {
            self.validate(response)
                .await
                .map_err(|e| prefix_error(index, e))?;
        }

        let count = responses.len();
        for response in responses {
            self.responses.save(response).await?;
        }
        info!(count, "response batch stored");
        Ok(count)
    }

    pub async fn get_response(&self, id: Uuid) -> ServiceResult<Option<Response>> {
        Ok(self.responses.get(id).await?)
    }

    /// Looks up the question a submitted answer refers to, so the HTTP layer
    /// can interpret the raw answer text by variant.
    pub async fn question_for(&self, question_id: Uuid) -> ServiceResult<Option<Question>> {
        Ok(self.questions.get(question_id).await?)
    }

    /// Deletes the response's feedback, then the response.
    pub async fn delete_response(&self, id: Uuid) -> ServiceResult<bool> {
        self.feedback.delete_by_response(id).await?;
        Ok(self.responses.delete(id).await?)
    }

    async fn validate(&self, response: &Response) -> ServiceResult<()> {
        let question = self
            .questions
            .get(response.question_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Question", response.question_id))?;
        check_compatible(&question, response)
    }
}

/// Checks `response` against the question it answers.
///
/// # Errors
///
/// Returns [`ServiceError::Validation`] on a variant mismatch or an
/// out-of-range multiple choice index.
pub fn check_compatible(question: &Question, response: &Response) -> ServiceResult<()> {
    match (&question.kind, &response.answer) {
        (QuestionKind::MultipleChoice { options, .. }, ResponseAnswer::MultipleChoice { answer_index }) => {
            let len = options.len();
            let in_range = usize::try_from(*answer_index).is_ok_and(|i| i < len);
            if in_range {
                Ok(())
            } else {
                Err(ServiceError::Validation(format!(
                    "Answer index {answer_index} is out of range; valid range is 0 to {}",
                    len.saturating_sub(1)
                )))
            }
        }
        (QuestionKind::TrueFalse { .. }, ResponseAnswer::TrueFalse { .. })
        | (QuestionKind::WrittenAnswer { .. }, ResponseAnswer::WrittenAnswer { .. }) => Ok(()),
        _ => Err(ServiceError::Validation(format!(
            "Response type {} does not match question type {}",
            response.variant(),
            question.variant()
        ))),
    }
}

fn prefix_error(index: usize, error: ServiceError) -> ServiceError {
    match error {
        ServiceError::Validation(msg) => ServiceError::Validation(format!("responses[{index}]: {msg}")),
        ServiceError::NotFound(msg) => ServiceError::NotFound(format!("responses[{index}]: {msg}")),
        other => other,
    }
}
