//! Student responses to questions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::question::QuestionVariant;

/// The answer a student gave, shaped like the question it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "responseType")]
pub enum ResponseAnswer {
    /// Index into the question's options.  Signed so that an out-of-range
    /// negative index from a tablet can be represented and rejected.
    #[serde(rename_all = "camelCase")]
    MultipleChoice { answer_index: i64 },
    TrueFalse { answer: bool },
    WrittenAnswer { answer: String },
}

/// A response submitted by a tablet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: Uuid,
    pub question_id: Uuid,
    pub device_id: Uuid,
    #[serde(flatten)]
    pub answer: ResponseAnswer,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

impl Response {
    /// Creates a response with a fresh id, stamped now.
    pub fn new(question_id: Uuid, device_id: Uuid, answer: ResponseAnswer) -> Self {
        Self {
            id: Uuid::new_v4(),
            question_id,
            device_id,
            answer,
            timestamp: Utc::now(),
            is_correct: None,
        }
    }

    pub fn variant(&self) -> QuestionVariant {
        match self.answer {
            ResponseAnswer::MultipleChoice { .. } => QuestionVariant::MultipleChoice,
            ResponseAnswer::TrueFalse { .. } => QuestionVariant::TrueFalse,
            ResponseAnswer::WrittenAnswer { .. } => QuestionVariant::WrittenAnswer,
        }
    }
}
