//! Questions attached to a piece of material.
//!
//! # One type, three shapes (for beginners)
//!
//! A question is either multiple choice, true/false, or a written answer.
//! Rather than a class hierarchy, [`QuestionKind`] is an enum whose variants
//! carry exactly the fields that shape needs.  Any rule that depends on the
//! shape is a `match`, so the compiler points at every place that must change
//! when a new shape is added.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Field-free tag naming the shape of a question or response.
///
/// Responses use the same tag: a response is compatible with a question
/// exactly when their variants are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionVariant {
    MultipleChoice,
    TrueFalse,
    WrittenAnswer,
}

impl std::fmt::Display for QuestionVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QuestionVariant::MultipleChoice => "MultipleChoice",
            QuestionVariant::TrueFalse => "TrueFalse",
            QuestionVariant::WrittenAnswer => "WrittenAnswer",
        };
        f.write_str(name)
    }
}

/// Shape-specific data of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "questionType")]
pub enum QuestionKind {
    #[serde(rename_all = "camelCase")]
    MultipleChoice {
        options: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correct_index: Option<usize>,
    },
    #[serde(rename_all = "camelCase")]
    TrueFalse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correct_value: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    WrittenAnswer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correct_answer: Option<String>,
    },
}

/// Errors found by looking at a question on its own.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question text must not be blank")]
    BlankText,

    #[error("multiple choice questions need at least one option")]
    NoOptions,

    #[error("correct answer index {index} is out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },
}

/// A question belonging to exactly one material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub material_id: Uuid,
    pub text: String,
    /// Upper bound for manually awarded marks; `None` means marks are not used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<u32>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    /// Creates a question with a fresh id and no maximum score.
    pub fn new(material_id: Uuid, text: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            material_id,
            text: text.into(),
            max_score: None,
            kind,
        }
    }

    /// Returns a copy with `max_score` set.
    pub fn with_max_score(mut self, max_score: u32) -> Self {
        self.max_score = Some(max_score);
        self
    }

    pub fn variant(&self) -> QuestionVariant {
        match self.kind {
            QuestionKind::MultipleChoice { .. } => QuestionVariant::MultipleChoice,
            QuestionKind::TrueFalse { .. } => QuestionVariant::TrueFalse,
            QuestionKind::WrittenAnswer { .. } => QuestionVariant::WrittenAnswer,
        }
    }

    /// Number of options for a multiple choice question, `None` otherwise.
    pub fn option_count(&self) -> Option<usize> {
        match &self.kind {
            QuestionKind::MultipleChoice { options, .. } => Some(options.len()),
            _ => None,
        }
    }

    /// Whether responses to this question are graded automatically, in which
    /// case manual feedback is not accepted.
    ///
    /// Multiple choice and written answer questions count as auto-graded by
    /// shape, even when their correct answer is unset.  True/false questions
    /// never do, so a teacher can always comment on them.
    pub fn is_auto_graded(&self) -> bool {
        match &self.kind {
            QuestionKind::MultipleChoice { .. } => true,
            QuestionKind::WrittenAnswer { .. } => true,
            QuestionKind::TrueFalse { .. } => false,
        }
    }

    /// Checks the rules that need nothing but the question itself.
    ///
    /// # Errors
    ///
    /// Returns [`QuestionError`] for blank text, a multiple choice question
    /// with no options, or a correct index past the last option.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.text.trim().is_empty() {
            return Err(QuestionError::BlankText);
        }
        if let QuestionKind::MultipleChoice {
            options,
            correct_index,
        } = &self.kind
        {
            if options.is_empty() {
                return Err(QuestionError::NoOptions);
            }
            if let Some(index) = *correct_index {
                if index >= options.len() {
                    return Err(QuestionError::CorrectIndexOutOfRange {
                        index,
                        len: options.len(),
                    });
                }
            }
        }
        Ok(())
    }
}
