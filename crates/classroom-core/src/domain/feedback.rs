//! Teacher feedback on a single response.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-text feedback and/or marks for one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub response_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<i32>,
}

impl Feedback {
    pub fn new(response_id: Uuid, text: Option<String>, marks: Option<i32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            response_id,
            text,
            marks,
        }
    }

    /// True when the feedback carries non-blank text or a mark.
    pub fn has_content(&self) -> bool {
        let has_text = self
            .text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty());
        has_text || self.marks.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_content_false_for_blank_text_and_no_marks() {
        let fb = Feedback::new(Uuid::new_v4(), Some("  ".to_string()), None);
        assert!(!fb.has_content());
    }

    #[test]
    fn test_has_content_true_for_marks_only() {
        let fb = Feedback::new(Uuid::new_v4(), None, Some(0));
        assert!(fb.has_content());
    }
}
