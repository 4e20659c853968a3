//! Lesson material.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of material, which decides what questions it may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialType {
    /// Plain reading; carries no questions.
    Reading,
    /// Any question kind.
    Worksheet,
    /// Closed questions only; written answers are not allowed.
    Poll,
}

impl std::fmt::Display for MaterialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MaterialType::Reading => "Reading",
            MaterialType::Worksheet => "Worksheet",
            MaterialType::Poll => "Poll",
        };
        f.write_str(name)
    }
}

/// A piece of material owned by a lesson.
///
/// The lesson and unit hierarchy above it is managed elsewhere; only the
/// owning `lesson_id` is kept here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub material_type: MaterialType,
    pub title: String,
    pub content: String,
}

impl Material {
    pub fn new(
        lesson_id: Uuid,
        material_type: MaterialType,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            lesson_id,
            material_type,
            title: title.into(),
            content: content.into(),
        }
    }
}
