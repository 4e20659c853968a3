//! Request and response bodies, and request-shape validation.
//!
//! Tablets send ids, timestamps and answers as strings.  Everything here
//! checks that those strings parse; whether the parsed values make sense
//! together is the services' job.  Teacher requests are typed JSON and are
//! turned straight into domain entities.

use chrono::{DateTime, Utc};
use classroom_core::{
    Feedback, Material, MaterialType, Question, QuestionKind, Response, ResponseAnswer, Session,
    SessionStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ApiError;

// ── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairRequest {
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub material_ids: Option<Vec<Uuid>>,
}

/// One submitted answer, exactly as the tablet sent it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRequest {
    pub id: Option<String>,
    pub question_id: Option<String>,
    pub device_id: Option<String>,
    /// Index, `true`/`false`, or free text depending on the question.
    pub answer: Option<String>,
    /// RFC 3339.
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BatchResponseRequest {
    pub responses: Option<Vec<ResponseRequest>>,
}

/// A response request whose fields have all been parsed, but whose answer
/// has not yet been interpreted against its question.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub id: Uuid,
    pub question_id: Uuid,
    pub device_id: Uuid,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
    pub is_correct: Option<bool>,
}

impl ResponseRequest {
    /// Checks the request shape.  `prefix` names the item inside a batch.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] naming the first missing or
    /// unparsable field.
    pub fn parse(&self, prefix: &str) -> Result<ParsedResponse, ApiError> {
        let id = required_uuid(prefix, "id", self.id.as_deref())?;
        let question_id = required_uuid(prefix, "questionId", self.question_id.as_deref())?;
        let device_id = required_uuid(prefix, "deviceId", self.device_id.as_deref())?;
        let answer = required(prefix, "answer", self.answer.as_deref())?.to_string();
        let timestamp = required(prefix, "timestamp", self.timestamp.as_deref())?;
        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| {
                ApiError::bad_request(format!("{prefix}timestamp must be an RFC 3339 date"))
            })?;

        Ok(ParsedResponse {
            id,
            question_id,
            device_id,
            answer,
            timestamp,
            is_correct: self.is_correct,
        })
    }
}

impl ParsedResponse {
    /// Interprets the raw answer by the question's variant.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] if the answer text does not fit the
    /// question (a non-integer index, or something other than true/false).
    pub fn into_response(self, question: &Question, prefix: &str) -> Result<Response, ApiError> {
        let answer = match &question.kind {
            QuestionKind::MultipleChoice { .. } => {
                let answer_index = self.answer.trim().parse::<i64>().map_err(|_| {
                    ApiError::bad_request(format!(
                        "{prefix}answer must be an option index for a multiple choice question"
                    ))
                })?;
                ResponseAnswer::MultipleChoice { answer_index }
            }
            QuestionKind::TrueFalse { .. } => {
                let answer = match self.answer.trim().to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" => false,
                    _ => {
                        return Err(ApiError::bad_request(format!(
                            "{prefix}answer must be true or false"
                        )))
                    }
                };
                ResponseAnswer::TrueFalse { answer }
            }
            QuestionKind::WrittenAnswer { .. } => ResponseAnswer::WrittenAnswer {
                answer: self.answer,
            },
        };

        Ok(Response {
            id: self.id,
            question_id: self.question_id,
            device_id: self.device_id,
            answer,
            timestamp: self.timestamp,
            is_correct: self.is_correct,
        })
    }
}

// ── Teacher requests ──────────────────────────────────────────────────────────

/// Body of `POST /materials` and `PUT /materials/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRequest {
    pub lesson_id: Uuid,
    pub material_type: MaterialType,
    pub title: String,
    pub content: String,
}

impl MaterialRequest {
    pub fn into_material(self, id: Uuid) -> Material {
        Material {
            id,
            lesson_id: self.lesson_id,
            material_type: self.material_type,
            title: self.title,
            content: self.content,
        }
    }
}

/// Body of `POST /questions` and `PUT /questions/{id}`.  The shape fields
/// sit next to `questionType`, exactly as questions are served to tablets.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    pub material_id: Uuid,
    pub text: String,
    #[serde(default)]
    pub max_score: Option<u32>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl QuestionRequest {
    pub fn into_question(self, id: Uuid) -> Question {
        Question {
            id,
            material_id: self.material_id,
            text: self.text,
            max_score: self.max_score,
            kind: self.kind,
        }
    }
}

/// Body of `POST /sessions`.  A session starts `ACTIVE` unless told otherwise.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub material_id: Uuid,
    #[serde(default)]
    pub device_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl SessionRequest {
    pub fn into_session(self) -> Session {
        let mut session = Session::new(
            self.material_id,
            self.status.unwrap_or(SessionStatus::Active),
            self.end_time,
        );
        session.device_id = self.device_id;
        session
    }
}

/// Body of `POST /feedback`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub response_id: Uuid,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub marks: Option<i32>,
}

impl FeedbackRequest {
    pub fn into_feedback(self) -> Feedback {
        Feedback::new(self.response_id, self.text, self.marks)
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfigResponse {
    pub kiosk_mode: bool,
    pub text_size: String,
}

#[derive(Debug, Serialize)]
pub struct DistributionResponse {
    pub materials: Vec<Material>,
    pub questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackListResponse {
    pub feedback: Vec<Feedback>,
}

#[derive(Debug, Serialize)]
pub struct QuestionListResponse {
    pub questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<Session>,
}

// ── Field helpers ─────────────────────────────────────────────────────────────

/// Parses a path or body id.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] if `raw` is blank or not a GUID.
pub fn parse_device_id(raw: &str) -> Result<Uuid, ApiError> {
    required_uuid("", "deviceId", Some(raw))
}

/// Parses the id of a teacher-managed entity taken from the path.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] naming `field` if `raw` is not a GUID.
pub fn parse_path_id(field: &str, raw: &str) -> Result<Uuid, ApiError> {
    required_uuid("", field, Some(raw))
}

fn required<'a>(prefix: &str, field: &str, value: Option<&'a str>) -> Result<&'a str, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("{prefix}{field} is required"))),
    }
}

fn required_uuid(prefix: &str, field: &str, value: Option<&str>) -> Result<Uuid, ApiError> {
    let raw = required(prefix, field, value)?;
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::bad_request(format!("{prefix}{field} must be a valid GUID")))
}
