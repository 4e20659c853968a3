//! Request handlers for `/api/v1`.
//!
//! The first half serves tablets; the second half, from "Materials" on,
//! serves the teacher's controller.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use classroom_core::{ControlCommand, Feedback, Material, Question, Response, Session};
use tracing::info;
use uuid::Uuid;

use super::dto::{
    parse_device_id, parse_path_id, AssignRequest, BatchResponseRequest, DeviceConfigResponse,
    DistributionResponse, FeedbackListResponse, FeedbackRequest, MaterialRequest, PairRequest,
    QuestionListResponse, QuestionRequest, ResponseRequest, SessionListResponse, SessionRequest,
};
use super::error::ApiError;
use super::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

// ── Pairing ───────────────────────────────────────────────────────────────────

/// `POST /pair {deviceId}`: 201 on a new pairing, 409 if already paired.
pub async fn pair_device(
    State(state): State<AppState>,
    payload: Result<Json<PairRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let request = body(payload)?;
    let device_id = parse_device_id(request.device_id.as_deref().unwrap_or_default())?;

    if state.registry.register_device(device_id).await? {
        info!(%device_id, "device paired over HTTP");
        Ok(StatusCode::CREATED)
    } else {
        Err(ApiError::conflict("Device is already paired"))
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// `GET /config/{deviceId}`.  Also acknowledges pending distribution and
/// confirms a pending config refresh.
pub async fn get_config(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<DeviceConfigResponse>> {
    let device_id = parse_device_id(&device_id)?;
    state.distribution.acknowledge_delivery(device_id);
    state.control.config_fetched(device_id);

    Ok(Json(DeviceConfigResponse {
        kiosk_mode: state.device_settings.kiosk_mode,
        text_size: state.device_settings.text_size.clone(),
    }))
}

// ── Distribution ──────────────────────────────────────────────────────────────

/// `GET /distribution/{deviceId}`: the bundle, or 404 when none is available.
pub async fn get_distribution(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<DistributionResponse>> {
    let device_id = parse_device_id(&device_id)?;

    let bundle = state
        .distribution
        .get_distribution_bundle(device_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No materials available for this device"))?;
    state.distribution.acknowledge_delivery(device_id);

    Ok(Json(DistributionResponse {
        materials: bundle.materials,
        questions: bundle.questions,
    }))
}

/// `POST /distribution/{deviceId} {materialIds}`.
pub async fn assign_materials(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let device_id = parse_device_id(&device_id)?;
    let request = body(payload)?;
    state
        .distribution
        .assign_materials(device_id, request.material_ids)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /distribution/{deviceId}`.
pub async fn clear_assignments(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<StatusCode> {
    let device_id = parse_device_id(&device_id)?;
    state.distribution.clear_assignments(device_id);
    Ok(StatusCode::NO_CONTENT)
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// `POST /responses`: 201 or 400.
pub async fn submit_response(
    State(state): State<AppState>,
    payload: Result<Json<ResponseRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let request = body(payload)?;
    let response = to_domain(&state, &request, "").await?;
    let response_id = response.id;

    state
        .responses
        .create_response(response)
        .await
        .map_err(ApiError::from_validation)?;
    info!(%response_id, "response submitted");
    Ok(StatusCode::CREATED)
}

/// `POST /responses/batch`: all items are checked before any is stored.
pub async fn submit_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchResponseRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let request = body(payload)?;
    let items = request
        .responses
        .filter(|items| !items.is_empty())
        .ok_or_else(|| ApiError::bad_request("responses is required and must not be empty"))?;

    let mut responses = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        responses.push(to_domain(&state, item, &format!("responses[{index}].")).await?);
    }

    let stored = state
        .responses
        .create_responses(responses)
        .await
        .map_err(ApiError::from_validation)?;
    info!(count = stored, "response batch submitted");
    Ok(StatusCode::CREATED)
}

async fn to_domain(
    state: &AppState,
    request: &ResponseRequest,
    prefix: &str,
) -> ApiResult<Response> {
    let parsed = request.parse(prefix)?;
    let question = state
        .responses
        .question_for(parsed.question_id)
        .await
        .map_err(ApiError::from_validation)?
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "{prefix}Question with ID {} not found",
                parsed.question_id
            ))
        })?;
    parsed.into_response(&question, prefix)
}

// ── Feedback ──────────────────────────────────────────────────────────────────

/// `GET /feedback/{deviceId}`: 404 when the device has no feedback.
pub async fn get_feedback(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<FeedbackListResponse>> {
    let device_id = parse_device_id(&device_id)?;
    let feedback = state.feedback.feedback_for_device(device_id).await?;
    if feedback.is_empty() {
        return Err(ApiError::not_found("No feedback available for this device"));
    }
    Ok(Json(FeedbackListResponse { feedback }))
}

// ── Materials ─────────────────────────────────────────────────────────────────

/// `POST /materials`: 201 with the stored material.
pub async fn create_material(
    State(state): State<AppState>,
    payload: Result<Json<MaterialRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Material>)> {
    let material = body(payload)?.into_material(Uuid::new_v4());
    let created = state.materials.create_material(material).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_material(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Material>> {
    let id = parse_path_id("materialId", &id)?;
    state
        .materials
        .get_material(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Material with ID {id} not found")))
}

pub async fn update_material(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<MaterialRequest>, JsonRejection>,
) -> ApiResult<Json<Material>> {
    let id = parse_path_id("materialId", &id)?;
    let material = body(payload)?.into_material(id);
    Ok(Json(state.materials.update_material(material).await?))
}

/// `DELETE /materials/{id}`: also removes its questions and their responses.
pub async fn delete_material(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_path_id("materialId", &id)?;
    if state.materials.delete_material(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Material with ID {id} not found")))
    }
}

pub async fn list_material_questions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<QuestionListResponse>> {
    let id = parse_path_id("materialId", &id)?;
    let questions = state.questions.questions_for_material(id).await?;
    Ok(Json(QuestionListResponse { questions }))
}

// ── Questions ─────────────────────────────────────────────────────────────────

/// `POST /questions`: 201, 400 on a rule violation, 404 for a missing material.
pub async fn create_question(
    State(state): State<AppState>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Question>)> {
    let question = body(payload)?.into_question(Uuid::new_v4());
    let created = state.questions.create_question(question).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Question>> {
    let id = parse_path_id("questionId", &id)?;
    state
        .questions
        .get_question(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Question with ID {id} not found")))
}

pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> ApiResult<Json<Question>> {
    let id = parse_path_id("questionId", &id)?;
    let question = body(payload)?.into_question(id);
    Ok(Json(state.questions.update_question(question).await?))
}

/// `DELETE /questions/{id}`: removes the question's responses first.
pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_path_id("questionId", &id)?;
    state.questions.delete_question(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Sessions ──────────────────────────────────────────────────────────────────

pub async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<SessionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let session = body(payload)?.into_session();
    let created = state.sessions.create_session(session).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<SessionListResponse>> {
    let sessions = state.sessions.get_all().await?;
    Ok(Json(SessionListResponse { sessions }))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    let id = parse_path_id("sessionId", &id)?;
    state
        .sessions
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Session with ID {id} not found")))
}

pub async fn activate_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    let id = parse_path_id("sessionId", &id)?;
    Ok(Json(state.sessions.activate(id).await?))
}

pub async fn pause_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    let id = parse_path_id("sessionId", &id)?;
    Ok(Json(state.sessions.pause(id).await?))
}

pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    let id = parse_path_id("sessionId", &id)?;
    Ok(Json(state.sessions.complete(id).await?))
}

pub async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    let id = parse_path_id("sessionId", &id)?;
    Ok(Json(state.sessions.cancel(id).await?))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_path_id("sessionId", &id)?;
    if state.sessions.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Session with ID {id} not found")))
    }
}

// ── Teacher feedback ──────────────────────────────────────────────────────────

/// `POST /feedback`: 201, 400 for an auto-graded question or bad marks, 404
/// for a missing response or question.
pub async fn create_feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Feedback>)> {
    let feedback = body(payload)?.into_feedback();
    let created = state.feedback.create_feedback(feedback).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// ── Device control ────────────────────────────────────────────────────────────

/// `POST /devices/{deviceId}/lock`: 202 once the command is queued.  Whether
/// the tablet obeyed is reported later over the push hub.
pub async fn lock_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<StatusCode> {
    control(&state, &device_id, ControlCommand::LockScreen).await
}

pub async fn unlock_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<StatusCode> {
    control(&state, &device_id, ControlCommand::UnlockScreen).await
}

pub async fn refresh_device_config(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<StatusCode> {
    control(&state, &device_id, ControlCommand::RefreshConfig).await
}

async fn control(state: &AppState, raw_id: &str, command: ControlCommand) -> ApiResult<StatusCode> {
    let device_id = parse_device_id(raw_id)?;
    state.control.send(device_id, command).await?;
    Ok(StatusCode::ACCEPTED)
}
