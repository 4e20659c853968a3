//! API route definitions.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;
use super::state::AppState;

/// Creates the full router, mounted under `/api/v1`.
///
/// Tablet routes come first; the teacher's controller uses the rest.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Tablets
        .route("/pair", post(handlers::pair_device))
        .route("/config/{device_id}", get(handlers::get_config))
        .route(
            "/distribution/{device_id}",
            get(handlers::get_distribution)
                .post(handlers::assign_materials)
                .delete(handlers::clear_assignments),
        )
        .route("/responses", post(handlers::submit_response))
        .route("/responses/batch", post(handlers::submit_batch))
        .route("/feedback/{device_id}", get(handlers::get_feedback))
        // Teacher: content
        .route("/materials", post(handlers::create_material))
        .route(
            "/materials/{id}",
            get(handlers::get_material)
                .put(handlers::update_material)
                .delete(handlers::delete_material),
        )
        .route(
            "/materials/{id}/questions",
            get(handlers::list_material_questions),
        )
        .route("/questions", post(handlers::create_question))
        .route(
            "/questions/{id}",
            get(handlers::get_question)
                .put(handlers::update_question)
                .delete(handlers::delete_question),
        )
        // Teacher: sessions
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/activate", post(handlers::activate_session))
        .route("/sessions/{id}/pause", post(handlers::pause_session))
        .route("/sessions/{id}/complete", post(handlers::complete_session))
        .route("/sessions/{id}/cancel", post(handlers::cancel_session))
        // Teacher: feedback and device control
        .route("/feedback", post(handlers::create_feedback))
        .route("/devices/{device_id}/lock", post(handlers::lock_device))
        .route("/devices/{device_id}/unlock", post(handlers::unlock_device))
        .route(
            "/devices/{device_id}/refresh-config",
            post(handlers::refresh_device_config),
        );

    Router::new().nest("/api/v1", api).with_state(state)
}
