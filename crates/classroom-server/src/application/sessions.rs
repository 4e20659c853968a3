//! SessionService: lifecycle of a material being run in class.
//!
//! Any state may move to any other; the only rule is that a session is
//! `ACTIVE` exactly when it has no end time.  Each transition is a single
//! read-modify-write with no locking across calls, so concurrent transitions
//! on the same session resolve as last writer wins.

use std::sync::Arc;

use chrono::Utc;
use classroom_core::{Session, SessionStatus};
use tracing::info;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::repositories::{MaterialRepository, SessionRepository};

pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
    materials: Arc<dyn MaterialRepository>,
}

impl SessionService {
    pub fn new(sessions: Arc<dyn SessionRepository>, materials: Arc<dyn MaterialRepository>) -> Self {
        Self {
            sessions,
            materials,
        }
    }

    /// Persists `session` as given after checking its material and end time.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the material does not exist.
    /// - [`ServiceError::Validation`] if a non-active session has no end time,
    ///   or an active one has one.
    pub async fn create_session(&self, session: Session) -> ServiceResult<Session> {
        if self.materials.get(session.material_id).await?.is_none() {
            return Err(ServiceError::not_found("Material", session.material_id));
        }
        if !session.has_consistent_end_time() {
            let msg = if session.status == SessionStatus::Active {
                "an ACTIVE session must not have an end time".to_string()
            } else {
                format!("a {} session requires an end time", session.status)
            };
            return Err(ServiceError::Validation(msg));
        }

        self.sessions.save(session.clone()).await?;
        info!(session_id = %session.id, status = %session.status, "session created");
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the session does not exist.
    pub async fn activate(&self, id: Uuid) -> ServiceResult<Session> {
        self.transition(id, SessionStatus::Active).await
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the session does not exist.
    pub async fn pause(&self, id: Uuid) -> ServiceResult<Session> {
        self.transition(id, SessionStatus::Paused).await
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the session does not exist.
    pub async fn complete(&self, id: Uuid) -> ServiceResult<Session> {
        self.transition(id, SessionStatus::Completed).await
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the session does not exist.
    pub async fn cancel(&self, id: Uuid) -> ServiceResult<Session> {
        self.transition(id, SessionStatus::Cancelled).await
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<Session>> {
        Ok(self.sessions.list().await?)
    }

    /// A missing id is `Ok(None)`, not an error.
    pub async fn get_by_id(&self, id: Uuid) -> ServiceResult<Option<Session>> {
        Ok(self.sessions.get(id).await?)
    }

    /// Returns whether a session was removed.
    pub async fn delete(&self, id: Uuid) -> ServiceResult<bool> {
        Ok(self.sessions.delete(id).await?)
    }

    async fn transition(&self, id: Uuid, status: SessionStatus) -> ServiceResult<Session> {
        let mut session = self
            .sessions
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Session", id))?;
        let from = session.status;
        session.transition_to(status, Utc::now());
        self.sessions.save(session.clone()).await?;
        info!(session_id = %id, %from, to = %status, "session transitioned");
        Ok(session)
    }
}
