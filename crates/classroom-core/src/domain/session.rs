//! Lesson sessions.
//!
//! # Session lifecycle (for beginners)
//!
//! A session tracks one material being run in class.  It can move between any
//! of the four states at any time; the only rule is about `end_time`:
//!
//! ```text
//!            ┌──────────── end_time = None ────────────┐
//!            │                 ACTIVE                   │
//!            └──────────────────────────────────────────┘
//!   PAUSED / COMPLETED / CANCELLED  ──►  end_time = Some(..)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Paused => "PAUSED",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub material_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
}

impl Session {
    /// Creates a session starting now.
    pub fn new(material_id: Uuid, status: SessionStatus, end_time: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            material_id,
            device_id: None,
            start_time: Utc::now(),
            end_time,
            status,
        }
    }

    /// `status == ACTIVE` exactly when `end_time` is unset.
    pub fn has_consistent_end_time(&self) -> bool {
        (self.status == SessionStatus::Active) == self.end_time.is_none()
    }

    /// Moves the session into `status`, setting or clearing `end_time` so the
    /// end-time rule holds afterwards.
    pub fn transition_to(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        self.status = status;
        self.end_time = match status {
            SessionStatus::Active => None,
            _ => Some(now),
        };
    }
}
