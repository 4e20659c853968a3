//! Error kinds shared by every application service.
//!
//! Services never panic or throw on a business-rule failure; they return one
//! of these variants and the HTTP layer maps it to a status code.

use thiserror::Error;

/// A failure reported by a storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Error type for all application services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The input broke a business rule (HTTP 400).
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist (HTTP 404).
    #[error("{0}")]
    NotFound(String),

    /// The entity already exists (HTTP 409).
    #[error("{0}")]
    Conflict(String),

    /// The device cannot be reached right now (HTTP 503).
    #[error("{0}")]
    Unavailable(String),

    /// The storage collaborator failed (HTTP 500).
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Builds a `NotFound` naming the entity kind and id.
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} with ID {id} not found"))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
