//! Unified error types for the portal core.
//!
//! Database, workflow and configuration failures surface as [`Error`]. The MyJKKN
//! client keeps its own [`ApiError`] so that callers can treat expected HTTP failures
//! as values; it converts into [`Error`] when it crosses into the rest of the crate.

use crate::myjkkn::ApiError;
use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// Error bubbled up from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem error (config files, API config store)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A row that was looked up does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"service request"`
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Input failed validation before reaching the database
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable description
        message: String,
    },

    /// A workflow action is not legal for this request and actor
    #[error("Action '{action}' is not allowed while the request is {status}")]
    ActionNotAllowed {
        /// Attempted action
        action: String,
        /// Status the request was in
        status: String,
    },

    /// The request was modified by someone else since it was read
    #[error("Service request {request_id} was modified concurrently (expected version {expected_version})")]
    Conflict {
        /// Request id
        request_id: i64,
        /// Version the caller based its decision on
        expected_version: i32,
    },

    /// MyJKKN API failure
    #[error("MyJKKN API error: {0}")]
    Api(#[from] ApiError),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with a formatted message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
