use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Fatal, call-failing errors. Scheduling shortfalls (a task that could not
/// be placed) and post-hoc constraint violations are never represented as
/// `Err` — they are attached to a `SchedulingResult` instead (see
/// `crate::models::result`).
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid time/date format: {message}")]
    InvalidFormat { message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<JsonValue>,
    },

    #[error("record not found: {kind} {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl SchedulerError {
    pub fn invalid_format(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "scheduler::time", %message, "invalid time/date format");
        SchedulerError::InvalidFormat { message }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "scheduler::config", %message, "invalid configuration");
        SchedulerError::InvalidConfig { message }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "scheduler::validation", %message, "validation error");
        SchedulerError::Validation {
            message,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "scheduler::validation", %message, details = %details, "validation error with details");
        SchedulerError::Validation {
            message,
            details: Some(details),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        let id = id.into();
        warn!(target: "scheduler::lookup", kind, %id, "record not found");
        SchedulerError::NotFound { kind, id }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "scheduler::conflict", %message, "conflict error");
        SchedulerError::Conflict { message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "scheduler::other", %message, "unclassified error");
        SchedulerError::Other(message)
    }
}
