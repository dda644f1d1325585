use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Meter {ean} is not authorized for this sharing operation")]
    UnauthorizedMeter { ean: String },

    #[error("No approved allocation key covers {from} .. {to}")]
    ScheduleGap {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl ApiError {
    /// Errors the caller has to fix by changing its request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ApiError::ValidationError(_) | ApiError::Conflict(_) | ApiError::NotFound(_)
        )
    }

    /// Only storage failures may succeed on a second attempt with the same input.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ApiError::DatabaseError(_))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ApiError {
    fn from(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        ApiError::DatabaseError(error.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
