/// Unified error types for the media service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the media service
#[derive(Error, Debug)]
pub enum MediaError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Validation errors (bad slugs, disallowed extensions, oversized uploads)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Asset or directory path does not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// A path resolved to more than one record
    #[error("Ambiguous path: {0}")]
    AmbiguousPath(String),

    /// Directory move would create a cycle
    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// Image-only operation requested on a non-image asset
    #[error("Wrong media type: {0}")]
    WrongMediaType(String),

    /// Metadata record exists but the original blob is gone
    #[error("Original file missing: {0}")]
    MissingOriginalFile(String),

    /// Unknown operation name in an edit macro
    #[error("Filter \"{0}\" doesn't exist")]
    UnsupportedFilter(String),

    /// Edit macro operation is missing a required parameter
    #[error("Filter \"{filter}\" requires {parameter}")]
    MissingParameter { filter: String, parameter: String },

    /// Conflict errors (e.g. duplicate sibling slug)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Blob storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Image decode/encode errors
    #[error("Image codec error: {0}")]
    ImageCodec(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<image::ImageError> for MediaError {
    fn from(e: image::ImageError) -> Self {
        MediaError::ImageCodec(e.to_string())
    }
}

impl MediaError {
    /// Convenience constructor for macro parameter errors
    pub fn missing_parameter(filter: &str, parameter: &str) -> Self {
        MediaError::MissingParameter {
            filter: filter.to_string(),
            parameter: parameter.to_string(),
        }
    }
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert MediaError to HTTP response
impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            MediaError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            MediaError::AmbiguousPath(_) => {
                (StatusCode::CONFLICT, "AmbiguousPath", self.to_string())
            }
            MediaError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            MediaError::InvalidHierarchy(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "InvalidHierarchy",
                self.to_string(),
            ),
            MediaError::WrongMediaType(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "WrongMediaType",
                self.to_string(),
            ),
            MediaError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            MediaError::UnsupportedFilter(_) => (
                StatusCode::BAD_REQUEST,
                "UnsupportedFilter",
                self.to_string(),
            ),
            MediaError::MissingParameter { .. } => (
                StatusCode::BAD_REQUEST,
                "MissingParameter",
                self.to_string(),
            ),
            MediaError::MissingOriginalFile(_) => (
                StatusCode::NOT_FOUND,
                "MissingOriginalFile",
                self.to_string(),
            ),
            MediaError::ImageCodec(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "ImageCodec",
                self.to_string(),
            ),
            MediaError::Database(_)
            | MediaError::Storage(_)
            | MediaError::Io(_)
            | MediaError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;
