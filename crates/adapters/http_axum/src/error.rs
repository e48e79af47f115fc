//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use smarthub_domain::error::{ConflictError, SmartHubError, ValidationError};

/// JSON error body returned by API endpoints.
///
/// Schema violations are listed one per entry; other failures carry a single
/// message.
#[derive(Serialize)]
#[serde(untagged)]
enum ErrorBody {
    Violations { error: Vec<String> },
    Message { error: String },
}

/// Maps [`SmartHubError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(SmartHubError);

impl From<SmartHubError> for ApiError {
    fn from(err: SmartHubError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            SmartHubError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::Violations {
                    error: err.violations,
                },
            ),
            SmartHubError::Conflict(err @ ConflictError::AlreadyExists { .. }) => (
                StatusCode::CONFLICT,
                ErrorBody::Message {
                    error: err.to_string(),
                },
            ),
            SmartHubError::Conflict(err @ ConflictError::IdMismatch { .. }) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::Message {
                    error: err.to_string(),
                },
            ),
            SmartHubError::NotFound(err) => (
                StatusCode::NOT_FOUND,
                ErrorBody::Message {
                    error: err.to_string(),
                },
            ),
            err @ SmartHubError::NotInitialized(_) => {
                tracing::error!(error = %err, "dependency missing");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody::Message {
                        error: err.to_string(),
                    },
                )
            }
            SmartHubError::Storage(err) => {
                tracing::error!(error = ?err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::Message {
                        error: "internal server error".to_string(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
