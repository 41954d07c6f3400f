//! Structured error types for planner operations and API responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,
    InvalidState,

    // Caller identity
    Unauthorized,
    Forbidden,

    // Not found errors
    TaskNotFound,

    // Internal errors
    DatabaseError,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue
            | ErrorCode::InvalidState => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::TaskNotFound => StatusCode::NOT_FOUND,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, ErrorCode::DatabaseError)
    }
}

/// Structured error for planner operations.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, reason)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Missing or empty user identity")
    }

    /// Access to another user's row. The message never names the owner.
    pub fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden, "Access denied")
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Repository failures arrive as anyhow errors; anything not already an
// ApiError is an upstream store failure.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => ApiError::database(format!("{:#}", err)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        if self.code.is_server_error() {
            tracing::error!(code = ?self.code, error = %self.message, "Request failed");
            let body = ApiError::new(self.code, "Internal server error");
            return (status, Json(body)).into_response();
        }
        (status, Json(self)).into_response()
    }
}

/// Result type for planner operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_client_and_server_statuses() {
        assert_eq!(ErrorCode::InvalidFieldValue.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::TaskNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::DatabaseError.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn anyhow_errors_become_database_errors() {
        let err: ApiError = anyhow::anyhow!("disk I/O error").into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(err.message.contains("disk I/O error"));
    }

    #[test]
    fn wrapped_api_errors_survive_anyhow() {
        let err: ApiError = anyhow::Error::new(ApiError::forbidden()).into();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }

    #[test]
    fn serialized_error_omits_empty_fields() {
        let json = serde_json::to_value(ApiError::task_not_found("abc")).unwrap();
        assert_eq!(json["code"], "TASK_NOT_FOUND");
        assert!(json.get("field").is_none());

        let json = serde_json::to_value(ApiError::missing_field("title")).unwrap();
        assert_eq!(json["field"], "title");
    }

    #[test]
    fn only_database_errors_are_server_errors() {
        assert!(ErrorCode::DatabaseError.is_server_error());
        assert!(!ErrorCode::Forbidden.is_server_error());

        let json = serde_json::to_value(ApiError::database("disk full")).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["code", "message"]);
    }
}
