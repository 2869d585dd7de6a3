//! Error types for the catalogue

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::models::DocumentCheck;

/// Result type alias for catalogue operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalogue error types
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{level} not found: {id}")]
    NodeNotFound { level: &'static str, id: String },

    #[error("Parent {level} not found: {id}")]
    ParentNotFound { level: &'static str, id: String },

    #[error("Content not found: {0}")]
    ContentNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unknown collection: {0}")]
    CollectionNotFound(String),

    #[error("Invalid {field}: {value}")]
    InvalidId { field: String, value: String },

    #[error("Invalid content: {reason}")]
    InvalidContent { reason: String },

    #[error("File too large: {size} bytes exceeds the {limit} byte limit for inline content")]
    FileTooLarge { size: usize, limit: usize },

    #[error("Payload too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Request body too large: {0}")]
    BodyTooLarge(String),

    #[error("No lesson could be resolved from id {id}")]
    LessonUnresolved { id: String, check: DocumentCheck },

    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied: {action}")]
    PermissionDenied { action: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<mongodb::error::Error> for CatalogError {
    fn from(err: mongodb::error::Error) -> Self {
        CatalogError::Database(err.to_string())
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Serialization(err.to_string())
    }
}

impl From<bson::ser::Error> for CatalogError {
    fn from(err: bson::ser::Error) -> Self {
        CatalogError::Serialization(err.to_string())
    }
}

impl From<bson::de::Error> for CatalogError {
    fn from(err: bson::de::Error) -> Self {
        CatalogError::Serialization(err.to_string())
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    #[serde(rename = "documentCheck", skip_serializing_if = "Option::is_none")]
    pub document_check: Option<DocumentCheck>,
}

impl CatalogError {
    /// Convert to API error code
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::NodeNotFound { .. } => "NODE_NOT_FOUND",
            CatalogError::ParentNotFound { .. } => "PARENT_NOT_FOUND",
            CatalogError::ContentNotFound(_) => "CONTENT_NOT_FOUND",
            CatalogError::UserNotFound(_) => "USER_NOT_FOUND",
            CatalogError::FileNotFound(_) => "FILE_NOT_FOUND",
            CatalogError::CollectionNotFound(_) => "COLLECTION_NOT_FOUND",
            CatalogError::InvalidId { .. } => "INVALID_ID",
            CatalogError::InvalidContent { .. } => "INVALID_CONTENT",
            CatalogError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            CatalogError::PayloadTooLarge { .. } | CatalogError::BodyTooLarge(_) => {
                "PAYLOAD_TOO_LARGE"
            }
            CatalogError::LessonUnresolved { .. } => "LESSON_UNRESOLVED",
            CatalogError::UsernameTaken(_) => "USERNAME_TAKEN",
            CatalogError::InvalidCredentials => "INVALID_CREDENTIALS",
            CatalogError::AccountInactive => "ACCOUNT_INACTIVE",
            CatalogError::Unauthorized => "UNAUTHORIZED",
            CatalogError::PermissionDenied { .. } => "PERMISSION_DENIED",
            CatalogError::Validation(_) => "VALIDATION_ERROR",
            CatalogError::Database(_) => "DATABASE_ERROR",
            CatalogError::Io(_) => "IO_ERROR",
            CatalogError::Serialization(_) => "SERIALIZATION_ERROR",
            CatalogError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::NodeNotFound { .. }
            | CatalogError::ContentNotFound(_)
            | CatalogError::UserNotFound(_)
            | CatalogError::FileNotFound(_)
            | CatalogError::CollectionNotFound(_) => StatusCode::NOT_FOUND,

            CatalogError::ParentNotFound { .. }
            | CatalogError::InvalidId { .. }
            | CatalogError::InvalidContent { .. }
            | CatalogError::FileTooLarge { .. }
            | CatalogError::LessonUnresolved { .. }
            | CatalogError::Validation(_) => StatusCode::BAD_REQUEST,

            CatalogError::PayloadTooLarge { .. } | CatalogError::BodyTooLarge(_) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }

            CatalogError::UsernameTaken(_) => StatusCode::CONFLICT,

            CatalogError::InvalidCredentials | CatalogError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }

            CatalogError::AccountInactive | CatalogError::PermissionDenied { .. } => {
                StatusCode::FORBIDDEN
            }

            CatalogError::Database(_)
            | CatalogError::Io(_)
            | CatalogError::Serialization(_)
            | CatalogError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        let document_check = match &self {
            CatalogError::LessonUnresolved { check, .. } => Some(check.clone()),
            _ => None,
        };
        let body = ApiError {
            error: self.code().to_string(),
            message: self.to_string(),
            document_check,
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CatalogError::FileTooLarge { size: 13, limit: 12 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CatalogError::PayloadTooLarge { size: 20, limit: 15 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            CatalogError::ContentNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(CatalogError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            CatalogError::Database("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_unresolved_lesson_carries_document_check() {
        let err = CatalogError::LessonUnresolved {
            id: "abc".into(),
            check: DocumentCheck {
                is_lesson: false,
                is_sub_unit: true,
                is_unit: false,
                lessons_found: 0,
            },
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "LESSON_UNRESOLVED");
        assert_eq!(json["documentCheck"]["isSubUnit"], true);
        assert_eq!(json["documentCheck"]["lessonsFound"], 0);
    }
}
