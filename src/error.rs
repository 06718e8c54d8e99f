use crate::auth::AuthError;
use crate::media::MediaError;
use crate::schemas::ErrorResponse;
use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use axum_valid::ValidRejection;
use model::status::StatusError;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

/// Error type returned by every handler.
///
/// Each variant maps to one HTTP status and is rendered as an
/// [`ErrorResponse`] body, so clients always receive `{ "error": ... }`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// Request clashes with existing state (duplicate username, illegal status change)
    #[error("{0}")]
    Conflict(String),

    /// Missing, invalid or expired credentials
    #[error("{0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Database(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message shown to the client. Server-side failures are logged in full
    /// but only reported generically.
    fn public_message(&self) -> String {
        match self {
            ApiError::Database(_) => "Internal server error while accessing the database".to_string(),
            ApiError::Storage(_) => "Internal server error while storing the file".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// True when the database rejected a write because of a unique index.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected ({}): {}", status, self);
        }

        let body = ErrorResponse {
            error: self.public_message(),
            code: self.code().to_string(),
            success: false,
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl<E: Into<ApiError>> From<ValidRejection<E>> for ApiError {
    fn from(rejection: ValidRejection<E>) -> Self {
        match rejection {
            ValidRejection::Valid(errors) => errors.into(),
            ValidRejection::Inner(inner) => inner.into(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reasons: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, reasons.join(", "))
            })
            .collect();
        fields.sort();
        ApiError::Validation(fields.join("; "))
    }
}

impl From<StatusError> for ApiError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::Unknown(_) | StatusError::RiderRequired(_) | StatusError::RiderNotAllowed => {
                ApiError::Validation(err.to_string())
            }
            StatusError::IllegalTransition { .. } | StatusError::Closed(_) => {
                ApiError::Conflict(err.to_string())
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::UnsupportedExtension(_) | MediaError::MissingFileName | MediaError::Empty => {
                ApiError::Validation(err.to_string())
            }
            MediaError::Io(_) => ApiError::Storage(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::HashingFailed | AuthError::TokenGenerationFailed => {
                ApiError::Internal(err.to_string())
            }
            _ => ApiError::Unauthorized(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::status::FulfillmentStatus;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Database(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_database_details_are_hidden() {
        let err = ApiError::Database(DbErr::Custom("secret table layout".into()));
        assert!(!err.public_message().contains("secret"));
    }

    #[test]
    fn test_status_errors_map_to_taxonomy() {
        let unknown: ApiError = StatusError::Unknown("Lost".into()).into();
        assert!(matches!(unknown, ApiError::Validation(_)));

        let illegal: ApiError = StatusError::IllegalTransition {
            from: FulfillmentStatus::Arrived,
            to: FulfillmentStatus::Pending,
        }
        .into();
        assert!(matches!(illegal, ApiError::Conflict(_)));
    }
}
