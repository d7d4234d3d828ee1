//! HTTP error type.
//!
//! ```text
//!   DbError::NotFound                       → 404 not_found
//!   ValidationError / DbError::Unique       → 400 validation / 409 conflict
//!   CoreError (stock, transition, ...)      → 422 business_rule
//!   bad scan token                          → 403 invalid_token
//!   anything else                           → 500 internal (logged, not echoed)
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use depot_core::{CoreError, ValidationError};
use depot_db::DbError;
use depot_report::ReportError;
use serde::Serialize;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BusinessRule(String),

    #[error("{0}")]
    InvalidToken(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    code: &'a str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BusinessRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidToken(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "validation",
            ApiError::Conflict(_) => "conflict",
            ApiError::BusinessRule(_) => "business_rule",
            ApiError::InvalidToken(_) => "invalid_token",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                error!(detail = %detail, "Request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            success: false,
            code: self.code(),
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => ApiError::Validation(v.to_string()),
            other => ApiError::BusinessRule(other.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DbError::UniqueViolation { .. } => ApiError::Conflict(err.to_string()),
            DbError::ForeignKeyViolation { .. } => {
                ApiError::Validation("Referenced record does not exist".to_string())
            }
            DbError::Core(core) => core.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::UnknownKind(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_errors_map_to_status() {
        let not_found: ApiError = DbError::not_found("Sale", "s1").into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let stock: ApiError = DbError::Core(CoreError::InsufficientStock {
            sku: "FLT-SED".into(),
            available: 1,
            requested: 2,
        })
        .into();
        assert_eq!(stock.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(stock.code(), "business_rule");

        let invalid: ApiError = DbError::from(ValidationError::Required { field: "sku".into() }).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let internal: ApiError = DbError::QueryFailed("disk I/O error".into()).into();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
