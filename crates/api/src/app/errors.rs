use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tribal_auth::{AuthzError, PasswordError};
use tribal_core::DomainError;
use tribal_infra::RepositoryError;

pub type ApiResult<T> = Result<T, ApiError>;

/// An error rendered as `{"error": <code>, "message": <text>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
    }

    /// Log `detail` and answer with an opaque 500.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::Validation(_) => Self::new(StatusCode::BAD_REQUEST, "validation_error", message),
            DomainError::InvalidId(_) => Self::new(StatusCode::BAD_REQUEST, "invalid_id", message),
            DomainError::InvariantViolation(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
            }
            DomainError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            DomainError::Conflict(_) => Self::new(StatusCode::CONFLICT, "conflict", message),
            DomainError::Forbidden(_) => Self::new(StatusCode::FORBIDDEN, "forbidden", message),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => Self::not_found(what),
            RepositoryError::Conflict(msg) => Self::new(StatusCode::CONFLICT, "conflict", msg),
            RepositoryError::Domain(err) => err.into(),
            other => Self::internal(other),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::InvalidLength => Self::bad_request(err.to_string()),
            PasswordError::Mismatch => Self::new(StatusCode::UNAUTHORIZED, "invalid_credentials", err.to_string()),
            PasswordError::Hash => Self::internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(self.status, self.code, self.message)
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path or body id. Malformed ids read as unknown ones.
pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> ApiResult<T> {
    raw.trim().parse().map_err(|_| ApiError::not_found(what))
}
