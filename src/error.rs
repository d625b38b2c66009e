use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    identity::IdentityError, payment::PaymentError, repository::RepoError,
    storage::StorageError,
};

/// Result type alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;

/// ApiError
///
/// The single error type returned by every handler. Each variant maps onto one
/// HTTP status and is rendered as `{ "error": "<message>" }`.
///
/// `Upstream` carries internal detail for the logs only; the client always
/// receives a generic message for it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400: malformed input or a rejected state change.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// 401: no valid session on a protected resource.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 403: valid session, insufficient role or ownership.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// 404: the addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// 409: the request collides with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// 500: persistence or third-party collaborator failure.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message placed in the response body.
    pub fn client_message(&self) -> String {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m) => m.clone(),
            ApiError::Upstream(_) => "Internal server error".to_string(),
        }
    }
}

/// ErrorBody
///
/// Wire shape of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let ApiError::Upstream(detail) = &self {
            tracing::error!(error = %detail, status = %status, "upstream failure");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }

        let body = ErrorBody {
            error: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        if err.is_conflict() {
            tracing::debug!(error = %err, "uniqueness violation");
            return ApiError::Conflict("A record with the same name, slug or email already exists".to_string());
        }
        if err.is_out_of_range() {
            tracing::debug!(error = %err, "value out of range");
            return ApiError::BadRequest("Value is out of the accepted range".to_string());
        }
        ApiError::Upstream(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidPayload(message) => ApiError::BadRequest(message),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Rejected(message) => ApiError::BadRequest(message),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}
