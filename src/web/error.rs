//! API error handling for the Yak HTTP surface.
//!
//! Every rejection is answered with `{"success": false, "reason": ..., "message": ...}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::SessionError;
use crate::chat::IngressError;

/// Machine-readable rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    /// Nick missing or blank (403).
    NoNick,
    /// Nick already logged in (403).
    DuplicateIdentity,
    /// No session credential (403).
    NotLoggedIn,
    /// Unknown or malformed session token (403).
    InvalidSession,
    /// Posted nick differs from the session (403).
    IdentityMismatch,
    /// Request body missing a required field (400).
    MissingBody,
    /// Request body is not valid JSON for this route (400).
    MalformedBody,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::NoNick
            | ErrorCode::DuplicateIdentity
            | ErrorCode::NotLoggedIn
            | ErrorCode::InvalidSession
            | ErrorCode::IdentityMismatch => StatusCode::FORBIDDEN,
            ErrorCode::MissingBody | ErrorCode::MalformedBody => StatusCode::BAD_REQUEST,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Always false.
    pub success: bool,
    /// Rejection reason.
    pub reason: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a malformed body error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedBody, message)
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            success: false,
            reason: self.code,
            message: self.message,
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let code = match err {
            SessionError::NoNick => ErrorCode::NoNick,
            SessionError::DuplicateIdentity(_) => ErrorCode::DuplicateIdentity,
            SessionError::NoSession => ErrorCode::InvalidSession,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<IngressError> for ApiError {
    fn from(err: IngressError) -> Self {
        let code = match err {
            IngressError::NoNick => ErrorCode::NoNick,
            IngressError::NotLoggedIn => ErrorCode::NotLoggedIn,
            IngressError::InvalidSession => ErrorCode::InvalidSession,
            IngressError::IdentityMismatch => ErrorCode::IdentityMismatch,
            IngressError::MissingBody => ErrorCode::MissingBody,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        ApiError::malformed(rejection.body_text())
    }
}

impl From<crate::YakError> for ApiError {
    fn from(err: crate::YakError) -> Self {
        tracing::error!("Internal error: {}", err);
        ApiError::internal("An internal error occurred")
    }
}
