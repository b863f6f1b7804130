//! Error types for the HTTP channel.
//!
//! [`ApiError`] converts into an Axum response carrying an
//! [`ErrorBody`](gridsync_types::ErrorBody) with a status code that matches
//! its [`ErrorCode`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gridsync_types::{ErrorBody, ErrorCode};
use tracing::warn;

use crate::sync::SyncError;

/// Errors returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The sync service rejected or failed the operation.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The request could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// Wire error category.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Sync(e) => e.code(),
            Self::BadRequest(_) => ErrorCode::BadRequest,
        }
    }
}

/// HTTP status used for each error category.
pub const fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation | ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
        ErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::StoreInvalid => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = status_for(code);
        if code == ErrorCode::StoreUnavailable {
            warn!(error = %self, "Grid store unavailable");
        }

        let body = ErrorBody {
            error: self.to_string(),
            code,
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}
