use atelier_core::{HttpError, Retryable};
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::validate::PayloadError;

pub type Result<T> = std::result::Result<T, GenError>;

/// Generation orchestration errors
///
/// Classification is produced at the point the error is known (HTTP status,
/// explicit variant), never re-derived from message text downstream.
#[derive(Debug, Error)]
pub enum GenError {
    /// Prompt or settings failed validation; no network call was made
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Backend rejected our credentials
    #[error("backend '{backend}' rejected credentials: {message}")]
    Unauthorized { backend: String, message: String },

    /// Backend returned a non-2xx status
    #[error("backend '{backend}' error ({status}): {message}")]
    Backend {
        backend: String,
        status: u16,
        message: String,
    },

    /// Backend or CDN rate limit
    #[error("backend '{backend}' rate limited")]
    RateLimited { backend: String },

    /// Request could not be sent, timed out, or the response was unreadable
    #[error("backend '{backend}' unreachable: {message}")]
    Connection { backend: String, message: String },

    /// Backend answered 2xx but no image could be extracted from the body
    #[error("backend '{backend}' produced no image; raw response: {raw}")]
    NoImage { backend: String, raw: String },

    /// Backend handed back an inline payload that failed validation
    ///
    /// The request never carries image bytes, so a bad payload always
    /// means upstream corruption, not caller error.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// CDN ingestion failed
    #[error(transparent)]
    Ingest(#[from] atelier_ingest::IngestError),

    /// Every backend in the fallback ladder failed
    #[error("all backends failed (attempted: {}): {last_error}", attempted.join(", "))]
    AllBackendsFailed {
        attempted: Vec<String>,
        last_error: String,
    },

    /// Unknown job identifier
    #[error("generation job not found: {id}")]
    JobNotFound { id: uuid::Uuid },
}

impl GenError {
    /// Whether a failure of one ladder entry makes trying further entries
    /// pointless
    ///
    /// Permanent client-side problems (invalid input, bad credentials,
    /// forbidden) would fail identically everywhere and waste quota.
    /// Rate limits are backend-local and never abort the ladder.
    pub fn aborts_ladder(&self) -> bool {
        match self {
            Self::InvalidRequest(_) | Self::Unauthorized { .. } => true,
            Self::Backend { status, .. } => matches!(status, 400 | 401 | 403),
            _ => false,
        }
    }
}

impl Retryable for GenError {
    fn is_terminal(&self) -> bool {
        match self {
            Self::InvalidRequest(_)
            | Self::Unauthorized { .. }
            | Self::NoImage { .. }
            | Self::Payload(_)
            | Self::AllBackendsFailed { .. }
            | Self::JobNotFound { .. } => true,
            Self::Backend { status, .. } => (400..500).contains(status) && *status != 429,
            Self::Ingest(e) => e.is_terminal(),
            Self::RateLimited { .. } | Self::Connection { .. } => false,
        }
    }
}

impl HttpError for GenError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::JobNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Ingest(e) => e.status_code(),
            Self::Backend { .. }
            | Self::Connection { .. }
            | Self::NoImage { .. }
            | Self::Payload(_)
            | Self::AllBackendsFailed { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Unauthorized { .. } => "authentication_error",
            Self::RateLimited { .. } => "rate_limit_error",
            Self::JobNotFound { .. } => "not_found_error",
            Self::Ingest(e) => e.error_type(),
            Self::Backend { .. }
            | Self::Connection { .. }
            | Self::NoImage { .. }
            | Self::Payload(_)
            | Self::AllBackendsFailed { .. } => "upstream_error",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}

/// Error response envelope
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: String,
    code: u16,
}

impl IntoResponse for GenError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_response = ErrorResponse {
            error: ErrorDetails {
                message: self.client_message(),
                r#type: self.error_type().to_owned(),
                code: status.as_u16(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}
