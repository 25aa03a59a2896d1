use http::StatusCode;
use atelier_core::{HttpError, Retryable};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// CDN ingestion errors
///
/// Every upload-side failure is prefixed with "cdn upload failed" so a
/// caller never confuses a CDN fault with a generation-backend fault.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Precondition violated before any network call was made
    #[error("invalid upload input: {0}")]
    InvalidInput(String),

    /// CDN returned a non-2xx status
    #[error("cdn upload failed ({status}): {message}")]
    Upload { status: u16, message: String },

    /// Request could not be sent or the response body could not be read
    #[error("cdn upload failed: {0}")]
    Connection(String),

    /// 2xx response missing required fields or carrying an unexpected URL
    #[error("cdn upload failed: corrupt response: {0}")]
    CorruptResponse(String),
}

impl Retryable for IngestError {
    fn is_terminal(&self) -> bool {
        match self {
            Self::InvalidInput(_) | Self::CorruptResponse(_) => true,
            Self::Upload { status, .. } => (400..500).contains(status) && *status != 429,
            Self::Connection(_) => false,
        }
    }
}

impl HttpError for IngestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Upload { status, .. } => match *status {
                429 => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Connection(_) | Self::CorruptResponse(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidInput(_) => "invalid_request_error",
            Self::Upload { .. } | Self::Connection(_) | Self::CorruptResponse(_) => "cdn_error",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}
