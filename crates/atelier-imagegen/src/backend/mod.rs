pub(crate) mod horde;
pub(crate) mod local;
pub(crate) mod openai;
pub(crate) mod stability;

use std::time::Duration;

use async_trait::async_trait;
use atelier_core::{RequestContext, RetryPolicy};
use secrecy::SecretString;

use crate::error::{GenError, Result};
use crate::types::{BackendResult, GenerationRequest, JobUpdate, ReadyImage};
use crate::validate;

/// Common contract every generation backend adapter implements
///
/// `generate` translates the common `(prompt, settings)` request into the
/// backend's wire contract and its response into a [`BackendResult`]:
/// either a ready image or a pending job handle.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Configured backend name
    fn name(&self) -> &str;

    /// Retry policy for submission calls against this backend
    fn submission_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Submit a generation request
    async fn generate(&self, request: &GenerationRequest, context: &RequestContext) -> Result<BackendResult>;

    /// Query the status of a previously returned job handle
    ///
    /// Only meaningful for queue-based backends.
    async fn check_status(&self, _handle: &str) -> Result<JobUpdate> {
        Err(GenError::InvalidRequest(format!(
            "backend '{}' does not queue jobs",
            self.name()
        )))
    }
}

/// Build a reqwest client with the backend's fixed timeout
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Prefer a caller-supplied API key over the configured one
pub(crate) fn effective_api_key<'a>(
    configured: Option<&'a SecretString>,
    context: &'a RequestContext,
) -> Option<&'a SecretString> {
    context.api_key.as_ref().or(configured)
}

/// Map a non-2xx backend status to a typed error at the point it is known
pub(crate) fn classify_status(backend: &str, status: u16, body: String) -> GenError {
    match status {
        401 => GenError::Unauthorized {
            backend: backend.to_owned(),
            message: body,
        },
        429 => GenError::RateLimited {
            backend: backend.to_owned(),
        },
        _ => GenError::Backend {
            backend: backend.to_owned(),
            status,
            message: body,
        },
    }
}

/// Map a reqwest transport failure (timeout included) to a typed error
pub(crate) fn connection_error(backend: &str, error: &reqwest::Error) -> GenError {
    GenError::Connection {
        backend: backend.to_owned(),
        message: error.to_string(),
    }
}

/// Interpret an image field that may hold a URL, a data URL, or bare base64
///
/// Bare base64 is wrapped with `assumed_mime` before validation so the
/// size and decode checks still apply.
pub(crate) fn decode_image_field(value: &str, assumed_mime: &str) -> Result<ReadyImage> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(ReadyImage::Url(value.to_owned()));
    }

    let data_url;
    let candidate = if value.starts_with("data:") {
        value
    } else {
        data_url = format!("data:{assumed_mime};base64,{value}");
        &data_url
    };

    let payload = validate::validate_data_url(candidate)?;
    Ok(ReadyImage::Bytes {
        bytes: payload.bytes,
        mime_type: payload.mime_type,
    })
}

/// Truncate a raw backend response for inclusion in a diagnostic error
pub(crate) fn truncate_raw(body: &str) -> String {
    const MAX: usize = 600;
    if body.len() <= MAX {
        return body.to_owned();
    }

    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_is_typed() {
        assert!(matches!(
            classify_status("a", 401, String::new()),
            GenError::Unauthorized { .. }
        ));
        assert!(matches!(
            classify_status("a", 429, String::new()),
            GenError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status("a", 503, String::new()),
            GenError::Backend { status: 503, .. }
        ));
    }

    #[test]
    fn image_field_dispatches_on_shape() {
        let url = decode_image_field("https://cdn.example/img.png", "image/png").unwrap();
        assert!(matches!(url, ReadyImage::Url(_)));

        use base64::Engine as _;
        let b64 = base64::engine::general_purpose::STANDARD.encode(vec![1_u8; 500]);

        let bare = decode_image_field(&b64, "image/webp").unwrap();
        assert!(matches!(bare, ReadyImage::Bytes { ref mime_type, .. } if mime_type == "image/webp"));

        let prefixed = decode_image_field(&format!("data:image/png;base64,{b64}"), "image/webp").unwrap();
        assert!(matches!(prefixed, ReadyImage::Bytes { ref mime_type, .. } if mime_type == "image/png"));
    }
}
