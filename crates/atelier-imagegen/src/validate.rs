//! Request validation and inline payload validation
//!
//! All pure; no I/O and no retries. Every rejection here happens before a
//! single network call is made.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use thiserror::Error;

use crate::error::{GenError, Result};
use crate::types::GenerationSettings;

/// Decoded payload size bounds
pub const MIN_PAYLOAD_BYTES: usize = 100;
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

const MIN_PROMPT_CHARS: usize = 3;
const MAX_PROMPT_CHARS: usize = 1000;

const MIN_DIMENSION: u32 = 64;
const MAX_DIMENSION: u32 = 2048;

const MAX_STEPS: u32 = 100;

/// Image mime types accepted in inline payloads
const ACCEPTED_TYPES: &[&str] = &["png", "jpeg", "jpg", "webp", "gif"];

/// Inline payload rejection reasons; all terminal
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload is not a data:image/...;base64 string")]
    MissingPrefix,

    #[error("unsupported image type '{0}'")]
    UnsupportedType(String),

    #[error("payload is not valid base64: {0}")]
    Decode(String),

    #[error("decoded image of {0} bytes is too small, likely truncated")]
    TooSmall(usize),

    #[error("decoded image of {0} bytes exceeds the 10 MiB limit")]
    TooLarge(usize),
}

/// An inline payload that decoded cleanly and sits within size bounds
#[derive(Debug, Clone)]
pub struct ValidatedPayload {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// Validate and decode a `data:image/<type>;base64,<body>` string
pub fn validate_data_url(payload: &str) -> std::result::Result<ValidatedPayload, PayloadError> {
    let rest = payload.strip_prefix("data:image/").ok_or(PayloadError::MissingPrefix)?;

    let (image_type, body) = rest.split_once(";base64,").ok_or(PayloadError::MissingPrefix)?;

    if !ACCEPTED_TYPES.contains(&image_type) {
        return Err(PayloadError::UnsupportedType(image_type.to_owned()));
    }

    let decoded = BASE64
        .decode(body.trim())
        .map_err(|e| PayloadError::Decode(e.to_string()))?;

    if decoded.len() < MIN_PAYLOAD_BYTES {
        return Err(PayloadError::TooSmall(decoded.len()));
    }
    if decoded.len() > MAX_PAYLOAD_BYTES {
        return Err(PayloadError::TooLarge(decoded.len()));
    }

    Ok(ValidatedPayload {
        bytes: Bytes::from(decoded),
        mime_type: format!("image/{image_type}"),
    })
}

/// Validate a prompt against the length bounds
pub fn validate_prompt(prompt: &str) -> Result<()> {
    let len = prompt.trim().chars().count();

    if len < MIN_PROMPT_CHARS {
        return Err(GenError::InvalidRequest(format!(
            "prompt must be at least {MIN_PROMPT_CHARS} characters"
        )));
    }
    if len > MAX_PROMPT_CHARS {
        return Err(GenError::InvalidRequest(format!(
            "prompt must be at most {MAX_PROMPT_CHARS} characters"
        )));
    }

    Ok(())
}

/// Validate settings and parse the size string into dimensions
pub fn validate_settings(settings: &GenerationSettings) -> Result<(u32, u32)> {
    let (width, height) = parse_size(&settings.size)?;

    if settings.steps == 0 || settings.steps > MAX_STEPS {
        return Err(GenError::InvalidRequest(format!(
            "steps must be between 1 and {MAX_STEPS}"
        )));
    }

    Ok((width, height))
}

fn parse_size(size: &str) -> Result<(u32, u32)> {
    let malformed = || GenError::InvalidRequest(format!("size '{size}' is not of the form WIDTHxHEIGHT"));

    let (w, h) = size.split_once('x').ok_or_else(malformed)?;
    let width: u32 = w.parse().map_err(|_| malformed())?;
    let height: u32 = h.parse().map_err(|_| malformed())?;

    for dimension in [width, height] {
        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&dimension) {
            return Err(GenError::InvalidRequest(format!(
                "dimensions must be between {MIN_DIMENSION} and {MAX_DIMENSION}, got {width}x{height}"
            )));
        }
    }

    Ok((width, height))
}
