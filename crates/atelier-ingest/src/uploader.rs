use std::time::Duration;

use atelier_config::CdnConfig;
use atelier_core::{RetryPolicy, retry};
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

/// Default upload API base (Cloudinary-compatible)
const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Upper bound on an uploaded blob
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Durable result of an ingestion
#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    /// Stable identifier minted by the CDN
    pub public_id: String,
    /// Canonical HTTPS URL of the stored asset
    pub secure_url: String,
    /// Pixel width, when reported
    pub width: Option<u32>,
    /// Pixel height, when reported
    pub height: Option<u32>,
    /// Stored size in bytes, when reported
    pub byte_size: Option<u64>,
    /// Stored format (e.g. "png"), when reported
    pub format: Option<String>,
}

/// Uploads raw image bytes to the CDN and validates the response shape
pub struct CdnUploader {
    client: Client,
    config: CdnConfig,
}

impl CdnUploader {
    /// Create an uploader from configuration
    pub fn new(config: CdnConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    /// Upload `bytes` and return the stored asset
    ///
    /// Each call mints a new unique public id. Preconditions (non-empty,
    /// image type, size bound) are checked before any network call.
    pub async fn ingest(&self, bytes: Bytes, mime_type: &str) -> Result<Asset> {
        check_preconditions(&bytes, mime_type)?;

        let public_id = format!("gen_{}", uuid::Uuid::new_v4().simple());
        let url = format!(
            "{}/{}/image/upload",
            self.config
                .api_base
                .as_deref()
                .unwrap_or(DEFAULT_API_BASE)
                .trim_end_matches('/'),
            self.config.cloud_name
        );

        tracing::debug!(public_id = %public_id, size = bytes.len(), "uploading generated asset");

        let response_body = retry::execute(&RetryPolicy::default(), "cdn_upload", || {
            self.attempt_upload(&url, &public_id, bytes.clone(), mime_type)
        })
        .await?;

        validate_response(&response_body, &self.config.url_prefix)
    }

    async fn attempt_upload(
        &self,
        url: &str,
        public_id: &str,
        bytes: Bytes,
        mime_type: &str,
    ) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(public_id.to_owned())
            .mime_str(mime_type)
            .map_err(|e| IngestError::InvalidInput(format!("unparseable mime type: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.config.upload_preset.clone())
            .text("public_id", public_id.to_owned())
            .text("folder", self.config.folder.clone())
            .text("tags", "generated")
            .text("resource_type", "image");

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| IngestError::Connection(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IngestError::Connection(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(IngestError::Upload {
                status: status.as_u16(),
                message: extract_error_message(&text),
            });
        }

        Ok(text)
    }
}

fn check_preconditions(bytes: &Bytes, mime_type: &str) -> Result<()> {
    if bytes.is_empty() {
        return Err(IngestError::InvalidInput("empty image blob".to_owned()));
    }

    if !(mime_type.starts_with("image/") || mime_type == "application/octet-stream") {
        return Err(IngestError::InvalidInput(format!(
            "not an image type: {mime_type}"
        )));
    }

    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(IngestError::InvalidInput(format!(
            "blob of {} bytes exceeds the 10 MiB upload limit",
            bytes.len()
        )));
    }

    Ok(())
}

/// Pull a human-readable message out of a structured CDN error body,
/// falling back to the raw response text
fn extract_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    struct ErrorDetails {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map_or_else(|_| body.to_owned(), |parsed| parsed.error.message)
}

/// Wire shape of a successful upload response
#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
    resource_type: Option<String>,
    format: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    bytes: Option<u64>,
}

/// Validate a 2xx upload response body and convert it to an [`Asset`]
///
/// Missing required fields or a `secure_url` outside the configured prefix
/// mean the response cannot be trusted.
fn validate_response(body: &str, url_prefix: &str) -> Result<Asset> {
    let parsed: UploadResponse = serde_json::from_str(body)
        .map_err(|e| IngestError::CorruptResponse(format!("unparseable body: {e}")))?;

    let secure_url = parsed
        .secure_url
        .ok_or_else(|| IngestError::CorruptResponse("missing secure_url".to_owned()))?;
    let public_id = parsed
        .public_id
        .ok_or_else(|| IngestError::CorruptResponse("missing public_id".to_owned()))?;
    let resource_type = parsed
        .resource_type
        .ok_or_else(|| IngestError::CorruptResponse("missing resource_type".to_owned()))?;

    if resource_type != "image" {
        return Err(IngestError::CorruptResponse(format!(
            "unexpected resource_type '{resource_type}'"
        )));
    }

    if !secure_url.starts_with(url_prefix) {
        return Err(IngestError::CorruptResponse(format!(
            "secure_url '{secure_url}' outside expected prefix"
        )));
    }

    Ok(Asset {
        public_id,
        secure_url,
        width: parsed.width,
        height: parsed.height,
        byte_size: parsed.bytes,
        format: parsed.format,
    })
}
