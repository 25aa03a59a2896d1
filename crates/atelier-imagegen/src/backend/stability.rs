use std::time::Duration;

use async_trait::async_trait;
use atelier_config::BackendConfig;
use atelier_core::RequestContext;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::ImageBackend;
use crate::error::{GenError, Result};
use crate::types::{BackendResult, GenerationRequest, ReadyImage};
use crate::validate;

const DEFAULT_BASE_URL: &str = "https://api.stability.ai";

/// Synchronous backend returning raw image bytes with a content-type
/// header; no decoding needed beyond the content-type check
pub(crate) struct StabilityBackend {
    name: String,
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
}

impl StabilityBackend {
    pub fn new(name: String, config: &BackendConfig) -> Self {
        let timeout = config.timeout_secs.unwrap_or_else(|| config.kind.default_timeout_secs());

        Self {
            name,
            client: super::http_client(Duration::from_secs(timeout)),
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
        }
    }
}

#[derive(Serialize)]
struct WireRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<String>,
    width: u32,
    height: u32,
    steps: u32,
    cfg_scale: f32,
    output_format: String,
}

#[async_trait]
impl ImageBackend for StabilityBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest, context: &RequestContext) -> Result<BackendResult> {
        let (width, height) = validate::validate_settings(&request.settings)?;
        let url = format!(
            "{}/v2beta/stable-image/generate/core",
            self.base_url.trim_end_matches('/')
        );

        let wire_request = WireRequest {
            prompt: request.prompt.clone(),
            negative_prompt: request.settings.negative_prompt.clone(),
            width,
            height,
            steps: request.settings.steps,
            cfg_scale: request.settings.guidance_scale,
            output_format: "png".to_owned(),
        };

        tracing::debug!(backend = %self.name, width, height, "submitting image generation");

        let mut builder = self
            .client
            .post(&url)
            .header(http::header::ACCEPT, "image/*")
            .json(&wire_request);
        if let Some(key) = super::effective_api_key(self.api_key.as_ref(), context) {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| super::connection_error(&self.name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(backend = %self.name, status = status.as_u16(), "generation request rejected");
            return Err(super::classify_status(&self.name, status.as_u16(), body));
        }

        let mime_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .unwrap_or_default();

        if !mime_type.starts_with("image/") {
            let body = response.text().await.unwrap_or_default();
            return Err(GenError::NoImage {
                backend: self.name.clone(),
                raw: super::truncate_raw(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| super::connection_error(&self.name, &e))?;

        if bytes.is_empty() {
            return Err(GenError::NoImage {
                backend: self.name.clone(),
                raw: "empty binary response".to_owned(),
            });
        }

        Ok(BackendResult::Ready(ReadyImage::Bytes { bytes, mime_type }))
    }
}
