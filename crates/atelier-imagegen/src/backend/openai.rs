use std::time::Duration;

use async_trait::async_trait;
use atelier_config::BackendConfig;
use atelier_core::RequestContext;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::ImageBackend;
use crate::error::{GenError, Result};
use crate::types::{BackendResult, GenerationRequest, ReadyImage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "dall-e-3";

/// Synchronous backend speaking the `OpenAI` images API: structured JSON
/// response with inline base64 (`b64_json`) or a transient URL
pub(crate) struct OpenAiBackend {
    name: String,
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    default_model: String,
}

impl OpenAiBackend {
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
            default_model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
        }
    }
}

/// Wire format of the images API request
#[derive(Serialize)]
struct WireRequest {
    prompt: String,
    model: String,
    n: u32,
    size: String,
    response_format: String,
}

/// Wire format of the images API response
#[derive(Deserialize)]
struct WireResponse {
    data: Vec<WireImage>,
}

#[derive(Deserialize)]
struct WireImage {
    url: Option<String>,
    b64_json: Option<String>,
}

#[async_trait]
impl ImageBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest, context: &RequestContext) -> Result<BackendResult> {
        let url = format!("{}/images/generations", self.base_url.trim_end_matches('/'));

        let wire_request = WireRequest {
            prompt: request.prompt.clone(),
            model: request
                .settings
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            n: 1,
            size: request.settings.size.clone(),
            response_format: "b64_json".to_owned(),
        };

        tracing::debug!(backend = %self.name, model = %wire_request.model, "submitting image generation");

        let mut builder = self.client.post(&url).json(&wire_request);
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

        let body = response
            .text()
            .await
            .map_err(|e| super::connection_error(&self.name, &e))?;

        let wire: WireResponse = serde_json::from_str(&body).map_err(|_| GenError::NoImage {
            backend: self.name.clone(),
            raw: super::truncate_raw(&body),
        })?;

        let Some(image) = wire.data.into_iter().next() else {
            return Err(GenError::NoImage {
                backend: self.name.clone(),
                raw: super::truncate_raw(&body),
            });
        };

        if let Some(b64) = image.b64_json {
            // Inline payloads go through explicit validation
            return Ok(BackendResult::Ready(super::decode_image_field(&b64, "image/png")?));
        }

        if let Some(transient_url) = image.url {
            return Ok(BackendResult::Ready(ReadyImage::Url(transient_url)));
        }

        Err(GenError::NoImage {
            backend: self.name.clone(),
            raw: super::truncate_raw(&body),
        })
    }
}
