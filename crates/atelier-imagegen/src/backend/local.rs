use std::time::Duration;

use async_trait::async_trait;
use atelier_config::BackendConfig;
use atelier_core::RequestContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ImageBackend;
use crate::error::{GenError, Result};
use crate::types::{BackendResult, GenerationRequest};
use crate::validate;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7860";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Self-hosted inference backend
///
/// The server's submission surface is not guaranteed: before submitting,
/// the adapter probes for an sdapi-compatible endpoint and prefers it when
/// detected, otherwise falls back to a minimal request shape. Response
/// field names are tried in priority order before concluding no image was
/// produced.
pub(crate) struct LocalBackend {
    name: String,
    client: reqwest::Client,
    probe_client: reqwest::Client,
    base_url: String,
    default_model: Option<String>,
}

impl LocalBackend {
    pub fn new(name: String, config: &BackendConfig) -> Self {
        let timeout = config.timeout_secs.unwrap_or_else(|| config.kind.default_timeout_secs());

        Self {
            name,
            client: super::http_client(Duration::from_secs(timeout)),
            probe_client: super::http_client(PROBE_TIMEOUT),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            default_model: config.model.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Probe the server for an sdapi-compatible submission surface and for
    /// the configured model being served
    async fn probe(&self) -> ProbeResult {
        let sdapi = matches!(
            self.probe_client.get(self.url("/sdapi/v1/options")).send().await,
            Ok(ref response) if response.status().is_success()
        );

        let mut serves_model = true;
        if !sdapi
            && let Some(ref model) = self.default_model
            && let Ok(response) = self.probe_client.get(self.url("/api/tags")).send().await
            && let Ok(tags) = response.json::<Value>().await
        {
            serves_model = tags["models"]
                .as_array()
                .is_some_and(|models| {
                    models
                        .iter()
                        .any(|m| m["name"].as_str().is_some_and(|n| n.starts_with(model.as_str())))
                });
        }

        ProbeResult { sdapi, serves_model }
    }

    async fn generate_sdapi(&self, request: &GenerationRequest, width: u32, height: u32) -> Result<BackendResult> {
        let wire_request = SdapiRequest {
            prompt: request.prompt.clone(),
            negative_prompt: request.settings.negative_prompt.clone().unwrap_or_default(),
            width,
            height,
            steps: request.settings.steps,
            cfg_scale: request.settings.guidance_scale,
        };

        let response = self
            .client
            .post(self.url("/sdapi/v1/txt2img"))
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| super::connection_error(&self.name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(super::classify_status(&self.name, status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| super::connection_error(&self.name, &e))?;

        self.extract_image(&body)
    }

    async fn generate_minimal(&self, request: &GenerationRequest) -> Result<BackendResult> {
        let wire_request = MinimalRequest {
            model: self.default_model.clone(),
            prompt: request.prompt.clone(),
            stream: false,
        };

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| super::connection_error(&self.name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(super::classify_status(&self.name, status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| super::connection_error(&self.name, &e))?;

        self.extract_image(&body)
    }

    /// Try the known response field names in priority order
    fn extract_image(&self, body: &str) -> Result<BackendResult> {
        let parsed: Value = serde_json::from_str(body).map_err(|_| GenError::NoImage {
            backend: self.name.clone(),
            raw: super::truncate_raw(body),
        })?;

        let candidates = [
            &parsed["images"][0],
            &parsed["image"],
            &parsed["data"][0]["b64_json"],
        ];

        for candidate in candidates {
            if let Some(value) = candidate.as_str()
                && !value.is_empty()
            {
                return Ok(BackendResult::Ready(super::decode_image_field(value, "image/png")?));
            }
        }

        // The raw body goes into the error so the caller can diagnose the
        // unrecognized response shape
        Err(GenError::NoImage {
            backend: self.name.clone(),
            raw: super::truncate_raw(body),
        })
    }
}

struct ProbeResult {
    sdapi: bool,
    serves_model: bool,
}

#[derive(Serialize)]
struct SdapiRequest {
    prompt: String,
    negative_prompt: String,
    width: u32,
    height: u32,
    steps: u32,
    cfg_scale: f32,
}

#[derive(Serialize, Deserialize)]
struct MinimalRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    prompt: String,
    stream: bool,
}

#[async_trait]
impl ImageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest, _context: &RequestContext) -> Result<BackendResult> {
        let (width, height) = validate::validate_settings(&request.settings)?;

        let probe = self.probe().await;

        if !probe.serves_model {
            tracing::warn!(
                backend = %self.name,
                model = ?self.default_model,
                "configured model not advertised by the server, submitting anyway"
            );
        }

        if probe.sdapi {
            tracing::debug!(backend = %self.name, "compatible sdapi surface detected");
            self.generate_sdapi(request, width, height).await
        } else {
            tracing::debug!(backend = %self.name, "falling back to minimal submission shape");
            self.generate_minimal(request).await
        }
    }
}
