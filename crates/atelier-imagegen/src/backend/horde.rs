use std::time::Duration;

use async_trait::async_trait;
use atelier_config::BackendConfig;
use atelier_core::{RequestContext, RetryPolicy};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::ImageBackend;
use crate::error::{GenError, Result};
use crate::types::{BackendResult, GenerationRequest, JobUpdate};
use crate::validate;

const DEFAULT_BASE_URL: &str = "https://aihorde.net/api";

/// Queue-based backend: submission returns a job handle immediately and
/// the image is fetched later via status polling
pub(crate) struct HordeBackend {
    name: String,
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    default_model: Option<String>,
}

impl HordeBackend {
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
            default_model: config.model.clone(),
        }
    }

    fn key_header<'a>(&'a self, context: &'a RequestContext) -> Option<&'a SecretString> {
        super::effective_api_key(self.api_key.as_ref(), context)
    }
}

#[derive(Serialize)]
struct WireSubmit {
    prompt: String,
    params: WireParams,
    nsfw: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    models: Vec<String>,
}

#[derive(Serialize)]
struct WireParams {
    width: u32,
    height: u32,
    steps: u32,
    cfg_scale: f32,
}

#[derive(Deserialize)]
struct WireSubmitResponse {
    id: String,
    #[serde(default)]
    kudos: f64,
}

#[derive(Deserialize)]
struct WireStatus {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    faulted: bool,
    #[serde(default)]
    waiting: u32,
    #[serde(default)]
    processing: u32,
    #[serde(default)]
    finished: u32,
    #[serde(default)]
    queue_position: Option<u32>,
    #[serde(default)]
    kudos: f64,
    #[serde(default)]
    generations: Vec<WireGeneration>,
}

#[derive(Deserialize)]
struct WireGeneration {
    img: String,
}

#[async_trait]
impl ImageBackend for HordeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    /// The queue enforces its own rate limiting, so submission retries
    /// stay conservative
    fn submission_policy(&self) -> RetryPolicy {
        RetryPolicy::submission()
    }

    async fn generate(&self, request: &GenerationRequest, context: &RequestContext) -> Result<BackendResult> {
        let (width, height) = validate::validate_settings(&request.settings)?;
        let url = format!("{}/v2/generate/async", self.base_url.trim_end_matches('/'));

        let prompt = match request.settings.negative_prompt {
            // The queue's wire format folds the negative prompt into the
            // prompt string after a "###" separator
            Some(ref negative) => format!("{} ### {negative}", request.prompt),
            None => request.prompt.clone(),
        };

        let wire_request = WireSubmit {
            prompt,
            params: WireParams {
                width,
                height,
                steps: request.settings.steps,
                cfg_scale: request.settings.guidance_scale,
            },
            nsfw: false,
            models: request
                .settings
                .model
                .clone()
                .or_else(|| self.default_model.clone())
                .into_iter()
                .collect(),
        };

        tracing::debug!(backend = %self.name, "submitting queued generation");

        let mut builder = self.client.post(&url).json(&wire_request);
        if let Some(key) = self.key_header(context) {
            builder = builder.header("apikey", key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| super::connection_error(&self.name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(backend = %self.name, status = status.as_u16(), "queued submission rejected");
            return Err(super::classify_status(&self.name, status.as_u16(), body));
        }

        let accepted: WireSubmitResponse = response
            .json()
            .await
            .map_err(|e| super::connection_error(&self.name, &e))?;

        tracing::debug!(
            backend = %self.name,
            handle = %accepted.id,
            kudos = accepted.kudos,
            "generation queued"
        );

        Ok(BackendResult::Pending {
            job_handle: accepted.id,
            queue_position: None,
        })
    }

    async fn check_status(&self, handle: &str) -> Result<JobUpdate> {
        let url = format!("{}/v2/generate/status/{handle}", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
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

        let wire: WireStatus = serde_json::from_str(&body).map_err(|_| GenError::Connection {
            backend: self.name.clone(),
            message: format!("unparseable status body: {}", super::truncate_raw(&body)),
        })?;

        if wire.faulted {
            return Ok(JobUpdate::Faulted {
                reason: "backend reported the job as faulted".to_owned(),
            });
        }

        if wire.done {
            let Some(generation) = wire.generations.first() else {
                return Err(GenError::NoImage {
                    backend: self.name.clone(),
                    raw: super::truncate_raw(&body),
                });
            };

            // `img` may be a URL or (possibly bare) base64 webp
            let image = super::decode_image_field(&generation.img, "image/webp")?;
            return Ok(JobUpdate::Done { image });
        }

        tracing::debug!(
            backend = %self.name,
            handle,
            waiting = wire.waiting,
            processing = wire.processing,
            finished = wire.finished,
            queue_position = ?wire.queue_position,
            kudos = wire.kudos,
            "job still in progress"
        );

        Ok(JobUpdate::InProgress {
            queue_position: wire.queue_position,
            waiting: wire.waiting,
            processing: wire.processing,
        })
    }
}
