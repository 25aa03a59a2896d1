//! Shared generation state: backends, job store, ingestion, persistence

use std::sync::Arc;
use std::time::Duration;

use atelier_config::{BackendKind, Config};
use atelier_core::RequestContext;
use atelier_gallery::{GalleryBridge, HttpGalleryBridge, SaveRequest, Visibility};
use atelier_ingest::{Asset, CdnUploader};
use bytes::Bytes;
use indexmap::IndexMap;
use uuid::Uuid;

use crate::backend::{self, ImageBackend};
use crate::error::{GenError, Result};
use crate::jobs::{JobEvent, JobStore};
use crate::orchestrator::Orchestrator;
use crate::types::{BackendResult, GenerationJob, GenerationRequest, GenerationSettings, ReadyImage};

/// Outcome of a submission: either a finished asset or a tracked job
#[derive(Debug)]
pub enum SubmitOutcome {
    /// A synchronous backend produced the image in-line
    Completed { backend: String, asset: Asset },
    /// A queue backend accepted the job; poll for completion
    Queued { job: GenerationJob },
}

/// Shared state for generation route handlers and the poller
#[derive(Clone)]
pub struct GenState {
    pub(crate) inner: Arc<GenStateInner>,
}

pub(crate) struct GenStateInner {
    pub(crate) orchestrator: Orchestrator,
    pub(crate) store: JobStore,
    pub(crate) uploader: CdnUploader,
    pub(crate) gallery: Option<Arc<dyn GalleryBridge>>,
    pub(crate) downloader: reqwest::Client,
    pub(crate) poll_interval: Duration,
}

impl GenState {
    /// Build generation state from configuration, constructing all
    /// backend adapters
    ///
    /// # Errors
    ///
    /// Returns an error if the CDN section is missing
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut backends: IndexMap<String, Arc<dyn ImageBackend>> = IndexMap::new();

        for (name, backend_config) in &config.imagegen.backends {
            tracing::debug!(backend = %name, kind = ?backend_config.kind, "initializing generation backend");

            let adapter: Arc<dyn ImageBackend> = match backend_config.kind {
                BackendKind::Openai => Arc::new(backend::openai::OpenAiBackend::new(name.clone(), backend_config)),
                BackendKind::Stability => {
                    Arc::new(backend::stability::StabilityBackend::new(name.clone(), backend_config))
                }
                BackendKind::Horde => Arc::new(backend::horde::HordeBackend::new(name.clone(), backend_config)),
                BackendKind::Local => Arc::new(backend::local::LocalBackend::new(name.clone(), backend_config)),
            };

            backends.insert(name.clone(), adapter);
        }

        let orchestrator = Orchestrator::new(backends, &config.imagegen);

        let cdn = config
            .cdn
            .clone()
            .ok_or_else(|| anyhow::anyhow!("a [cdn] section is required to store generated assets"))?;
        let uploader = CdnUploader::new(cdn);

        let gallery: Option<Arc<dyn GalleryBridge>> = config
            .gallery
            .clone()
            .map(|gallery_config| Arc::new(HttpGalleryBridge::new(gallery_config)) as Arc<dyn GalleryBridge>);

        let downloader = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Ok(Self {
            inner: Arc::new(GenStateInner {
                orchestrator,
                store: JobStore::new(),
                uploader,
                gallery,
                downloader,
                poll_interval: Duration::from_secs(config.imagegen.poll_interval_secs),
            }),
        })
    }

    /// Submit a generation request
    ///
    /// Runs the fallback ladder; a synchronous result is validated,
    /// ingested, and persisted before returning. A queued result becomes a
    /// tracked job, visible to the poller only once this call returns.
    pub async fn submit(&self, request: GenerationRequest, context: &RequestContext) -> Result<SubmitOutcome> {
        let (backend_name, result) = self.inner.orchestrator.orchestrate(&request, context).await?;

        match result {
            BackendResult::Ready(image) => {
                let asset = self.finalize(image).await?;
                self.persist(&request.prompt, &request.settings, &backend_name, &asset).await;

                tracing::info!(backend = %backend_name, public_id = %asset.public_id, "generation completed");

                Ok(SubmitOutcome::Completed {
                    backend: backend_name,
                    asset,
                })
            }
            BackendResult::Pending { job_handle, queue_position } => {
                let job = GenerationJob::new(&request, &backend_name);
                let id = job.id;
                self.inner.store.insert(job);

                let job = self
                    .inner
                    .store
                    .transition(id, &JobEvent::Submitted { handle: job_handle, queue_position })
                    .expect("job inserted above");

                tracing::info!(backend = %backend_name, job_id = %id, "generation queued");

                Ok(SubmitOutcome::Queued { job })
            }
        }
    }

    /// Snapshot of a tracked job
    pub fn job(&self, id: Uuid) -> Result<GenerationJob> {
        self.inner.store.get(id).ok_or(GenError::JobNotFound { id })
    }

    /// Drop interest in a job
    ///
    /// The job stops being polled; in-flight backend work continues
    /// independently since no backend cancellation call exists.
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        self.inner
            .store
            .remove(id)
            .map(|_| ())
            .ok_or(GenError::JobNotFound { id })
    }

    /// Seconds between poller ticks
    pub(crate) fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    /// Turn a ready image into a durable asset: download if needed, then
    /// ingest through the CDN
    pub(crate) async fn finalize(&self, image: ReadyImage) -> Result<Asset> {
        let (bytes, mime_type) = match image {
            ReadyImage::Bytes { bytes, mime_type } => (bytes, mime_type),
            ReadyImage::Url(url) => self.download(&url).await?,
        };

        Ok(self.inner.uploader.ingest(bytes, &mime_type).await?)
    }

    /// Download a transient image URL
    async fn download(&self, url: &str) -> Result<(Bytes, String)> {
        let connection = |message: String| GenError::Connection {
            backend: "image-download".to_owned(),
            message,
        };

        let response = self
            .inner
            .downloader
            .get(url)
            .send()
            .await
            .map_err(|e| connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenError::Backend {
                backend: "image-download".to_owned(),
                status: status.as_u16(),
                message: format!("fetching {url}"),
            });
        }

        let mime_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| "image/png".to_owned(), str::to_owned);

        let bytes = response.bytes().await.map_err(|e| connection(e.to_string()))?;

        Ok((bytes, mime_type))
    }

    /// Catalogue a finished asset in the gallery with private visibility
    ///
    /// Persistence failure never fails the generation: the asset already
    /// exists on the CDN and the caller gets its URL either way.
    pub(crate) async fn persist(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
        backend_name: &str,
        asset: &Asset,
    ) {
        let Some(ref gallery) = self.inner.gallery else {
            return;
        };

        let save_request = SaveRequest {
            prompt_text: prompt.to_owned(),
            settings: serde_json::to_value(settings).unwrap_or_default(),
            provider: backend_name.to_owned(),
            title: title_from_prompt(prompt),
            caption: format!("Generated by {backend_name}"),
            visibility: Visibility::Private,
            image_url: asset.secure_url.clone(),
        };

        match gallery.save(&save_request).await {
            Ok(record) => {
                tracing::debug!(record_id = %record.id, "generation catalogued");
            }
            Err(e) => {
                tracing::warn!(error = %e, public_id = %asset.public_id, "gallery persistence failed");
            }
        }
    }
}

/// Derive a record title from the prompt's leading characters
fn title_from_prompt(prompt: &str) -> String {
    const MAX_TITLE_CHARS: usize = 60;

    let trimmed = prompt.trim();
    if trimmed.chars().count() <= MAX_TITLE_CHARS {
        return trimmed.to_owned();
    }

    let cut: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    format!("{}…", cut.trim_end())
}
