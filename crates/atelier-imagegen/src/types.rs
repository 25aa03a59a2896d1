use atelier_ingest::Asset;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-facing generation request; immutable once submitted
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationRequest {
    /// Text description of the desired image (3–1000 characters)
    pub prompt: String,
    /// Generation parameters
    #[serde(default)]
    pub settings: GenerationSettings,
}

/// Generation parameters, validated before any network call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationSettings {
    /// Name of the configured backend to try first; empty selects the
    /// first configured backend
    #[serde(default)]
    pub backend: String,
    /// Model name; backends fall back to their configured default
    #[serde(default)]
    pub model: Option<String>,
    /// Target size as `WIDTHxHEIGHT`, each dimension 64–2048
    #[serde(default = "default_size")]
    pub size: String,
    /// Diffusion step count (1–100)
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Classifier-free guidance scale
    #[serde(default = "default_guidance")]
    pub guidance_scale: f32,
    /// Things the image should not contain
    #[serde(default)]
    pub negative_prompt: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            backend: String::new(),
            model: None,
            size: default_size(),
            steps: default_steps(),
            guidance_scale: default_guidance(),
            negative_prompt: None,
        }
    }
}

fn default_size() -> String {
    "512x512".to_owned()
}

fn default_steps() -> u32 {
    30
}

fn default_guidance() -> f32 {
    7.5
}

/// A produced image in whichever form the backend handed it over
#[derive(Debug, Clone)]
pub enum ReadyImage {
    /// Decoded bytes with their mime type
    Bytes { bytes: Bytes, mime_type: String },
    /// Transient URL to download before ingestion
    Url(String),
}

/// Adapter-to-orchestrator result of a generation call
#[derive(Debug, Clone)]
pub enum BackendResult {
    /// Image produced synchronously
    Ready(ReadyImage),
    /// Job accepted by a queue-based backend; poll to completion
    Pending {
        job_handle: String,
        queue_position: Option<u32>,
    },
}

/// Status report for a queued job
#[derive(Debug, Clone)]
pub enum JobUpdate {
    /// Still queued or rendering
    InProgress {
        queue_position: Option<u32>,
        waiting: u32,
        processing: u32,
    },
    /// Finished with an image
    Done { image: ReadyImage },
    /// Backend reported a fault; no image will be produced
    Faulted { reason: String },
}

/// Job lifecycle states; `Completed` and `Failed` are final
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl JobStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A tracked generation job, owned by the submitting caller's session
///
/// Exactly one of `backend_job_handle` (while pending on an async backend)
/// or `result_asset`/`error` (once terminal) is meaningful at a time.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: Uuid,
    pub prompt: String,
    pub settings: GenerationSettings,
    pub status: JobStatus,
    /// 0–100, never decreasing
    pub progress: u8,
    /// Backend the job is queued on
    pub backend_name: String,
    pub backend_job_handle: Option<String>,
    pub queue_position: Option<u32>,
    pub result_asset: Option<Asset>,
    pub error: Option<String>,
}

impl GenerationJob {
    /// Create a fresh job at submission time
    pub fn new(request: &GenerationRequest, backend_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: request.prompt.clone(),
            settings: request.settings.clone(),
            status: JobStatus::Pending,
            progress: 0,
            backend_name: backend_name.to_owned(),
            backend_job_handle: None,
            queue_position: None,
            result_asset: None,
            error: None,
        }
    }
}

/// Response to a submission request
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<Asset>,
}

/// Response to a status query
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub success: bool,
    pub done: bool,
    pub waiting: bool,
    pub processing: bool,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&GenerationJob> for JobStatusResponse {
    fn from(job: &GenerationJob) -> Self {
        Self {
            success: job.status != JobStatus::Failed,
            done: job.status.is_terminal(),
            waiting: job.status == JobStatus::Pending,
            processing: job.status == JobStatus::Generating,
            status: job.status,
            progress: job.progress,
            queue_position: job.queue_position,
            image_url: job.result_asset.as_ref().map(|a| a.secure_url.clone()),
            error: job.error.clone(),
        }
    }
}
