#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

//! AI image generation orchestrator
//!
//! Accepts a text prompt, submits it to one of several heterogeneous
//! generation backends with fallback, tracks queued jobs to completion via
//! polling, validates the returned payload, and hands the bytes to the
//! content-addressed CDN ingestor.

mod backend;
mod error;
mod jobs;
mod orchestrator;
mod poller;
mod state;
mod types;
mod validate;

use atelier_core::RequestContext;
use axum::extract::{Path, State};
use axum::{Json, Router, routing};
use uuid::Uuid;

pub use error::{GenError, Result};
pub use state::{GenState, SubmitOutcome};
pub use types::{
    GenerationJob, GenerationRequest, GenerationSettings, JobStatus, JobStatusResponse, SubmitResponse,
};
pub use validate::{PayloadError, ValidatedPayload, validate_data_url};

/// Build the generation state from configuration and start the job poller
///
/// # Errors
///
/// Returns an error if backend or CDN initialization fails
pub fn build_server(config: &atelier_config::Config) -> anyhow::Result<GenState> {
    let state = GenState::from_config(config)?;
    poller::start(state.clone());
    Ok(state)
}

/// Create the endpoint router for image generation
pub fn endpoint_router() -> Router<GenState> {
    Router::new()
        .route("/v1/images/generations", routing::post(generate))
        .route("/v1/images/generations/{id}", routing::get(job_status).delete(cancel))
}

/// Handle `POST /v1/images/generations`
async fn generate(
    State(state): State<GenState>,
    axum::Extension(context): axum::Extension<RequestContext>,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<SubmitResponse>> {
    tracing::debug!(backend = %request.settings.backend, "generation submission received");

    let response = match state.submit(request, &context).await? {
        SubmitOutcome::Completed { asset, .. } => SubmitResponse {
            success: true,
            done: true,
            job_id: None,
            status: Some(JobStatus::Completed),
            progress: Some(100),
            queue_position: None,
            image_url: Some(asset.secure_url.clone()),
            asset: Some(asset),
        },
        SubmitOutcome::Queued { job } => SubmitResponse {
            success: true,
            done: false,
            job_id: Some(job.id),
            status: Some(job.status),
            progress: Some(job.progress),
            queue_position: job.queue_position,
            image_url: None,
            asset: None,
        },
    };

    Ok(Json(response))
}

/// Handle `GET /v1/images/generations/{id}`
async fn job_status(
    State(state): State<GenState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>> {
    let job = state.job(id)?;
    Ok(Json(JobStatusResponse::from(&job)))
}

/// Handle `DELETE /v1/images/generations/{id}`
///
/// Drops interest in the job; no backend cancellation exists, so backend
/// work already in flight continues independently.
async fn cancel(State(state): State<GenState>, Path(id): Path<Uuid>) -> Result<http::StatusCode> {
    state.cancel(id)?;
    Ok(http::StatusCode::NO_CONTENT)
}
