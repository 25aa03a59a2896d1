//! Job store and the job state machine
//!
//! Transitions are pure (`apply`): old state + event → new state. The
//! store applies them under its per-entry lock, so a job is only ever
//! mutated by the orchestrator at submission time or by the poller tick,
//! never both at once.

use atelier_ingest::Asset;
use dashmap::DashMap;
use uuid::Uuid;

use crate::types::{GenerationJob, JobStatus};

/// Floor for queue-derived progress estimates
const PROGRESS_FLOOR: u8 = 10;
/// Progress cap until completion is confirmed
const PROGRESS_CAP: u8 = 90;
/// Per-tick increment when the queue gives no better signal
const PROGRESS_STEP: u8 = 5;
/// Progress reported immediately after a queued submission
const SUBMITTED_PROGRESS: u8 = 20;

/// Events that move a job through its lifecycle
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Queue backend accepted the job
    Submitted {
        handle: String,
        queue_position: Option<u32>,
    },
    /// Status check found the job still in progress
    Progressed { queue_position: Option<u32> },
    /// Image ingested; job done
    Completed { asset: Asset },
    /// Job is over without an image
    Failed { reason: String },
}

/// Apply `event` to `job`, producing the next state
///
/// Terminal states are final: events against a completed or failed job
/// return it unchanged. Progress never decreases.
pub fn apply(job: &GenerationJob, event: &JobEvent) -> GenerationJob {
    if job.status.is_terminal() {
        return job.clone();
    }

    let mut next = job.clone();

    match event {
        JobEvent::Submitted { handle, queue_position } => {
            next.status = JobStatus::Generating;
            next.progress = next.progress.max(SUBMITTED_PROGRESS);
            next.backend_job_handle = Some(handle.clone());
            next.queue_position = *queue_position;
        }
        JobEvent::Progressed { queue_position } => {
            next.progress = next_progress(job.progress, *queue_position);
            next.queue_position = *queue_position;
        }
        JobEvent::Completed { asset } => {
            next.status = JobStatus::Completed;
            next.progress = 100;
            next.result_asset = Some(asset.clone());
            next.backend_job_handle = None;
            next.queue_position = None;
        }
        JobEvent::Failed { reason } => {
            next.status = JobStatus::Failed;
            next.error = Some(reason.clone());
            next.backend_job_handle = None;
            next.queue_position = None;
        }
    }

    next
}

/// Recompute progress from the queue position and the previous value
///
/// Takes the larger of a queue-derived estimate (closer to the front means
/// higher, floored) and a small monotonic increment, capped until
/// completion is confirmed. Progress can never appear to regress.
fn next_progress(previous: u8, queue_position: Option<u32>) -> u8 {
    let estimate = queue_position.map_or(0, |position| {
        let position = u8::try_from(position).unwrap_or(u8::MAX);
        PROGRESS_CAP
            .saturating_sub(position.saturating_mul(10))
            .max(PROGRESS_FLOOR)
    });

    let increment = previous.saturating_add(PROGRESS_STEP).min(PROGRESS_CAP);

    estimate.max(increment).max(previous)
}

/// In-memory job store keyed by job id
#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<Uuid, GenerationJob>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new job
    pub fn insert(&self, job: GenerationJob) {
        self.jobs.insert(job.id, job);
    }

    /// Snapshot of a job, if tracked
    pub fn get(&self, id: Uuid) -> Option<GenerationJob> {
        self.jobs.get(&id).map(|entry| entry.clone())
    }

    /// Apply an event to a tracked job, returning the new state
    pub fn transition(&self, id: Uuid, event: &JobEvent) -> Option<GenerationJob> {
        let mut entry = self.jobs.get_mut(&id)?;
        let next = apply(&entry, event);
        *entry = next.clone();
        Some(next)
    }

    /// Stop tracking a job; in-flight backend work continues independently
    pub fn remove(&self, id: Uuid) -> Option<GenerationJob> {
        self.jobs.remove(&id).map(|(_, job)| job)
    }

    /// Jobs the poller should check this tick: generating with a live handle
    pub fn polling_candidates(&self) -> Vec<GenerationJob> {
        self.jobs
            .iter()
            .filter(|entry| entry.status == JobStatus::Generating && entry.backend_job_handle.is_some())
            .map(|entry| entry.clone())
            .collect()
    }
}
