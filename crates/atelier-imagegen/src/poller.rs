//! Background completion loop for queued generation jobs
//!
//! One recurring timer drives a pass over all tracked jobs per tick.
//! Checks within a tick run independently of each other, but the tick
//! awaits every check before the next tick starts, so a single job is
//! never polled again while its previous check is still in flight.

use atelier_core::{RetryPolicy, retry};
use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;

use crate::error::GenError;
use crate::jobs::JobEvent;
use crate::state::GenState;
use crate::types::{GenerationJob, JobUpdate};

/// Spawn the recurring poller task
pub(crate) fn start(state: GenState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            tick(&state).await;
        }
    });
}

/// One pass over every job currently waiting on a backend handle
pub(crate) async fn tick(state: &GenState) {
    let candidates = state.inner.store.polling_candidates();
    if candidates.is_empty() {
        return;
    }

    tracing::debug!(jobs = candidates.len(), "poller tick");

    join_all(candidates.into_iter().map(|job| check_job(state, job))).await;
}

/// Check one job's backend status and apply the resulting transition
async fn check_job(state: &GenState, job: GenerationJob) {
    let Some(handle) = job.backend_job_handle.clone() else {
        return;
    };

    let Some(backend) = state.inner.orchestrator.backend(&job.backend_name) else {
        state.inner.store.transition(
            job.id,
            &JobEvent::Failed {
                reason: format!("backend '{}' is no longer configured", job.backend_name),
            },
        );
        return;
    };

    let outcome = retry::execute(&RetryPolicy::polling(), "status_check", || backend.check_status(&handle)).await;

    match outcome {
        // A rate-limited status check just waits for the next interval
        Err(GenError::RateLimited { .. }) => {
            tracing::debug!(job_id = %job.id, "status check rate limited, skipping tick");
        }
        Err(e) => {
            tracing::warn!(job_id = %job.id, error = %e, "status check failed");
            state.inner.store.transition(
                job.id,
                &JobEvent::Failed {
                    reason: "failed to check generation status".to_owned(),
                },
            );
        }
        Ok(JobUpdate::InProgress { queue_position, waiting, processing }) => {
            tracing::debug!(
                job_id = %job.id,
                queue_position = ?queue_position,
                waiting,
                processing,
                "job in progress"
            );
            state.inner.store.transition(job.id, &JobEvent::Progressed { queue_position });
        }
        Ok(JobUpdate::Faulted { reason }) => {
            tracing::warn!(job_id = %job.id, reason = %reason, "job faulted");
            state.inner.store.transition(job.id, &JobEvent::Failed { reason });
        }
        Ok(JobUpdate::Done { image }) => match state.finalize(image).await {
            Ok(asset) => {
                tracing::info!(job_id = %job.id, public_id = %asset.public_id, "queued generation completed");
                state.inner.store.transition(job.id, &JobEvent::Completed { asset: asset.clone() });
                state.persist(&job.prompt, &job.settings, &job.backend_name, &asset).await;
            }
            Err(e) => {
                // Ingestion failure is a terminal outcome for the job
                tracing::warn!(job_id = %job.id, error = %e, "finalizing queued generation failed");
                state.inner.store.transition(job.id, &JobEvent::Failed { reason: e.to_string() });
            }
        },
    }
}
