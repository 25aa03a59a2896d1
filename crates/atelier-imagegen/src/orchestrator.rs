//! Fallback ladder over the configured backends
//!
//! A request names one backend; the orchestrator tries it first and then
//! walks that backend's fallback ladder until a result is produced, a
//! permanent client-side error aborts the walk, or every entry has failed.

use std::collections::HashMap;
use std::sync::Arc;

use atelier_config::ImageGenConfig;
use atelier_core::{RequestContext, retry};
use indexmap::IndexMap;

use crate::backend::ImageBackend;
use crate::error::{GenError, Result};
use crate::types::{BackendResult, GenerationRequest};
use crate::validate;

pub(crate) struct Orchestrator {
    backends: IndexMap<String, Arc<dyn ImageBackend>>,
    ladders: HashMap<String, Vec<String>>,
}

impl Orchestrator {
    /// Build the orchestrator, precomputing each backend's ladder
    ///
    /// An explicit `fallback` list in configuration wins; otherwise the
    /// ladder is derived from the backend kinds' preferred fallback order,
    /// picking the first configured backend of each kind.
    pub fn new(backends: IndexMap<String, Arc<dyn ImageBackend>>, config: &ImageGenConfig) -> Self {
        let mut ladders = HashMap::new();

        for (name, backend_config) in &config.backends {
            let ladder = backend_config.fallback.clone().unwrap_or_else(|| {
                backend_config
                    .kind
                    .default_fallback()
                    .iter()
                    .filter_map(|kind| {
                        config
                            .backends
                            .iter()
                            .find(|(other, other_config)| *other != name && other_config.kind == *kind)
                            .map(|(other, _)| other.clone())
                    })
                    .collect()
            });

            ladders.insert(name.clone(), ladder);
        }

        Self { backends, ladders }
    }

    /// Look up a backend by configured name
    pub fn backend(&self, name: &str) -> Option<&Arc<dyn ImageBackend>> {
        self.backends.get(name)
    }

    /// Run the ladder for a request
    ///
    /// Validates prompt and settings before any network call, then tries
    /// each ladder entry through the retry executor. Returns the name of
    /// the backend that produced the result alongside the result itself.
    ///
    /// # Errors
    ///
    /// Fails with a validation error (no backend contacted), a
    /// ladder-aborting error from one backend, or an aggregate error
    /// naming every backend attempted.
    pub async fn orchestrate(
        &self,
        request: &GenerationRequest,
        context: &RequestContext,
    ) -> Result<(String, BackendResult)> {
        validate::validate_prompt(&request.prompt)?;
        validate::validate_settings(&request.settings)?;

        let ladder = self.ladder_for(&request.settings.backend)?;

        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<GenError> = None;

        for name in ladder {
            let backend = self.backends.get(&name).ok_or_else(|| {
                GenError::InvalidRequest(format!("backend '{name}' is not configured"))
            })?;

            let outcome = retry::execute(&backend.submission_policy(), backend.name(), || {
                backend.generate(request, context)
            })
            .await;

            match outcome {
                Ok(result) => {
                    if !attempted.is_empty() {
                        tracing::info!(
                            backend = %name,
                            failed = ?attempted,
                            "fallback backend produced a result"
                        );
                    }
                    return Ok((name, result));
                }
                Err(e) if e.aborts_ladder() => {
                    tracing::warn!(backend = %name, error = %e, "permanent error, abandoning ladder");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(backend = %name, error = %e, "backend failed, trying next ladder entry");
                    attempted.push(name);
                    last_error = Some(e);
                }
            }
        }

        Err(GenError::AllBackendsFailed {
            attempted,
            last_error: last_error.map_or_else(|| "no backends attempted".to_owned(), |e| e.to_string()),
        })
    }

    /// Resolve the ordered ladder for a requested backend
    ///
    /// An empty request selects the first configured backend.
    fn ladder_for(&self, requested: &str) -> Result<Vec<String>> {
        let primary = if requested.is_empty() {
            self.backends
                .keys()
                .next()
                .ok_or_else(|| GenError::InvalidRequest("no generation backends configured".to_owned()))?
        } else {
            self.backends
                .keys()
                .find(|name| *name == requested)
                .ok_or_else(|| GenError::InvalidRequest(format!("unknown backend '{requested}'")))?
        };

        let mut ladder = vec![primary.clone()];
        if let Some(fallback) = self.ladders.get(primary) {
            ladder.extend(fallback.iter().cloned());
        }

        Ok(ladder)
    }
}
