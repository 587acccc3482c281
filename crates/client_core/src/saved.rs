//! Optimistic saved/unsaved membership.
//!
//! Membership flips locally before the remote call resolves; a remote
//! failure rolls the flip back and emits a single error notification. A
//! toggle for a job whose previous toggle is still in flight is rejected,
//! so once everything settles the booleans always match the last accepted
//! user intent.

use std::collections::HashSet;
use std::sync::Arc;

use shared::domain::JobId;
use shared::error::ApiFailure;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::api::JobsApi;
use crate::{ClientEvent, Severity};

#[derive(Debug, Error)]
pub enum ToggleError {
    #[error("saved state has not been initialized")]
    NotInitialized,
    #[error("a save request for this job is already in flight")]
    InFlight,
    #[error(transparent)]
    Api(#[from] ApiFailure),
}

#[derive(Default)]
struct Membership {
    initialized: bool,
    saved: HashSet<JobId>,
    in_flight: HashSet<JobId>,
}

pub struct SavedJobsController {
    api: Arc<dyn JobsApi>,
    inner: Mutex<Membership>,
    events: broadcast::Sender<ClientEvent>,
}

impl SavedJobsController {
    pub fn new(api: Arc<dyn JobsApi>, events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            api,
            inner: Mutex::new(Membership::default()),
            events,
        }
    }

    /// Best-effort initialization from the saved-jobs endpoint. Without a
    /// credential no network call is made and everything defaults to
    /// unsaved; a failed check is logged and likewise defaults to unsaved.
    /// Idempotent: later calls are no-ops.
    pub async fn initialize(&self) {
        {
            let inner = self.inner.lock().await;
            if inner.initialized {
                return;
            }
        }

        if !self.api.has_credential().await {
            debug!("no credential; skipping saved-jobs check");
            self.inner.lock().await.initialized = true;
            return;
        }

        let saved = match self.api.fetch_saved_job_ids().await {
            Ok(ids) => ids.into_iter().collect(),
            Err(error) => {
                warn!(%error, "saved-jobs check failed; defaulting to unsaved");
                HashSet::new()
            }
        };

        let mut inner = self.inner.lock().await;
        inner.saved = saved;
        inner.initialized = true;
    }

    pub async fn is_saved(&self, id: &JobId) -> bool {
        self.inner.lock().await.saved.contains(id)
    }

    /// Flips the membership of `id` and returns the new value. The flip is
    /// applied before the remote call; on remote failure it is reverted and
    /// one error notification is emitted.
    pub async fn toggle(&self, id: &JobId) -> Result<bool, ToggleError> {
        let desired = {
            let mut inner = self.inner.lock().await;
            if !inner.initialized {
                return Err(ToggleError::NotInitialized);
            }
            if !inner.in_flight.insert(id.clone()) {
                return Err(ToggleError::InFlight);
            }
            let desired = !inner.saved.contains(id);
            if desired {
                inner.saved.insert(id.clone());
            } else {
                inner.saved.remove(id);
            }
            desired
        };
        self.emit(ClientEvent::SavedChanged {
            job_id: id.clone(),
            saved: desired,
        });

        let result = if desired {
            self.api.save_job(id).await
        } else {
            self.api.unsave_job(id).await
        };

        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(id);
        match result {
            Ok(()) => {
                let message = if desired {
                    "Job saved"
                } else {
                    "Job removed from saved jobs"
                };
                drop(inner);
                self.emit(ClientEvent::Notification {
                    severity: Severity::Success,
                    message: message.to_string(),
                });
                Ok(desired)
            }
            Err(error) => {
                // Roll back to the pre-toggle value.
                if desired {
                    inner.saved.remove(id);
                } else {
                    inner.saved.insert(id.clone());
                }
                drop(inner);
                warn!(job_id = %id, %error, "save toggle failed; rolled back");
                self.emit(ClientEvent::SavedChanged {
                    job_id: id.clone(),
                    saved: !desired,
                });
                self.emit(ClientEvent::Notification {
                    severity: Severity::Error,
                    message: "Error saving job".to_string(),
                });
                Err(ToggleError::Api(error))
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}
