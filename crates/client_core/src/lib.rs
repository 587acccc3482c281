//! Client core for the remote-jobs product: typed API client plus the
//! view-state machinery the job screens run on. A page owns a session;
//! a session owns its loaders and controllers; nothing is shared across
//! sessions except the credential inside the API client.

use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{Job, JobId};
use shared::error::ApiFailure;
use shared::protocol::{ApplicationReceipt, JobApplication, JobFilters, JobPage};
use tokio::sync::{broadcast, watch};
use tracing::info;

pub mod api;
pub mod coordinator;
pub mod loader;
pub mod saved;

pub use api::{ApiClient, AuthContext, JobsApi};
pub use coordinator::DependentFetchCoordinator;
pub use loader::{ResourceFetcher, ResourceLoader, ResourceState};
pub use saved::{SavedJobsController, ToggleError};

/// How many similar jobs the detail page exposes, regardless of how many
/// the server returns.
pub const SIMILAR_JOBS_LIMIT: usize = 5;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Out-of-band feedback for the view layer (the snackbar analog).
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Notification { severity: Severity, message: String },
    SavedChanged { job_id: JobId, saved: bool },
}

struct JobFetcher {
    api: Arc<dyn JobsApi>,
}

#[async_trait]
impl ResourceFetcher<JobId, Job> for JobFetcher {
    async fn fetch(&self, key: &JobId) -> Result<Job, ApiFailure> {
        self.api.fetch_job(key).await
    }
}

struct SimilarJobsFetcher {
    api: Arc<dyn JobsApi>,
}

#[async_trait]
impl ResourceFetcher<JobId, Vec<Job>> for SimilarJobsFetcher {
    async fn fetch(&self, key: &JobId) -> Result<Vec<Job>, ApiFailure> {
        self.api.fetch_similar_jobs(key).await
    }
}

struct JobPageFetcher {
    api: Arc<dyn JobsApi>,
}

#[async_trait]
impl ResourceFetcher<JobFilters, JobPage> for JobPageFetcher {
    async fn fetch(&self, key: &JobFilters) -> Result<JobPage, ApiFailure> {
        self.api.fetch_jobs(key).await
    }
}

/// State for one job-detail page: the primary job, the similar-jobs section
/// that depends on it, and the saved/unsaved toggle.
pub struct JobDetailSession {
    api: Arc<dyn JobsApi>,
    job: ResourceLoader<JobId, Job>,
    similar: DependentFetchCoordinator<JobId, Job>,
    saved: SavedJobsController,
    events: broadcast::Sender<ClientEvent>,
}

impl JobDetailSession {
    pub fn new(api: Arc<dyn JobsApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let job = ResourceLoader::new(Arc::new(JobFetcher {
            api: Arc::clone(&api),
        }) as Arc<dyn ResourceFetcher<JobId, Job>>);
        let similar = DependentFetchCoordinator::spawn(
            job.subscribe(),
            Arc::new(SimilarJobsFetcher {
                api: Arc::clone(&api),
            }) as Arc<dyn ResourceFetcher<JobId, Vec<Job>>>,
            SIMILAR_JOBS_LIMIT,
        );
        let saved = SavedJobsController::new(Arc::clone(&api), events.clone());
        Arc::new(Self {
            api,
            job,
            similar,
            saved,
            events,
        })
    }

    /// Starts the page cycle for `job_id`: primary fetch, best-effort saved
    /// membership check. Navigating to a new id just calls this again; any
    /// in-flight result for the previous id is discarded.
    pub async fn open(&self, job_id: JobId) {
        info!(job_id = %job_id, "opening job detail");
        self.job.load(job_id).await;
        self.saved.initialize().await;
    }

    /// Drops interest in everything in flight.
    pub async fn close(&self) {
        self.job.cancel().await;
        self.similar.cancel().await;
    }

    pub fn job_state(&self) -> ResourceState<JobId, Job> {
        self.job.current()
    }

    pub async fn job_settled(&self) -> ResourceState<JobId, Job> {
        self.job.settled().await
    }

    pub fn subscribe_job(&self) -> watch::Receiver<ResourceState<JobId, Job>> {
        self.job.subscribe()
    }

    pub fn similar_state(&self) -> ResourceState<JobId, Vec<Job>> {
        self.similar.current()
    }

    pub async fn similar_settled(&self) -> ResourceState<JobId, Vec<Job>> {
        self.similar.settled().await
    }

    pub fn subscribe_similar(&self) -> watch::Receiver<ResourceState<JobId, Vec<Job>>> {
        self.similar.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn is_saved(&self, id: &JobId) -> bool {
        self.saved.is_saved(id).await
    }

    pub async fn toggle_saved(&self, id: &JobId) -> Result<bool, ToggleError> {
        self.saved.toggle(id).await
    }

    pub async fn apply(
        &self,
        id: &JobId,
        application: &JobApplication,
    ) -> Result<ApplicationReceipt, ApiFailure> {
        info!(job_id = %id, "submitting application");
        self.api.submit_application(id, application).await
    }
}

/// State for the listing/search screen: one loader keyed by the filter set,
/// with the same stale-response fencing as the detail page.
pub struct JobSearchSession {
    results: ResourceLoader<JobFilters, JobPage>,
}

impl JobSearchSession {
    pub fn new(api: Arc<dyn JobsApi>) -> Arc<Self> {
        let results = ResourceLoader::new(
            Arc::new(JobPageFetcher { api }) as Arc<dyn ResourceFetcher<JobFilters, JobPage>>
        );
        Arc::new(Self { results })
    }

    pub async fn search(&self, filters: JobFilters) {
        self.results.load(filters).await;
    }

    pub fn results_state(&self) -> ResourceState<JobFilters, JobPage> {
        self.results.current()
    }

    pub async fn results_settled(&self) -> ResourceState<JobFilters, JobPage> {
        self.results.settled().await
    }

    pub fn subscribe_results(&self) -> watch::Receiver<ResourceState<JobFilters, JobPage>> {
        self.results.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/loader_tests.rs"]
mod loader_tests;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
