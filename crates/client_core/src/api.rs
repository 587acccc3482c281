//! Typed HTTP client for the jobs/profile/auth backend.
//!
//! [`JobsApi`] is the seam the loaders and controllers sit on; [`ApiClient`]
//! is the reqwest-backed implementation. The bearer credential lives in an
//! explicit [`AuthContext`] owned by the client: it is written only at
//! login/logout and read by every request, and the header is omitted entirely
//! when no credential is present.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use shared::domain::{AccountSummary, Job, JobId, Profile, ProfileId};
use shared::error::{ApiErrorKind, ApiFailure};
use shared::protocol::{
    AccountWire, ApplicationReceipt, Credentials, ErrorBody, JobApplication, JobFilters,
    JobListWire, JobPage, JobWire, ProfileUpdate, ProfileWire, RegisterRequest, SavedJobsWire,
    TokenResponse,
};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// Remote operations the job screens depend on. Loaders and controllers are
/// written against this trait so tests can substitute scripted backends.
#[async_trait]
pub trait JobsApi: Send + Sync {
    async fn fetch_job(&self, id: &JobId) -> Result<Job, ApiFailure>;
    async fn fetch_similar_jobs(&self, id: &JobId) -> Result<Vec<Job>, ApiFailure>;
    async fn fetch_jobs(&self, filters: &JobFilters) -> Result<JobPage, ApiFailure>;
    async fn fetch_saved_job_ids(&self) -> Result<Vec<JobId>, ApiFailure>;
    async fn save_job(&self, id: &JobId) -> Result<(), ApiFailure>;
    async fn unsave_job(&self, id: &JobId) -> Result<(), ApiFailure>;
    async fn submit_application(
        &self,
        id: &JobId,
        application: &JobApplication,
    ) -> Result<ApplicationReceipt, ApiFailure>;
    async fn has_credential(&self) -> bool;
}

/// Holder of the process-wide bearer credential. Written once per
/// login/logout transition, read by every request.
#[derive(Default)]
pub struct AuthContext {
    token: RwLock<Option<String>>,
}

impl AuthContext {
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Arc<AuthContext>,
}

impl ApiClient {
    pub fn new(base_url: impl AsRef<str>) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .with_context(|| format!("invalid server url: {}", base_url.as_ref()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            auth: Arc::new(AuthContext::default()),
        })
    }

    pub fn auth(&self) -> Arc<AuthContext> {
        Arc::clone(&self.auth)
    }

    pub async fn set_token(&self, token: impl Into<String>) {
        self.auth.set(token.into()).await;
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth.token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiFailure> {
        let response = builder
            .send()
            .await
            .map_err(|err| ApiFailure::network(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|err| {
                ApiFailure::new(ApiErrorKind::Unknown, format!("undecodable body: {err}"))
            })
        } else {
            Err(failure_from_response(status.as_u16(), response).await)
        }
    }

    /// Like [`execute`](Self::execute) for endpoints whose success body we
    /// do not care about.
    async fn execute_unit(&self, builder: RequestBuilder) -> Result<(), ApiFailure> {
        let response = builder
            .send()
            .await
            .map_err(|err| ApiFailure::network(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(failure_from_response(status.as_u16(), response).await)
        }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AccountSummary, ApiFailure> {
        let account: AccountWire = self
            .execute(self.http.post(self.endpoint("register")).json(request))
            .await?;
        Ok(account.into())
    }

    /// Exchanges credentials for a bearer token and stores it in the
    /// [`AuthContext`]. The token endpoint takes a form-encoded body with the
    /// email in the `username` field.
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiFailure> {
        let form = [
            ("username", credentials.email.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let token: TokenResponse = self
            .execute(self.http.post(self.endpoint("token")).form(&form))
            .await?;
        self.auth.set(token.access_token.clone()).await;
        info!("credential stored after login");
        Ok(token)
    }

    pub async fn logout(&self) {
        self.auth.clear().await;
        info!("credential cleared after logout");
    }

    pub async fn current_account(&self) -> Result<AccountSummary, ApiFailure> {
        let builder = self.authorize(self.http.get(self.endpoint("me"))).await;
        let account: AccountWire = self.execute(builder).await?;
        Ok(account.into())
    }

    pub async fn fetch_profile(&self, id: &ProfileId) -> Result<Profile, ApiFailure> {
        let builder = self
            .authorize(self.http.get(self.endpoint(&format!("profiles/{id}"))))
            .await;
        let profile: ProfileWire = self.execute(builder).await?;
        Ok(profile.into())
    }

    pub async fn update_profile(
        &self,
        id: &ProfileId,
        update: &ProfileUpdate,
    ) -> Result<Profile, ApiFailure> {
        let builder = self
            .authorize(
                self.http
                    .put(self.endpoint(&format!("profiles/{id}")))
                    .json(update),
            )
            .await;
        let profile: ProfileWire = self.execute(builder).await?;
        Ok(profile.into())
    }
}

async fn failure_from_response(status: u16, response: reqwest::Response) -> ApiFailure {
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .unwrap_or_default()
        .into_message()
        .unwrap_or_else(|| format!("request failed with status {status}"));
    ApiFailure::from_status(status, message)
}

fn application_form(application: &JobApplication) -> Result<multipart::Form, ApiFailure> {
    let mut form = multipart::Form::new()
        .text("full_name", application.full_name.clone())
        .text("email", application.email.clone());
    if let Some(phone) = &application.phone {
        form = form.text("phone", phone.clone());
    }
    if let Some(cover_letter) = &application.cover_letter {
        form = form.text("cover_letter", cover_letter.clone());
    }
    if let Some(resume) = &application.resume {
        let part = multipart::Part::bytes(resume.bytes.clone())
            .file_name(resume.filename.clone())
            .mime_str(&resume.content_type)
            .map_err(|err| {
                ApiFailure::new(
                    ApiErrorKind::ValidationFailure,
                    format!("invalid resume content type: {err}"),
                )
            })?;
        form = form.part("resume", part);
    }
    Ok(form)
}

#[async_trait]
impl JobsApi for ApiClient {
    async fn fetch_job(&self, id: &JobId) -> Result<Job, ApiFailure> {
        debug!(job_id = %id, "fetching job");
        let builder = self
            .authorize(self.http.get(self.endpoint(&format!("jobs/{id}"))))
            .await;
        let job: JobWire = self.execute(builder).await?;
        Ok(job.into())
    }

    async fn fetch_similar_jobs(&self, id: &JobId) -> Result<Vec<Job>, ApiFailure> {
        debug!(job_id = %id, "fetching similar jobs");
        let builder = self
            .authorize(self.http.get(self.endpoint(&format!("jobs/{id}/similar"))))
            .await;
        let list: JobListWire = self.execute(builder).await?;
        Ok(JobPage::from(list).jobs)
    }

    async fn fetch_jobs(&self, filters: &JobFilters) -> Result<JobPage, ApiFailure> {
        let builder = self
            .authorize(self.http.get(self.endpoint("jobs")).query(filters))
            .await;
        let list: JobListWire = self.execute(builder).await?;
        Ok(list.into())
    }

    async fn fetch_saved_job_ids(&self) -> Result<Vec<JobId>, ApiFailure> {
        let builder = self
            .authorize(self.http.get(self.endpoint("jobs/saved")))
            .await;
        let saved: SavedJobsWire = self.execute(builder).await?;
        Ok(saved.into_ids())
    }

    async fn save_job(&self, id: &JobId) -> Result<(), ApiFailure> {
        let builder = self
            .authorize(
                self.http
                    .post(self.endpoint(&format!("jobs/{id}/save")))
                    .json(&serde_json::json!({})),
            )
            .await;
        self.execute_unit(builder).await
    }

    async fn unsave_job(&self, id: &JobId) -> Result<(), ApiFailure> {
        let builder = self
            .authorize(self.http.delete(self.endpoint(&format!("jobs/{id}/save"))))
            .await;
        self.execute_unit(builder).await
    }

    async fn submit_application(
        &self,
        id: &JobId,
        application: &JobApplication,
    ) -> Result<ApplicationReceipt, ApiFailure> {
        let url = self.endpoint(&format!("jobs/{id}/apply"));
        // Structured JSON unless a resume is attached, multipart then.
        let builder = if application.resume.is_some() {
            self.http.post(url).multipart(application_form(application)?)
        } else {
            self.http.post(url).json(application)
        };
        let builder = self.authorize(builder).await;
        self.execute(builder).await
    }

    async fn has_credential(&self) -> bool {
        self.auth.token().await.is_some()
    }
}
