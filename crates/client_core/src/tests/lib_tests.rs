use super::*;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use serde_json::json;
use shared::domain::ProfileId;
use shared::error::ApiErrorKind;
use shared::protocol::{Credentials, JobApplication, ProfileUpdate, ResumeAttachment};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Clone, Default)]
struct BackendState {
    save_auth_headers: Arc<Mutex<Vec<Option<String>>>>,
    apply_content_types: Arc<Mutex<Vec<Option<String>>>>,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn unauthenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Not authenticated"})),
    )
        .into_response()
}

async fn get_job(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "42" => {
            // Slow enough for a navigation to "43" to overtake it.
            sleep(Duration::from_millis(80)).await;
            Json(json!({
                "id": "42",
                "title": "Senior Frontend Developer",
                "company": "TechCorp",
                "location": "Remote",
                "jobType": "Full-Time",
                "salary": "$120k",
                "description": "Build the product",
                "skills": ["react", "typescript"],
                "postedDate": "2024-03-01"
            }))
            .into_response()
        }
        "43" => Json(json!({
            "id": 43,
            "title": "Rust Engineer",
            "company": "Ferrous",
            "location": "Remote",
            "job_type": "contract",
            "posted_at": "2024-04-01T09:30:00Z"
        }))
        .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Job not found"})),
        )
            .into_response(),
    }
}

async fn get_similar(Path(id): Path<String>) -> Json<serde_json::Value> {
    let jobs: Vec<serde_json::Value> = (0..12)
        .map(|n| {
            json!({
                "id": format!("{id}-similar-{n}"),
                "title": format!("Similar job {n}"),
                "company": "TechCorp"
            })
        })
        .collect();
    Json(json!(jobs))
}

async fn get_saved(headers: HeaderMap) -> Response {
    if bearer(&headers).is_none() {
        return unauthenticated();
    }
    Json(json!(["42"])).into_response()
}

async fn save_job(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Path(_id): Path<String>,
) -> Response {
    let auth = bearer(&headers);
    state.save_auth_headers.lock().await.push(auth.clone());
    if auth.is_none() {
        return unauthenticated();
    }
    Json(json!({})).into_response()
}

async fn unsave_job(headers: HeaderMap, Path(_id): Path<String>) -> Response {
    if bearer(&headers).is_none() {
        return unauthenticated();
    }
    Json(json!({})).into_response()
}

async fn apply_job(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Path(_id): Path<String>,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state
        .apply_content_types
        .lock()
        .await
        .push(content_type.clone());

    if content_type.as_deref().is_some_and(|ct| ct.starts_with("application/json")) {
        let payload: serde_json::Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(_) => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({"detail": "invalid payload"})),
                )
                    .into_response()
            }
        };
        if payload.get("email").and_then(|v| v.as_str()).unwrap_or("").is_empty() {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"detail": "email is required"})),
            )
                .into_response();
        }
    }
    Json(json!({"message": "Application submitted successfully"})).into_response()
}

async fn token(Form(form): Form<HashMap<String, String>>) -> Response {
    if form.get("password").map(String::as_str) == Some("secret") {
        Json(json!({"access_token": "tok-1", "token_type": "bearer"})).into_response()
    } else {
        unauthenticated()
    }
}

async fn me(headers: HeaderMap) -> Response {
    if bearer(&headers).is_none() {
        return unauthenticated();
    }
    Json(json!({"id": 7, "email": "dev@example.com", "fullName": "Dev"})).into_response()
}

async fn get_profile(Path(id): Path<String>) -> Json<serde_json::Value> {
    Json(json!({
        "id": id,
        "fullName": "Dev",
        "email": "dev@example.com",
        "skills": ["rust"]
    }))
}

async fn put_profile(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<serde_json::Value>,
) -> Response {
    if bearer(&headers).is_none() {
        return unauthenticated();
    }
    Json(json!({
        "id": id,
        "fullName": update.get("full_name").and_then(|v| v.as_str()).unwrap_or("Dev"),
        "email": "dev@example.com",
        "headline": update.get("headline"),
        "skills": ["rust"]
    }))
    .into_response()
}

async fn spawn_backend() -> (String, BackendState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind backend");
    let addr = listener.local_addr().expect("local addr");
    let state = BackendState::default();
    let app = Router::new()
        .route("/jobs/saved", get(get_saved))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/similar", get(get_similar))
        .route("/jobs/:id/save", post(save_job).delete(unsave_job))
        .route("/jobs/:id/apply", post(apply_job))
        .route("/token", post(token))
        .route("/me", get(me))
        .route("/profiles/:id", get(get_profile).put(put_profile))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

fn client(base_url: &str) -> Arc<ApiClient> {
    Arc::new(ApiClient::new(base_url).expect("client"))
}

fn credentials() -> Credentials {
    Credentials {
        email: "dev@example.com".to_string(),
        password: "secret".to_string(),
    }
}

#[tokio::test]
async fn job_detail_loads_and_normalizes_the_wire_variant() {
    let (base_url, _state) = spawn_backend().await;
    let session = JobDetailSession::new(client(&base_url) as Arc<dyn JobsApi>);

    session.open(JobId::new("42")).await;
    let settled = session.job_settled().await;
    let job = settled.value().expect("job ready");

    assert_eq!(job.title, "Senior Frontend Developer");
    assert_eq!(job.company, "TechCorp");
    assert_eq!(
        job.job_type,
        Some(shared::domain::JobType::FullTime),
        "camelCase jobType normalized"
    );
    assert!(job.posted_at.is_some());
}

#[tokio::test]
async fn navigating_away_discards_the_late_response() {
    let (base_url, _state) = spawn_backend().await;
    let session = JobDetailSession::new(client(&base_url) as Arc<dyn JobsApi>);

    session.open(JobId::new("42")).await;
    assert_eq!(
        session.job_state().key().map(JobId::as_str),
        Some("42"),
        "loading state for the first id"
    );

    session.open(JobId::new("43")).await;
    let settled = session.job_settled().await;
    assert_eq!(settled.value().map(|job| job.title.as_str()), Some("Rust Engineer"));

    // The slow "42" response lands afterwards and must not win.
    sleep(Duration::from_millis(150)).await;
    assert_eq!(session.job_state().key().map(JobId::as_str), Some("43"));
}

#[tokio::test]
async fn similar_jobs_are_capped_for_display() {
    let (base_url, _state) = spawn_backend().await;
    let session = JobDetailSession::new(client(&base_url) as Arc<dyn JobsApi>);

    session.open(JobId::new("43")).await;
    assert!(session.job_settled().await.value().is_some());
    let similar = session.similar_settled().await;
    assert_eq!(similar.value().map(Vec::len), Some(SIMILAR_JOBS_LIMIT));
}

#[tokio::test]
async fn missing_job_maps_to_not_found_with_server_message() {
    let (base_url, _state) = spawn_backend().await;
    let api = client(&base_url);

    let error = api
        .fetch_job(&JobId::new("999"))
        .await
        .expect_err("missing job");
    assert_eq!(error.kind, ApiErrorKind::NotFound);
    assert_eq!(error.message, "Job not found");
    assert_eq!(error.status, Some(404));
}

#[tokio::test]
async fn bearer_header_attached_exactly_when_credential_present() {
    let (base_url, state) = spawn_backend().await;
    let api = client(&base_url);

    let error = api.save_job(&JobId::new("42")).await.expect_err("no token");
    assert_eq!(error.kind, ApiErrorKind::AuthenticationRequired);

    api.login(&credentials()).await.expect("login");
    api.save_job(&JobId::new("42")).await.expect("authorized save");

    let recorded = state.save_auth_headers.lock().await.clone();
    assert_eq!(recorded, vec![None, Some("Bearer tok-1".to_string())]);
}

#[tokio::test]
async fn login_stores_credential_and_logout_clears_it() {
    let (base_url, _state) = spawn_backend().await;
    let api = client(&base_url);

    assert!(!api.has_credential().await);
    api.login(&credentials()).await.expect("login");
    assert!(api.has_credential().await);

    let account = api.current_account().await.expect("me");
    assert_eq!(account.email, "dev@example.com");
    assert_eq!(account.id.as_str(), "7");

    api.logout().await;
    assert!(!api.has_credential().await);
}

#[tokio::test]
async fn rejected_login_does_not_store_a_credential() {
    let (base_url, _state) = spawn_backend().await;
    let api = client(&base_url);

    let error = api
        .login(&Credentials {
            email: "dev@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .expect_err("bad password");
    assert_eq!(error.kind, ApiErrorKind::AuthenticationRequired);
    assert!(!api.has_credential().await);
}

#[tokio::test]
async fn saved_membership_initialized_from_server_when_authenticated() {
    let (base_url, _state) = spawn_backend().await;
    let api = client(&base_url);
    api.login(&credentials()).await.expect("login");

    let session = JobDetailSession::new(api as Arc<dyn JobsApi>);
    session.open(JobId::new("42")).await;

    assert!(session.is_saved(&JobId::new("42")).await);
    assert!(!session.is_saved(&JobId::new("43")).await);
}

#[tokio::test]
async fn application_without_email_is_a_validation_failure() {
    let (base_url, _state) = spawn_backend().await;
    let api = client(&base_url);

    let application = JobApplication {
        full_name: "Dev".to_string(),
        email: String::new(),
        phone: None,
        cover_letter: None,
        resume: None,
    };
    let error = api
        .submit_application(&JobId::new("42"), &application)
        .await
        .expect_err("invalid application");
    assert_eq!(error.kind, ApiErrorKind::ValidationFailure);
    assert_eq!(error.message, "email is required");
}

#[tokio::test]
async fn application_uses_json_without_resume_and_multipart_with_one() {
    let (base_url, state) = spawn_backend().await;
    let api = client(&base_url);

    let mut application = JobApplication {
        full_name: "Dev".to_string(),
        email: "dev@example.com".to_string(),
        phone: None,
        cover_letter: Some("Hello".to_string()),
        resume: None,
    };
    let receipt = api
        .submit_application(&JobId::new("42"), &application)
        .await
        .expect("json apply");
    assert_eq!(
        receipt.message.as_deref(),
        Some("Application submitted successfully")
    );

    application.resume = Some(ResumeAttachment {
        filename: "resume.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        bytes: b"%PDF-1.4".to_vec(),
    });
    api.submit_application(&JobId::new("42"), &application)
        .await
        .expect("multipart apply");

    let recorded = state.apply_content_types.lock().await.clone();
    assert_eq!(recorded.len(), 2);
    assert!(recorded[0].as_deref().is_some_and(|ct| ct.starts_with("application/json")));
    assert!(recorded[1].as_deref().is_some_and(|ct| ct.starts_with("multipart/form-data")));
}

#[tokio::test]
async fn profile_update_round_trips() {
    let (base_url, _state) = spawn_backend().await;
    let api = client(&base_url);
    api.login(&credentials()).await.expect("login");

    let update = ProfileUpdate {
        full_name: Some("Dev Eloper".to_string()),
        headline: Some("Rust engineer".to_string()),
        ..ProfileUpdate::default()
    };
    let profile = api
        .update_profile(&ProfileId::new("7"), &update)
        .await
        .expect("update");
    assert_eq!(profile.full_name, "Dev Eloper");
    assert_eq!(profile.headline.as_deref(), Some("Rust engineer"));
    assert_eq!(profile.skills, vec!["rust".to_string()]);
}

#[tokio::test]
async fn search_session_fences_filter_changes() {
    let (base_url, _state) = spawn_backend().await;
    let api = client(&base_url);

    // The listing endpoint is not part of the mock backend; searches fail,
    // but the state machine must still settle on the latest filters.
    let session = JobSearchSession::new(api as Arc<dyn JobsApi>);
    let filters = JobFilters {
        search: Some("rust".to_string()),
        ..JobFilters::default()
    };
    session.search(filters.clone()).await;
    let settled = session.results_settled().await;
    assert_eq!(settled.key(), Some(&filters));
    assert!(settled.error().is_some());
}
