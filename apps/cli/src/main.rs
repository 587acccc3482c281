use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{ApiClient, ClientEvent, JobDetailSession, JobsApi, ResourceState};
use shared::domain::JobId;
use tracing_subscriber::EnvFilter;

/// Drives one job-detail cycle against a live backend: primary fetch,
/// similar jobs, and optionally a save/unsave toggle.
#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the jobs API, e.g. http://localhost:8000/api
    /// (falls back to JOBS_SERVER_URL)
    #[arg(long)]
    server_url: Option<String>,
    /// Job id to open
    #[arg(long)]
    job_id: String,
    /// Bearer token for authenticated endpoints (falls back to JOBS_API_TOKEN)
    #[arg(long)]
    token: Option<String>,
    /// Toggle the job's saved state after loading it
    #[arg(long)]
    toggle_save: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let server_url = args
        .server_url
        .or_else(|| std::env::var("JOBS_SERVER_URL").ok())
        .context("pass --server-url or set JOBS_SERVER_URL")?;
    let token = args
        .token
        .or_else(|| std::env::var("JOBS_API_TOKEN").ok());

    let api = ApiClient::new(&server_url)?;
    if let Some(token) = token {
        api.set_token(token).await;
    }

    let session = JobDetailSession::new(Arc::new(api) as Arc<dyn JobsApi>);
    let mut events = session.subscribe_events();

    let job_id = JobId::new(&args.job_id);
    session.open(job_id.clone()).await;

    let job = match session.job_settled().await {
        ResourceState::Ready { value, .. } => value,
        ResourceState::Failed { error, .. } => bail!("failed to load job {job_id}: {error}"),
        _ => bail!("loader finished without settling"),
    };
    println!("{}", serde_json::to_string_pretty(&job)?);

    match session.similar_settled().await {
        ResourceState::Ready { value, .. } => {
            println!("similar jobs ({}):", value.len());
            for similar in &value {
                println!("  {}: {} @ {}", similar.id, similar.title, similar.company);
            }
        }
        // A failed similar-jobs fetch never blocks the page; just skip it.
        _ => println!("similar jobs unavailable"),
    }

    if args.toggle_save {
        let saved = session.toggle_saved(&job_id).await?;
        println!("saved: {saved}");
        while let Ok(event) = events.try_recv() {
            if let ClientEvent::Notification { severity, message } = event {
                println!("[{severity:?}] {message}");
            }
        }
    }

    Ok(())
}
