//! Wire-level request and response shapes.
//!
//! The backends this client talks to disagree on field naming (`job_type`
//! vs `jobType` vs `type`, `posted_at` vs `postedDate`) and on whether ids
//! are strings or integers. Every variant is accepted here and normalized
//! into the canonical [`domain`](crate::domain) types; nothing above this
//! module sees a wire shape.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{Job, JobId, JobType, Profile, ProfileId};

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Number(value) => value.to_string(),
    })
}

fn parse_posted_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Some variants send a bare date.
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobWire {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default, alias = "companyLogo")]
    pub company_logo: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default, alias = "jobType", alias = "type")]
    pub job_type: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, alias = "postedDate", alias = "posted_date")]
    pub posted_at: Option<String>,
}

impl From<JobWire> for Job {
    fn from(wire: JobWire) -> Self {
        Self {
            id: JobId(wire.id),
            title: wire.title,
            company: wire.company,
            company_logo: wire.company_logo,
            location: wire.location,
            job_type: wire.job_type.as_deref().map(JobType::parse),
            salary: wire.salary,
            description: wire.description,
            responsibilities: wire.responsibilities,
            requirements: wire.requirements,
            benefits: wire.benefits,
            skills: wire.skills,
            posted_at: wire.posted_at.as_deref().and_then(parse_posted_at),
        }
    }
}

/// Listing endpoints return either a bare array or a paged envelope,
/// depending on the backend variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JobListWire {
    Paged {
        jobs: Vec<JobWire>,
        #[serde(default)]
        total: Option<u64>,
        #[serde(default)]
        page: Option<u32>,
    },
    Bare(Vec<JobWire>),
}

impl From<JobListWire> for JobPage {
    fn from(wire: JobListWire) -> Self {
        match wire {
            JobListWire::Paged { jobs, total, page } => Self {
                jobs: jobs.into_iter().map(Job::from).collect(),
                total,
                page,
            },
            JobListWire::Bare(jobs) => Self {
                jobs: jobs.into_iter().map(Job::from).collect(),
                total: None,
                page: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: Option<u64>,
    pub page: Option<u32>,
}

/// The saved-jobs endpoint returns bare identifiers on some deployments and
/// full job objects on others; membership only needs the ids.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SavedJobsWire {
    Jobs(Vec<JobWire>),
    Ids(Vec<SavedIdWire>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavedIdWire(#[serde(deserialize_with = "id_string")] pub String);

impl SavedJobsWire {
    pub fn into_ids(self) -> Vec<JobId> {
        match self {
            Self::Jobs(jobs) => jobs.into_iter().map(|job| JobId(job.id)).collect(),
            Self::Ids(ids) => ids.into_iter().map(|id| JobId(id.0)).collect(),
        }
    }
}

/// Listing/search query. Serialized straight into the query string; empty
/// fields are omitted rather than sent blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct JobFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountWire {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub email: String,
    #[serde(default, alias = "fullName", alias = "name")]
    pub full_name: Option<String>,
}

impl From<AccountWire> for crate::domain::AccountSummary {
    fn from(wire: AccountWire) -> Self {
        Self {
            id: crate::domain::UserId(wire.id),
            email: wire.email,
            full_name: wire.full_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileWire {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, alias = "fullName", alias = "name")]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl From<ProfileWire> for Profile {
    fn from(wire: ProfileWire) -> Self {
        Self {
            id: ProfileId(wire.id),
            full_name: wire.full_name,
            email: wire.email,
            headline: wire.headline,
            location: wire.location,
            skills: wire.skills,
            bio: wire.bio,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobApplication {
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,
    #[serde(skip)]
    pub resume: Option<ResumeAttachment>,
}

#[derive(Debug, Clone)]
pub struct ResumeAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationReceipt {
    #[serde(default)]
    pub message: Option<String>,
}

/// Error payload mined from non-2xx bodies; FastAPI-style `detail` and the
/// older `message` field are both accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.detail.or(self.message)
    }
}
