use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(JobId);
id_newtype!(UserId);
id_newtype!(ProfileId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Internship,
    Freelance,
    Other(String),
}

impl JobType {
    /// Normalizes the free-form strings the backends emit ("Full-time",
    /// "full_time", "FULL TIME") into one canonical variant.
    pub fn parse(raw: &str) -> Self {
        let folded: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "fulltime" => Self::FullTime,
            "parttime" => Self::PartTime,
            "contract" => Self::Contract,
            "internship" => Self::Internship,
            "freelance" => Self::Freelance,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_label(&self) -> &str {
        match self {
            Self::FullTime => "full_time",
            Self::PartTime => "part_time",
            Self::Contract => "contract",
            Self::Internship => "internship",
            Self::Freelance => "freelance",
            Self::Other(raw) => raw,
        }
    }
}

/// Canonical job posting. Immutable once fetched; saved/unsaved state lives
/// in the saved-jobs controller, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub company: String,
    pub company_logo: Option<String>,
    pub location: String,
    pub job_type: Option<JobType>,
    pub salary: Option<String>,
    pub description: String,
    pub responsibilities: Vec<String>,
    pub requirements: Vec<String>,
    pub benefits: Vec<String>,
    pub skills: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub full_name: String,
    pub email: String,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub skills: Vec<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
}
