use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy for every remote operation. Every non-2xx status and
/// every transport failure maps to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    AuthenticationRequired,
    NotFound,
    ValidationFailure,
    NetworkFailure,
    ServerError,
    Unknown,
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind:?}: {message}")]
pub struct ApiFailure {
    pub kind: ApiErrorKind,
    pub message: String,
    /// HTTP status, when the failure came from a completed response.
    pub status: Option<u16>,
}

impl ApiFailure {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NetworkFailure, message)
    }

    /// Total mapping from a non-2xx status to a failure kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ApiErrorKind::AuthenticationRequired,
            404 | 410 => ApiErrorKind::NotFound,
            400 | 409 | 422 => ApiErrorKind::ValidationFailure,
            500..=599 => ApiErrorKind::ServerError,
            _ => ApiErrorKind::Unknown,
        };
        Self {
            kind,
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn is_authentication_required(&self) -> bool {
        self.kind == ApiErrorKind::AuthenticationRequired
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}
