//! Registry error types and status classification

use odb_core::{Classify, ErrorKind};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    #[error("Unexpected response status {status}, {body:?}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Failed to obtain registry auth header: {0}")]
    Auth(String),

    #[error("Registry request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Registry request to {0} timed out")]
    Timeout(String),

    #[error("service plan {0} not found")]
    PlanNotFound(String),

    #[error("Failed to find broker with name: {0}")]
    BrokerNotFound(String),
}

/// Structured error body returned by the registry
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[allow(dead_code)]
    code: Option<i64>,
    description: Option<String>,
}

impl RegistryError {
    /// Classify a non-2xx response by status code
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            404 => RegistryError::NotFound(describe(body)),
            401 => RegistryError::Unauthorized(describe(body)),
            403 => RegistryError::Forbidden(describe(body)),
            _ => RegistryError::UnexpectedStatus {
                status,
                body: body.to_string(),
            },
        }
    }

    pub(crate) fn from_transport(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RegistryError::Timeout(url.to_string())
        } else {
            RegistryError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

/// Human description from a structured body, falling back to the raw text
fn describe(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.description)
        .unwrap_or_else(|| body.to_string())
}

impl Classify for RegistryError {
    fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::NotFound(_)
            | RegistryError::PlanNotFound(_)
            | RegistryError::BrokerNotFound(_) => ErrorKind::NotFound,
            RegistryError::Unauthorized(_) | RegistryError::Auth(_) => ErrorKind::Unauthorized,
            RegistryError::Forbidden(_) => ErrorKind::Forbidden,
            RegistryError::InvalidResponse(_) => ErrorKind::InvalidUpstreamResponse,
            RegistryError::UnexpectedStatus { status: 500..=599, .. } => {
                ErrorKind::RegistryUnavailable
            }
            RegistryError::UnexpectedStatus { .. } => ErrorKind::UnexpectedUpstreamStatus,
            RegistryError::Transport { .. } | RegistryError::Timeout(_) => {
                ErrorKind::RegistryUnavailable
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
