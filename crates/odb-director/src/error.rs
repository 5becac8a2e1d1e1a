//! Director error types

use crate::version::VersionError;
use odb_core::{Classify, ErrorKind};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectorError {
    /// Transport failure or 5xx; the same request may succeed later
    #[error("Director unavailable: {0}")]
    Unavailable(String),

    #[error("Director request to {0} timed out")]
    Timeout(String),

    /// 4xx other than not-found; retrying the same request will not help
    #[error("Director rejected the request with status {status}: {description}")]
    Rejected { status: u16, description: String },

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid director response: {0}")]
    InvalidResponse(String),

    #[error("binding already exists: {0}")]
    BindingAlreadyExists(String),

    #[error("binding not found: {0}")]
    BindingNotFound(String),

    #[error("app guid not provided")]
    AppGuidNotProvided,

    #[error("Failed to build director client: {0}")]
    Setup(String),

    /// Local failure to render a manifest; nothing was sent
    #[error("Failed to serialise manifest: {0}")]
    Manifest(String),

    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Error body returned by the director, e.g. `{"code": 70000, "description": "..."}`
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    description: Option<String>,
}

impl DirectorError {
    /// Classify a non-2xx, non-redirect response
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            404 => DirectorError::NotFound(describe(body)),
            500..=599 => DirectorError::Unavailable(format!("status {}: {}", status, describe(body))),
            _ => DirectorError::Rejected {
                status,
                description: describe(body),
            },
        }
    }

    pub(crate) fn from_transport(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DirectorError::Timeout(url.to_string())
        } else {
            DirectorError::Unavailable(format!("{}: {}", url, err))
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectorError::NotFound(_))
    }
}

fn describe(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.description)
        .unwrap_or_else(|| body.to_string())
}

impl Classify for DirectorError {
    fn kind(&self) -> ErrorKind {
        match self {
            DirectorError::Unavailable(_) | DirectorError::Timeout(_) => {
                ErrorKind::DirectorUnavailable
            }
            DirectorError::Rejected { .. } => ErrorKind::DirectorRejected,
            DirectorError::NotFound(_) | DirectorError::BindingNotFound(_) => ErrorKind::NotFound,
            DirectorError::InvalidResponse(_) => ErrorKind::InvalidUpstreamResponse,
            DirectorError::BindingAlreadyExists(_) => ErrorKind::AlreadyExists,
            DirectorError::AppGuidNotProvided => ErrorKind::AppGuidMissing,
            DirectorError::Setup(_) | DirectorError::Manifest(_) | DirectorError::Version(_) => {
                ErrorKind::Generic
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        let err = DirectorError::from_status(503, "maintenance");
        assert!(matches!(err, DirectorError::Unavailable(_)));
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::DirectorUnavailable);
    }

    #[test]
    fn test_client_errors_are_rejections() {
        let err = DirectorError::from_status(
            400,
            r#"{"code": 440001, "description": "Manifest should not be empty"}"#,
        );
        assert_eq!(
            err,
            DirectorError::Rejected {
                status: 400,
                description: "Manifest should not be empty".into()
            }
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_found_keeps_description() {
        let err = DirectorError::from_status(
            404,
            r#"{"code": 70000, "description": "Deployment 'service-instance_x' doesn't exist"}"#,
        );
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Deployment 'service-instance_x' doesn't exist"
        );
    }

    #[test]
    fn test_manifest_rendering_failure_is_not_an_upstream_fault() {
        let err = DirectorError::Manifest("invalid key".into());
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Failed to serialise manifest: invalid key");
    }

    #[test]
    fn test_binding_errors_map_to_broker_kinds() {
        assert_eq!(
            DirectorError::BindingAlreadyExists("b-1".into()).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            DirectorError::AppGuidNotProvided.kind(),
            ErrorKind::AppGuidMissing
        );
        assert_eq!(
            DirectorError::BindingNotFound("b-1".into()).kind(),
            ErrorKind::NotFound
        );
    }
}
