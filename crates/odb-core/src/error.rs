//! Fault taxonomy
//!
//! Every upstream or internal failure is eventually described by one
//! [`ErrorKind`]. Client crates classify their own error enums through
//! [`Classify`]; the broker layer only wraps failures that nobody classified
//! into a [`DisplayableError`].

use crate::context::RequestContext;
use thiserror::Error;

/// Prefix of every user-facing generic error message
pub const GENERIC_ERROR_PREFIX: &str = "There was a problem completing your request. Please contact your operations team providing the following information:";

/// Message shown when an update is refused because the deployment has pending changes
pub const PENDING_CHANGES_ERROR_MESSAGE: &str = "Service cannot be updated at this time, please try again later or contact your operator for more information";

/// Message shown when another operation is already running for the instance
pub const OPERATION_IN_PROGRESS_MESSAGE: &str =
    "An operation is in progress for your service instance. Please try again later.";

/// Uniform fault classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    AppGuidMissing,
    OperationInProgress,
    QuotaExceeded,
    UnprocessableRequest,
    Unauthorized,
    Forbidden,
    InvalidUpstreamResponse,
    UnexpectedUpstreamStatus,
    /// Registry could not be reached or did not answer before the deadline
    RegistryUnavailable,
    DirectorUnavailable,
    DirectorRejected,
    /// The deployment behind an instance disappeared
    DeploymentGone,
    ServiceUnavailable,
    Generic,
}

impl ErrorKind {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RegistryUnavailable
                | ErrorKind::DirectorUnavailable
                | ErrorKind::ServiceUnavailable
                | ErrorKind::OperationInProgress
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::AlreadyExists => "already-exists",
            ErrorKind::NotFound => "not-found",
            ErrorKind::AppGuidMissing => "app-guid-missing",
            ErrorKind::OperationInProgress => "operation-in-progress",
            ErrorKind::QuotaExceeded => "quota-exceeded",
            ErrorKind::UnprocessableRequest => "unprocessable-request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidUpstreamResponse => "invalid-upstream-response",
            ErrorKind::UnexpectedUpstreamStatus => "unexpected-upstream-status",
            ErrorKind::RegistryUnavailable => "registry-unavailable",
            ErrorKind::DirectorUnavailable => "director-unavailable",
            ErrorKind::DirectorRejected => "director-rejected",
            ErrorKind::DeploymentGone => "deployment-gone",
            ErrorKind::ServiceUnavailable => "service-unavailable",
            ErrorKind::Generic => "generic",
        };
        write!(f, "{}", name)
    }
}

/// Implemented by every error enum that crosses a crate boundary
pub trait Classify {
    fn kind(&self) -> ErrorKind;

    fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// An error split into what the operator sees and what the end user sees
///
/// The operator half is only ever logged; the user half is the only text that
/// may be returned over the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("error: {operator}. error for user: {user}.")]
pub struct DisplayableError {
    user: String,
    operator: String,
}

impl DisplayableError {
    pub fn new(user: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            operator: operator.into(),
        }
    }

    /// Wrap an unclassified failure with a user message carrying enough
    /// request context to find the operator half in the logs.
    pub fn generic(ctx: &RequestContext, err: impl std::fmt::Display) -> Self {
        let mut message = format!(
            "{} service: {}, service-instance-guid: {}, broker-request-id: {}",
            GENERIC_ERROR_PREFIX,
            ctx.service_name(),
            ctx.instance_id().unwrap_or_default(),
            ctx.request_id(),
        );

        if let Some(task_id) = ctx.task_id() {
            message.push_str(&format!(", task-id: {}", task_id));
        }

        if let Some(operation) = ctx.operation() {
            message.push_str(&format!(", operation: {}", operation));
        }

        Self {
            user: message,
            operator: err.to_string(),
        }
    }

    /// Failure to talk to the deployment director while performing `action`
    pub fn director_request(action: &str, err: impl std::fmt::Display) -> Self {
        Self {
            user: format!(
                "Currently unable to {} service instance, please try again later",
                action
            ),
            operator: err.to_string(),
        }
    }

    pub fn user_message(&self) -> &str {
        &self.user
    }

    pub fn operator_message(&self) -> &str {
        &self.operator
    }
}

impl Classify for DisplayableError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Generic
    }
}
