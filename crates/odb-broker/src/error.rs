//! Broker errors
//!
//! Upstream errors arrive already classified and are carried unchanged in
//! [`BrokerError::Registry`] and [`BrokerError::Director`]. Failures nobody
//! classified become [`BrokerError::Generic`]. Only
//! [`BrokerError::user_message`] may be shown to the marketplace caller.

use odb_core::{
    Classify, DisplayableError, ErrorKind, OPERATION_IN_PROGRESS_MESSAGE, RequestContext,
};
use odb_director::DirectorError;
use odb_registry::RegistryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Director(#[from] DirectorError),

    #[error("instance already exists: {0}")]
    AlreadyExists(String),

    #[error("instance does not exist: {0}")]
    NotFound(String),

    #[error("app guid not provided")]
    AppGuidMissing,

    #[error("operation in progress for instance {0}")]
    OperationInProgress(String),

    #[error("{0}")]
    QuotaExceeded(String),

    #[error("{0}")]
    UnprocessableRequest(String),

    #[error("deployment not found: {0}")]
    DeploymentGone(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Generic(#[from] DisplayableError),
}

impl Classify for BrokerError {
    fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::Registry(e) => e.kind(),
            BrokerError::Director(e) => e.kind(),
            BrokerError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            BrokerError::NotFound(_) => ErrorKind::NotFound,
            BrokerError::AppGuidMissing => ErrorKind::AppGuidMissing,
            BrokerError::OperationInProgress(_) => ErrorKind::OperationInProgress,
            BrokerError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            BrokerError::UnprocessableRequest(_) => ErrorKind::UnprocessableRequest,
            BrokerError::DeploymentGone(_) => ErrorKind::DeploymentGone,
            BrokerError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            BrokerError::Generic(e) => e.kind(),
        }
    }
}

impl BrokerError {
    /// Text safe to return over the wire
    ///
    /// Upstream failures are replaced by a message carrying only request
    /// context; their detail stays in the logs.
    pub fn user_message(&self, ctx: &RequestContext) -> String {
        match self {
            BrokerError::AlreadyExists(_) => "instance already exists".to_string(),
            BrokerError::NotFound(_) => "instance does not exist".to_string(),
            BrokerError::AppGuidMissing => {
                "app_guid is a required field but was not provided".to_string()
            }
            BrokerError::OperationInProgress(_) => OPERATION_IN_PROGRESS_MESSAGE.to_string(),
            BrokerError::QuotaExceeded(message)
            | BrokerError::UnprocessableRequest(message)
            | BrokerError::ServiceUnavailable(message) => message.clone(),
            BrokerError::DeploymentGone(_) => "instance does not exist".to_string(),
            BrokerError::Generic(e) => e.user_message().to_string(),
            BrokerError::Director(e) if e.is_retryable() => {
                let action = ctx.operation().unwrap_or("update");
                DisplayableError::director_request(action, e)
                    .user_message()
                    .to_string()
            }
            BrokerError::Registry(_) | BrokerError::Director(_) => {
                DisplayableError::generic(ctx, self).user_message().to_string()
            }
        }
    }

    /// Status code the broker protocol layer answers with
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyExists | ErrorKind::OperationInProgress => 409,
            ErrorKind::DeploymentGone => 410,
            ErrorKind::UnprocessableRequest | ErrorKind::AppGuidMissing => 422,
            ErrorKind::ServiceUnavailable => 503,
            _ => 500,
        }
    }

    /// `{"description": <user-safe message>}`
    pub fn response_body(&self, ctx: &RequestContext) -> serde_json::Value {
        serde_json::json!({ "description": self.user_message(ctx) })
    }

    /// Wrap an unclassified failure, logging the operator detail
    pub fn generic(ctx: &RequestContext, err: impl std::fmt::Display) -> Self {
        let displayable = DisplayableError::generic(ctx, err);
        tracing::error!(
            request_id = %ctx.request_id(),
            instance_id = ctx.instance_id().unwrap_or_default(),
            operation = ctx.operation().unwrap_or_default(),
            error = displayable.operator_message(),
            "Request failed"
        );
        BrokerError::Generic(displayable)
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;

/// Conditions that stop the broker from starting
#[derive(Error, Debug)]
pub enum StartupError {
    /// Every incompatible upstream, space separated
    #[error("{0}")]
    ApiIncompatible(String),

    #[error("You cannot change the plan_id of a plan that has existing service instances")]
    PlanIdRemoved { plan_ids: Vec<String> },

    #[error("Failed to count existing service instances: {0}")]
    Registry(#[from] RegistryError),
}
