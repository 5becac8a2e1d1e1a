//! Operation tokens and last-operation results

use odb_director::{TaskId, TaskState};
use serde::{Deserialize, Serialize};

/// Lifecycle operation a token was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Provision,
    Update,
    Upgrade,
    Deprovision,
    Bind,
    Unbind,
}

impl OperationType {
    /// Noun used in last-operation descriptions
    fn activity(self) -> &'static str {
        match self {
            OperationType::Provision => "provisioning",
            OperationType::Update => "update",
            OperationType::Upgrade => "upgrade",
            OperationType::Deprovision => "deletion",
            OperationType::Bind => "binding",
            OperationType::Unbind => "unbinding",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationType::Provision => "provision",
            OperationType::Update => "update",
            OperationType::Upgrade => "upgrade",
            OperationType::Deprovision => "deprovision",
            OperationType::Bind => "bind",
            OperationType::Unbind => "unbind",
        };
        write!(f, "{}", name)
    }
}

/// Opaque handle returned for an asynchronous operation
///
/// Serialised as JSON and handed back by the marketplace on every
/// last-operation poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationToken {
    pub operation_type: OperationType,
    pub task_id: TaskId,

    /// Correlates a deployment with its lifecycle errands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// Set only when the operation moves the instance to a plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_deploy_errand: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_delete_errand: Option<String>,
}

impl OperationToken {
    pub fn new(operation_type: OperationType, task_id: TaskId) -> Self {
        Self {
            operation_type,
            task_id,
            context_id: None,
            plan_id: None,
            post_deploy_errand: None,
            pre_delete_errand: None,
        }
    }

    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    pub fn with_plan_id(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    pub fn with_post_deploy_errand(mut self, errand: impl Into<String>) -> Self {
        self.post_deploy_errand = Some(errand.into());
        self
    }

    pub fn with_pre_delete_errand(mut self, errand: impl Into<String>) -> Self {
        self.pre_delete_errand = Some(errand.into());
        self
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

impl From<TaskState> for OperationState {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Queued | TaskState::Processing | TaskState::Cancelling => {
                OperationState::InProgress
            }
            TaskState::Done => OperationState::Succeeded,
            TaskState::Error | TaskState::Cancelled | TaskState::Timeout => OperationState::Failed,
        }
    }
}

/// Marketplace-visible state of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOperation {
    pub state: OperationState,
    pub description: String,
}

impl LastOperation {
    pub fn in_progress(operation: OperationType) -> Self {
        Self {
            state: OperationState::InProgress,
            description: format!("Instance {} in progress", operation.activity()),
        }
    }

    pub fn succeeded(operation: OperationType) -> Self {
        Self {
            state: OperationState::Succeeded,
            description: format!("Instance {} completed", operation.activity()),
        }
    }

    /// Failed operation; `description` must already be user-safe
    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            state: OperationState::Failed,
            description: description.into(),
        }
    }
}

/// Result of a deprovision request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeprovisionOutcome {
    Submitted(OperationToken),
    /// Nothing left to delete; reported as success
    AlreadyDeprovisioned,
}
