//! Director task and binding types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Numeric id of a director task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Director task state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Processing,
    Cancelling,
    Done,
    Error,
    Cancelled,
    Timeout,
}

impl TaskState {
    /// States listed when asking the director for incomplete tasks
    pub const INCOMPLETE: [TaskState; 3] = [
        TaskState::Queued,
        TaskState::Processing,
        TaskState::Cancelling,
    ];

    pub fn is_incomplete(self) -> bool {
        Self::INCOMPLETE.contains(&self)
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            TaskState::Error | TaskState::Cancelled | TaskState::Timeout
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskState::Queued => "queued",
            TaskState::Processing => "processing",
            TaskState::Cancelling => "cancelling",
            TaskState::Done => "done",
            TaskState::Error => "error",
            TaskState::Cancelled => "cancelled",
            TaskState::Timeout => "timeout",
        };
        write!(f, "{}", name)
    }
}

/// A director task as returned by `/tasks`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub state: TaskState,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

/// Most recent task of a list, by task id
pub fn latest(tasks: &[Task]) -> Option<&Task> {
    tasks.iter().max_by_key(|task| task.id)
}

/// Parameters of a synchronous binding call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_guid: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, serde_json::Value>,
}

/// Result of a successful binding call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    #[serde(default)]
    pub credentials: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog_drain_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_service_url: Option<String>,
}
