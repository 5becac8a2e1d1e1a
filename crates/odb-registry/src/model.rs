//! Registry resource types
//!
//! Wire types (`Page`, `Resource`, the `*Entity` structs) mirror the
//! registry's paginated JSON. Domain types are what the broker consumes.

use serde::{Deserialize, Serialize};

// ============ Wire types ============

/// One page of a paginated list
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default = "Vec::new")]
    pub resources: Vec<Resource<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Resource<T> {
    pub metadata: Metadata,
    pub entity: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Metadata {
    pub guid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InfoEntity {
    pub api_version: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BrokerEntity {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceEntity {
    pub unique_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlanEntity {
    pub unique_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InstanceEntity {
    pub service_plan_url: String,
    #[serde(default)]
    pub last_operation: Option<LastOperation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BindingEntity {
    pub app_guid: String,
}

// ============ Domain types ============

/// A service instance as the registry knows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub guid: String,
    pub service_plan_url: String,
    pub last_operation: Option<LastOperation>,
}

/// Current plan and whether the registry sees an operation running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    pub plan_id: String,
    pub operation_in_progress: bool,
}

/// An instance of the offering together with its plan id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceRef {
    pub guid: String,
    pub plan_unique_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOperation {
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    pub state: OperationState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Update,
    Delete,
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub guid: String,
    pub app_guid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceKey {
    pub guid: String,
}
