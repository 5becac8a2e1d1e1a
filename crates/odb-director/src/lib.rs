//! Deployment director client
//!
//! Submits deployment actions as asynchronous director tasks and reads them
//! back.
//!
//! ```text
//! ┌──────────────┐  POST /deployments          ┌──────────────┐
//! │    Broker    │ ──────────────────────────▶ │   Director   │
//! │              │ ◀────── 302 /tasks/<id> ─── │              │
//! │              │  GET /tasks/<id>            │              │
//! │              │ ──────────────────────────▶ │              │
//! └──────────────┘ ◀──── {"state": "done"} ─── └──────────────┘
//! ```
//!
//! Transport failures, timeouts and 5xx answers are [`DirectorError::Unavailable`]
//! (retryable); other 4xx answers are [`DirectorError::Rejected`].

pub mod client;
pub mod error;
pub mod manifest;
pub mod model;
pub mod version;

pub use client::{CONTEXT_ID_HEADER, DirectorClient};
pub use error::{DirectorError, Result};
pub use manifest::{ChangeType, DiffSummary, Manifest, ManifestDiff};
pub use model::{Binding, BindingRequest, Task, TaskId, TaskState, latest};
pub use version::{DirectorVersion, VersionError};

use async_trait::async_trait;
use odb_core::RequestContext;

/// Deployment director operations the broker depends on
///
/// `context_id` threads a deployment and its lifecycle errands together as
/// one logical operation.
#[async_trait]
pub trait Director: Send + Sync {
    async fn submit_deployment(
        &self,
        ctx: &RequestContext,
        manifest: &Manifest,
        context_id: Option<&str>,
    ) -> Result<TaskId>;

    /// Fails with [`DirectorError::NotFound`] when the deployment is absent
    async fn delete_deployment(
        &self,
        ctx: &RequestContext,
        deployment: &str,
        context_id: Option<&str>,
    ) -> Result<TaskId>;

    async fn run_errand(
        &self,
        ctx: &RequestContext,
        deployment: &str,
        errand: &str,
        context_id: Option<&str>,
    ) -> Result<TaskId>;

    /// Side-effect free; may be called any number of times
    async fn poll_task(&self, ctx: &RequestContext, task_id: TaskId) -> Result<Task>;

    async fn tasks_for_context(
        &self,
        ctx: &RequestContext,
        deployment: &str,
        context_id: &str,
    ) -> Result<Vec<Task>>;

    /// Queued, processing or cancelling tasks of a deployment
    async fn incomplete_tasks(&self, ctx: &RequestContext, deployment: &str) -> Result<Vec<Task>>;

    /// `None` when the deployment does not exist
    async fn get_current_manifest(
        &self,
        ctx: &RequestContext,
        deployment: &str,
    ) -> Result<Option<Manifest>>;

    /// Names of every deployment the director knows about
    async fn deployments(&self, ctx: &RequestContext) -> Result<Vec<String>>;

    async fn director_version(&self, ctx: &RequestContext) -> Result<DirectorVersion>;

    async fn create_binding(
        &self,
        ctx: &RequestContext,
        deployment: &str,
        binding_id: &str,
        request: &BindingRequest,
    ) -> Result<Binding>;

    async fn delete_binding(
        &self,
        ctx: &RequestContext,
        deployment: &str,
        binding_id: &str,
    ) -> Result<()>;
}
