//! odb core
//!
//! Types shared by every crate of the on-demand broker:
//!
//! - **Fault taxonomy**: [`ErrorKind`], the [`Classify`] trait and
//!   [`DisplayableError`] (operator detail paired with a user-safe message)
//! - **Request context**: [`RequestContext`], threaded through every
//!   orchestrator, registry and director call
//! - **Service catalog**: [`ServiceOffering`], [`Plan`] and friends
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                    odb (CLI)                    │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                  odb-broker                     │
//! │   orchestrator · quota · startup · purger       │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ odb-registry  │ │ odb-director  │
//! └───────┬───────┘ └───────┬───────┘
//!         └────────┬────────┘
//!          ┌───────▼───────┐
//!          │   odb-core    │
//!          └───────────────┘
//! ```

pub mod catalog;
pub mod context;
pub mod error;

pub use catalog::{InstanceGroup, LifecycleErrands, Plan, Quotas, ServiceOffering};
pub use context::RequestContext;
pub use error::{
    Classify, DisplayableError, ErrorKind, GENERIC_ERROR_PREFIX, OPERATION_IN_PROGRESS_MESSAGE,
    PENDING_CHANGES_ERROR_MESSAGE,
};
