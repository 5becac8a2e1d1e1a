//! On-demand broker orchestration
//!
//! [`Broker`] turns marketplace lifecycle requests into director tasks and
//! director task results back into marketplace operation state:
//!
//! - [`Broker::provision`], [`Broker::update`], [`Broker::upgrade`] and
//!   [`Broker::deprovision`] submit director tasks and return an
//!   [`OperationToken`]
//! - [`Broker::last_operation`] polls the task behind a token and submits
//!   lifecycle errands as their turn comes
//! - [`Broker::bind`] and [`Broker::unbind`] are synchronous
//! - [`Broker::startup_checks`] gates startup on upstream versions and
//!   plan-id immutability
//!
//! [`Purger`] removes every instance of the offering and deregisters the
//! broker.

pub mod adapter;
pub mod binding;
pub mod broker;
pub mod error;
pub mod last_operation;
pub mod management;
pub mod operation;
pub mod purger;
pub mod quota;
pub mod startup;

pub use adapter::{AdapterError, ManifestGenerator, TopologyGenerator};
pub use broker::{Broker, DEPLOYMENT_PREFIX, deployment_name};
pub use error::{BrokerError, Result, StartupError};
pub use management::Metric;
pub use operation::{
    DeprovisionOutcome, LastOperation, OperationState, OperationToken, OperationType,
};
pub use purger::{PurgeError, Purger};
pub use quota::QuotaScope;
pub use startup::verify_plan_ids_unchanged;
