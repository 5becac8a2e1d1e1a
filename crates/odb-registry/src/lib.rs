//! Marketplace registry client
//!
//! Discovery of marketplace-side resources (offering, plans, instances,
//! bindings, service keys) plus the destructive calls the purger needs.
//!
//! - Every list call follows `next_url` until the last page and returns the
//!   whole set; a failing page fails the call.
//! - The auth header is cached in a [`TokenCache`] and refreshed once, single
//!   flight, when the registry answers 401.
//! - Non-2xx answers are classified into [`RegistryError`] at this boundary.
//! - Deletes treat "not found" as success.

pub mod auth;
pub mod client;
pub mod error;
pub mod model;

pub use auth::{AuthHeaderBuilder, ClientCredentialsAuth, TokenCache};
pub use client::RegistryClient;
pub use error::{RegistryError, Result};
pub use model::{
    Binding, Instance, InstanceRef, InstanceState, LastOperation, OperationState, OperationType,
    ServiceKey,
};

use async_trait::async_trait;
use odb_core::RequestContext;
use std::collections::HashMap;

/// Registry operations the broker depends on
#[async_trait]
pub trait Registry: Send + Sync {
    /// Registry API version string, e.g. "2.57.0"
    async fn api_version(&self, ctx: &RequestContext) -> Result<String>;

    /// Guid of the broker registered under `broker_name`
    async fn broker_guid(&self, ctx: &RequestContext, broker_name: &str) -> Result<String>;

    /// Live instance count per plan id; empty when the offering is not registered
    async fn count_instances_of_service_offering(
        &self,
        ctx: &RequestContext,
        offering_id: &str,
    ) -> Result<HashMap<String, usize>>;

    async fn count_instances_of_plan(
        &self,
        ctx: &RequestContext,
        offering_id: &str,
        plan_id: &str,
    ) -> Result<usize>;

    async fn get_instance(&self, ctx: &RequestContext, instance_id: &str) -> Result<Instance>;

    async fn get_instance_state(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
    ) -> Result<InstanceState>;

    async fn get_instances_of_service_offering(
        &self,
        ctx: &RequestContext,
        offering_id: &str,
    ) -> Result<Vec<InstanceRef>>;

    async fn get_bindings_for_instance(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
    ) -> Result<Vec<Binding>>;

    async fn get_service_keys_for_instance(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
    ) -> Result<Vec<ServiceKey>>;

    async fn delete_binding(&self, ctx: &RequestContext, binding: &Binding) -> Result<()>;

    async fn delete_service_key(&self, ctx: &RequestContext, key: &ServiceKey) -> Result<()>;

    async fn delete_service_instance(&self, ctx: &RequestContext, instance_id: &str) -> Result<()>;

    /// Make every plan of the offering private
    async fn disable_service_access(&self, ctx: &RequestContext, offering_id: &str) -> Result<()>;

    async fn deregister_broker(&self, ctx: &RequestContext, broker_guid: &str) -> Result<()>;
}
