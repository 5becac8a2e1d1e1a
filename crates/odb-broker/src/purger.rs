//! Purge every instance of the offering and deregister the broker
//!
//! Steps, each aborting the purge on failure:
//!
//! 1. Disable service access so no new instances are created
//! 2. For every instance delete its bindings and service keys, then the
//!    instance itself
//! 3. Poll until the registry reports no instances (bounded attempts)
//! 4. Deregister the broker by name

use futures_util::future::try_join_all;
use odb_config::PurgeConfig;
use odb_core::RequestContext;
use odb_registry::{Registry, RegistryError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PurgeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{remaining} service instances still exist after {attempts} attempts")]
    InstancesRemain { remaining: usize, attempts: u32 },
}

pub struct Purger {
    registry: Arc<dyn Registry>,
    offering_id: String,
    poll_interval: Duration,
    max_attempts: u32,
}

impl Purger {
    pub fn new(
        registry: Arc<dyn Registry>,
        offering_id: impl Into<String>,
        config: &PurgeConfig,
    ) -> Self {
        Self {
            registry,
            offering_id: offering_id.into(),
            poll_interval: config.poll_interval(),
            max_attempts: config.max_attempts,
        }
    }

    pub async fn purge(&self, ctx: &RequestContext, broker_name: &str) -> Result<(), PurgeError> {
        tracing::info!(offering_id = %self.offering_id, "Disabling service access");
        self.registry
            .disable_service_access(ctx, &self.offering_id)
            .await?;

        let instances = self
            .registry
            .get_instances_of_service_offering(ctx, &self.offering_id)
            .await?;
        tracing::info!(count = instances.len(), "Deleting service instances");

        for instance in &instances {
            self.delete_instance(ctx, &instance.guid).await?;
        }

        self.wait_for_deletions(ctx).await?;

        let broker_guid = self.registry.broker_guid(ctx, broker_name).await?;
        self.registry.deregister_broker(ctx, &broker_guid).await?;
        tracing::info!(broker_name, "Purge complete, broker deregistered");
        Ok(())
    }

    async fn delete_instance(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
    ) -> Result<(), PurgeError> {
        let bindings = self
            .registry
            .get_bindings_for_instance(ctx, instance_id)
            .await?;
        try_join_all(
            bindings
                .iter()
                .map(|binding| self.registry.delete_binding(ctx, binding)),
        )
        .await?;

        let keys = self
            .registry
            .get_service_keys_for_instance(ctx, instance_id)
            .await?;
        try_join_all(keys.iter().map(|key| self.registry.delete_service_key(ctx, key))).await?;

        self.registry.delete_service_instance(ctx, instance_id).await?;
        tracing::info!(
            instance_id,
            bindings = bindings.len(),
            service_keys = keys.len(),
            "Requested instance deletion"
        );
        Ok(())
    }

    async fn wait_for_deletions(&self, ctx: &RequestContext) -> Result<(), PurgeError> {
        let mut remaining = 0;
        for attempt in 1..=self.max_attempts {
            remaining = self
                .registry
                .get_instances_of_service_offering(ctx, &self.offering_id)
                .await?
                .len();
            if remaining == 0 {
                return Ok(());
            }

            tracing::debug!(attempt, remaining, "Waiting for instance deletions");
            if attempt < self.max_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(PurgeError::InstancesRemain {
            remaining,
            attempts: self.max_attempts,
        })
    }
}
