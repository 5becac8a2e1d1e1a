pub mod check;
pub mod manage;
pub mod purge;

use anyhow::Context;
use odb_broker::{Broker, TopologyGenerator};
use odb_config::BrokerConfig;
use odb_core::RequestContext;
use odb_director::DirectorClient;
use odb_registry::{ClientCredentialsAuth, RegistryClient};
use std::path::Path;
use std::sync::Arc;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<BrokerConfig> {
    let config = match path {
        Some(path) => BrokerConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => BrokerConfig::discover().context("failed to find broker configuration")?,
    };
    tracing::debug!(
        broker = %config.broker.name,
        offering = %config.service_catalog.name,
        plans = config.service_catalog.plans.len(),
        "Loaded broker configuration"
    );
    Ok(config)
}

pub fn registry_client(config: &BrokerConfig) -> Arc<RegistryClient> {
    let auth = ClientCredentialsAuth::new(
        &config.registry.uaa_url,
        config.registry.client_id.clone(),
        config.registry.client_secret.clone(),
    );
    Arc::new(RegistryClient::new(config.registry.url.clone(), Arc::new(auth)))
}

pub fn build_broker(config: &BrokerConfig) -> anyhow::Result<Broker> {
    let director = DirectorClient::new(
        config.director.url.clone(),
        config.director.username.clone(),
        config.director.password.clone(),
    )?;

    Ok(Broker::new(
        registry_client(config),
        Arc::new(director),
        Arc::new(TopologyGenerator::new(&config.director)),
        config.service_catalog.clone(),
    ))
}

/// Context for one CLI invocation, bounded by the configured request timeout
pub fn request_context(config: &BrokerConfig, operation: &str) -> RequestContext {
    RequestContext::new(config.service_catalog.name.clone())
        .with_operation(operation)
        .with_timeout(config.request_timeout())
}
