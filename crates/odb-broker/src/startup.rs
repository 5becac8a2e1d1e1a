//! Startup checks
//!
//! Run once before the broker serves requests. API version problems of both
//! upstreams are collected and reported together.

use crate::broker::Broker;
use crate::error::StartupError;
use odb_core::{RequestContext, ServiceOffering};
use odb_director::{DirectorError, DirectorVersion};
use odb_registry::RegistryError;
use std::collections::HashMap;

/// Oldest registry API the broker works against
const MIN_REGISTRY_API_VERSION: semver::Version = semver::Version::new(2, 57, 0);

impl Broker {
    pub async fn startup_checks(&self, ctx: &RequestContext) -> Result<(), StartupError> {
        let registry_version = self.registry.api_version(ctx).await;
        let director_version = self.director.director_version(ctx).await;

        let mut problems = Vec::new();
        if let Err(message) = check_registry_version(registry_version) {
            problems.push(format!("CF API error: {}", message));
        }
        if let Err(message) =
            check_director_version(director_version, self.offering.has_lifecycle_errands())
        {
            problems.push(format!("BOSH Director error: {}", message));
        }
        if !problems.is_empty() {
            return Err(StartupError::ApiIncompatible(problems.join(" ")));
        }

        let counts = self
            .registry
            .count_instances_of_service_offering(ctx, &self.offering.id)
            .await?;
        verify_plan_ids_unchanged(&counts, &self.offering)?;

        tracing::info!(offering = %self.offering.name, "Startup checks passed");
        Ok(())
    }
}

fn check_registry_version(version: Result<String, RegistryError>) -> Result<(), String> {
    let raw = version.map_err(|e| format!("{}. ODB requires CF v238+.", e))?;

    let parsed = semver::Version::parse(raw.trim()).map_err(|_| {
        format!(
            "Cloud Foundry API version couldn't be parsed. Expected a semver, got: {}.",
            raw
        )
    })?;

    if parsed < MIN_REGISTRY_API_VERSION {
        return Err("Cloud Foundry API version is insufficient, ODB requires CF v238+.".into());
    }
    Ok(())
}

fn check_director_version(
    version: Result<DirectorVersion, DirectorError>,
    needs_lifecycle_errands: bool,
) -> Result<(), String> {
    let version = version.map_err(|e| format!("{}. ODB requires BOSH v257+.", e))?;

    if !version.supports_odb() {
        return Err("API version is insufficient, ODB requires BOSH v257+.".into());
    }
    if needs_lifecycle_errands && !version.supports_lifecycle_errands() {
        return Err("API version is insufficient, one or more plans are configured with lifecycle_errands which require BOSH v261+.".into());
    }
    Ok(())
}

/// Fail when live instances reference a plan id that is no longer configured
pub fn verify_plan_ids_unchanged(
    counts: &HashMap<String, usize>,
    offering: &ServiceOffering,
) -> Result<(), StartupError> {
    let mut removed: Vec<String> = counts
        .iter()
        .filter(|(plan_id, count)| **count > 0 && offering.find_plan(plan_id).is_none())
        .map(|(plan_id, _)| plan_id.clone())
        .collect();

    if removed.is_empty() {
        return Ok(());
    }

    removed.sort();
    tracing::error!(plan_ids = ?removed, "Instances exist for plans missing from the catalog");
    Err(StartupError::PlanIdRemoved { plan_ids: removed })
}
