//! Read-only management surface

use crate::broker::{Broker, DEPLOYMENT_PREFIX, deployment_name};
use crate::error::{BrokerError, Result};
use crate::quota;
use odb_core::RequestContext;
use odb_registry::InstanceRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const METRIC_PREFIX: &str = "/on-demand-broker";
const COUNT_UNIT: &str = "count";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub key: String,
    pub value: usize,
    pub unit: String,
}

impl Metric {
    fn count(key: String, value: usize) -> Self {
        Self {
            key,
            value,
            unit: COUNT_UNIT.to_string(),
        }
    }
}

impl Broker {
    /// Live instance count per plan id
    pub async fn count_instances_of_plans(
        &self,
        ctx: &RequestContext,
    ) -> Result<HashMap<String, usize>> {
        Ok(self
            .registry
            .count_instances_of_service_offering(ctx, &self.offering.id)
            .await?)
    }

    pub async fn instances(&self, ctx: &RequestContext) -> Result<Vec<InstanceRef>> {
        Ok(self
            .registry
            .get_instances_of_service_offering(ctx, &self.offering.id)
            .await?)
    }

    /// Broker-owned deployments with no instance behind them
    pub async fn orphan_deployments(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        let instances = self.instances(ctx).await?;
        let expected: HashSet<String> = instances
            .iter()
            .map(|instance| deployment_name(&instance.guid))
            .collect();

        let orphans: Vec<String> = self
            .director
            .deployments(ctx)
            .await?
            .into_iter()
            .filter(|name| name.starts_with(DEPLOYMENT_PREFIX) && !expected.contains(name))
            .collect();

        if !orphans.is_empty() {
            tracing::warn!(count = orphans.len(), "Found orphan deployments");
        }
        Ok(orphans)
    }

    /// Instance totals and remaining quota, per plan and for the offering
    ///
    /// Only plans the registry reports are listed. An empty report means the
    /// offering is not registered and yields [`BrokerError::ServiceUnavailable`].
    pub async fn service_metrics(&self, ctx: &RequestContext) -> Result<Vec<Metric>> {
        let counts = self.count_instances_of_plans(ctx).await?;
        if counts.is_empty() {
            return Err(BrokerError::ServiceUnavailable(
                "The broker is not registered with the marketplace".to_string(),
            ));
        }

        let offering_key = format!("{}/{}", METRIC_PREFIX, self.offering.name);
        let mut metrics = Vec::new();
        let mut total = 0;

        for plan in &self.offering.plans {
            let Some(&count) = counts.get(&plan.id) else {
                continue;
            };
            total += count;

            let plan_key = format!("{}/{}", offering_key, plan.name);
            metrics.push(Metric::count(format!("{}/total_instances", plan_key), count));
            if let Some(limit) = plan.quotas.service_instance_limit {
                metrics.push(Metric::count(
                    format!("{}/quota_remaining", plan_key),
                    quota::remaining(count, limit),
                ));
            }
        }

        metrics.push(Metric::count(
            format!("{}/total_instances", offering_key),
            total,
        ));
        if let Some(limit) = self.offering.global_quotas.service_instance_limit {
            metrics.push(Metric::count(
                format!("{}/quota_remaining", offering_key),
                quota::remaining(total, limit),
            ));
        }

        Ok(metrics)
    }
}
