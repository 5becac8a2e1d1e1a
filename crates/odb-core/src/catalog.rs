//! Service catalog model
//!
//! The offering and plans the broker advertises. Loaded once from
//! configuration and treated as immutable for the lifetime of the process.

use serde::{Deserialize, Serialize};

/// The service offering this broker manages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOffering {
    /// Offering id as registered with the marketplace
    pub id: String,

    /// Human-readable offering name, used in messages and metric keys
    pub name: String,

    #[serde(default)]
    pub plans: Vec<Plan>,

    /// Limit applied across all plans
    #[serde(default)]
    pub global_quotas: Quotas,
}

impl ServiceOffering {
    pub fn find_plan(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.id == plan_id)
    }

    /// Whether any plan declares a lifecycle errand
    pub fn has_lifecycle_errands(&self) -> bool {
        self.plans.iter().any(|plan| {
            plan.lifecycle_errands
                .as_ref()
                .is_some_and(LifecycleErrands::any)
        })
    }
}

/// A named configuration bundle instances are deployed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub instance_groups: Vec<InstanceGroup>,

    #[serde(default)]
    pub quotas: Quotas,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_errands: Option<LifecycleErrands>,

    /// Plan-level properties merged into every generated manifest
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl Plan {
    pub fn post_deploy_errand(&self) -> Option<&str> {
        self.lifecycle_errands
            .as_ref()
            .and_then(|errands| errands.post_deploy.as_deref())
    }

    pub fn pre_delete_errand(&self) -> Option<&str> {
        self.lifecycle_errands
            .as_ref()
            .and_then(|errands| errands.pre_delete.as_deref())
    }
}

/// Resource topology of one group of VMs in a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub name: String,
    pub vm_type: String,
    pub instances: u32,

    #[serde(default)]
    pub networks: Vec<String>,

    #[serde(default)]
    pub azs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_disk_type: Option<String>,
}

/// Errands run around the lifecycle of a deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleErrands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_deploy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_delete: Option<String>,
}

impl LifecycleErrands {
    pub fn any(&self) -> bool {
        self.post_deploy.is_some() || self.pre_delete.is_some()
    }
}

/// Instance-count limit for one quota scope; `None` means unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotas {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_instance_limit: Option<usize>,
}

impl Quotas {
    pub fn limited(limit: usize) -> Self {
        Self {
            service_instance_limit: Some(limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
id: offering-id
name: redis-on-demand
global_quotas:
  service_instance_limit: 10
plans:
  - id: small-id
    name: small
    quotas:
      service_instance_limit: 3
    instance_groups:
      - name: redis
        vm_type: small
        instances: 1
        networks: [net1]
        azs: [z1]
  - id: ha-id
    name: ha
    lifecycle_errands:
      post_deploy: health-check
    instance_groups:
      - name: redis
        vm_type: large
        instances: 3
        persistent_disk_type: ten
"#;

    #[test]
    fn test_parse_catalog() {
        let offering: ServiceOffering = serde_yaml::from_str(CATALOG).unwrap();

        assert_eq!(offering.plans.len(), 2);
        assert_eq!(offering.global_quotas, Quotas::limited(10));

        let small = offering.find_plan("small-id").unwrap();
        assert_eq!(small.quotas.service_instance_limit, Some(3));
        assert_eq!(small.post_deploy_errand(), None);
        assert_eq!(small.instance_groups[0].networks, vec!["net1"]);

        let ha = offering.find_plan("ha-id").unwrap();
        assert_eq!(ha.post_deploy_errand(), Some("health-check"));
        assert_eq!(ha.quotas, Quotas::default());
        assert_eq!(
            ha.instance_groups[0].persistent_disk_type.as_deref(),
            Some("ten")
        );
    }

    #[test]
    fn test_has_lifecycle_errands() {
        let mut offering: ServiceOffering = serde_yaml::from_str(CATALOG).unwrap();
        assert!(offering.has_lifecycle_errands());

        offering.plans.retain(|plan| plan.id == "small-id");
        assert!(!offering.has_lifecycle_errands());

        offering.plans[0].lifecycle_errands = Some(LifecycleErrands::default());
        assert!(!offering.has_lifecycle_errands());
    }

    #[test]
    fn test_find_unknown_plan() {
        let offering: ServiceOffering = serde_yaml::from_str(CATALOG).unwrap();
        assert!(offering.find_plan("missing").is_none());
    }
}
