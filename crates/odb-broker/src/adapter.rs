//! Manifest generation
//!
//! The orchestrator never builds manifests itself; it asks a
//! [`ManifestGenerator`] for the manifest of a plan and compares or submits
//! the result. [`TopologyGenerator`] is the built-in generator driven by the
//! plan's instance groups and the releases and stemcell from configuration.

use odb_config::DirectorConfig;
use odb_core::Plan;
use odb_director::manifest::{Job, Manifest, ManifestInstanceGroup, Network, Release, Stemcell};
use serde_json::{Map, Value};
use thiserror::Error;

const STEMCELL_ALIAS: &str = "default";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Arbitrary parameters the generator refuses; shown to the user
    #[error("{0}")]
    InvalidParameters(String),

    #[error("manifest generation failed: {0}")]
    Failed(String),
}

pub trait ManifestGenerator: Send + Sync {
    /// Manifest for `deployment` on `plan`
    ///
    /// `previous` is the manifest currently deployed, if any. Properties it
    /// carries survive unless `plan` or `params` override them.
    fn generate(
        &self,
        deployment: &str,
        plan: &Plan,
        params: &Value,
        previous: Option<&Manifest>,
    ) -> Result<Manifest, AdapterError>;
}

pub struct TopologyGenerator {
    releases: Vec<Release>,
    stemcell: Stemcell,
}

impl TopologyGenerator {
    pub fn new(config: &DirectorConfig) -> Self {
        Self {
            releases: config
                .releases
                .iter()
                .map(|release| Release {
                    name: release.name.clone(),
                    version: release.version.clone(),
                })
                .collect(),
            stemcell: Stemcell {
                alias: STEMCELL_ALIAS.to_string(),
                os: config.stemcell.os.clone(),
                version: config.stemcell.version.clone(),
            },
        }
    }
}

impl ManifestGenerator for TopologyGenerator {
    fn generate(
        &self,
        deployment: &str,
        plan: &Plan,
        params: &Value,
        previous: Option<&Manifest>,
    ) -> Result<Manifest, AdapterError> {
        let release = self
            .releases
            .first()
            .ok_or_else(|| AdapterError::Failed("no releases configured".into()))?;

        if !params.is_null() && !params.is_object() {
            return Err(AdapterError::InvalidParameters(
                "parameters must be a JSON object".into(),
            ));
        }

        let instance_groups = plan
            .instance_groups
            .iter()
            .map(|group| ManifestInstanceGroup {
                name: group.name.clone(),
                instances: group.instances,
                vm_type: group.vm_type.clone(),
                stemcell: self.stemcell.alias.clone(),
                azs: group.azs.clone(),
                networks: group
                    .networks
                    .iter()
                    .map(|name| Network { name: name.clone() })
                    .collect(),
                jobs: vec![Job {
                    name: group.name.clone(),
                    release: release.name.clone(),
                }],
                persistent_disk_type: group.persistent_disk_type.clone(),
                properties: Value::Null,
            })
            .collect();

        let mut properties = previous
            .and_then(|manifest| manifest.properties.as_object())
            .cloned()
            .unwrap_or_default();
        overlay(&mut properties, &plan.properties);
        overlay(&mut properties, params);

        Ok(Manifest {
            name: deployment.to_string(),
            releases: self.releases.clone(),
            stemcells: vec![self.stemcell.clone()],
            update: Some(
                previous
                    .and_then(|manifest| manifest.update.clone())
                    .unwrap_or_default(),
            ),
            instance_groups,
            properties: if properties.is_empty() {
                Value::Null
            } else {
                Value::Object(properties)
            },
        })
    }
}

/// Shallow merge of `layer`'s top-level keys; non-objects are ignored
fn overlay(target: &mut Map<String, Value>, layer: &Value) {
    if let Some(layer) = layer.as_object() {
        for (key, value) in layer {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odb_config::{ReleaseConfig, StemcellConfig};
    use odb_core::{InstanceGroup, Quotas};
    use odb_director::manifest::UpdateBlock;
    use serde_json::json;

    fn generator() -> TopologyGenerator {
        TopologyGenerator::new(&DirectorConfig {
            url: "https://director".into(),
            username: "admin".into(),
            password: "secret".into(),
            stemcell: StemcellConfig {
                os: "ubuntu-jammy".into(),
                version: "1.5".into(),
            },
            releases: vec![ReleaseConfig {
                name: "redis".into(),
                version: "4.0.1".into(),
            }],
        })
    }

    fn plan(properties: Value) -> Plan {
        Plan {
            id: "small-id".into(),
            name: "small".into(),
            instance_groups: vec![InstanceGroup {
                name: "redis-server".into(),
                vm_type: "small".into(),
                instances: 1,
                networks: vec!["default".into()],
                azs: vec!["z1".into()],
                persistent_disk_type: Some("ten".into()),
            }],
            quotas: Quotas::default(),
            lifecycle_errands: None,
            properties,
        }
    }

    #[test]
    fn test_generate_from_plan() {
        let manifest = generator()
            .generate("service-instance_1", &plan(Value::Null), &Value::Null, None)
            .unwrap();

        assert_eq!(manifest.name, "service-instance_1");
        assert_eq!(manifest.stemcells[0].os, "ubuntu-jammy");
        assert_eq!(manifest.update, Some(UpdateBlock::default()));

        let group = manifest.instance_group("redis-server").unwrap();
        assert_eq!(group.stemcell, "default");
        assert_eq!(group.networks, vec![Network { name: "default".into() }]);
        assert_eq!(group.jobs[0].release, "redis");
        assert!(manifest.properties.is_null());
    }

    #[test]
    fn test_properties_layering() {
        let generator = generator();
        let previous = generator
            .generate(
                "d",
                &plan(Value::Null),
                &json!({"maxmemory": "1gb", "persistence": true}),
                None,
            )
            .unwrap();

        let manifest = generator
            .generate(
                "d",
                &plan(json!({"persistence": false})),
                &json!({"timeout": 30}),
                Some(&previous),
            )
            .unwrap();

        assert_eq!(
            manifest.properties,
            json!({"maxmemory": "1gb", "persistence": false, "timeout": 30})
        );
    }

    #[test]
    fn test_regenerating_deployed_manifest_has_no_changes() {
        let generator = generator();
        let deployed = generator
            .generate("d", &plan(Value::Null), &json!({"maxmemory": "1gb"}), None)
            .unwrap();
        let again = generator
            .generate("d", &plan(Value::Null), &Value::Null, Some(&deployed))
            .unwrap();

        assert!(!again.diff(&deployed).has_changes());
    }

    #[test]
    fn test_rejects_non_object_parameters() {
        let err = generator()
            .generate("d", &plan(Value::Null), &json!([1, 2]), None)
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidParameters(_)));
    }
}
