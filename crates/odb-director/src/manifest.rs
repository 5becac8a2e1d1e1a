//! Deployment manifests and manifest diffs
//!
//! A [`Manifest`] is what gets submitted to the director as YAML.
//! [`Manifest::diff`] compares a desired manifest against the one currently
//! deployed and reports per-instance-group changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,

    #[serde(default)]
    pub releases: Vec<Release>,

    #[serde(default)]
    pub stemcells: Vec<Stemcell>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateBlock>,

    #[serde(default)]
    pub instance_groups: Vec<ManifestInstanceGroup>,

    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stemcell {
    pub alias: String,
    pub os: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBlock {
    pub canaries: u32,
    pub max_in_flight: u32,
    pub canary_watch_time: String,
    pub update_watch_time: String,
}

impl Default for UpdateBlock {
    fn default() -> Self {
        Self {
            canaries: 1,
            max_in_flight: 1,
            canary_watch_time: "30000-240000".to_string(),
            update_watch_time: "30000-240000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestInstanceGroup {
    pub name: String,
    pub instances: u32,
    pub vm_type: String,
    pub stemcell: String,

    #[serde(default)]
    pub azs: Vec<String>,

    #[serde(default)]
    pub networks: Vec<Network>,

    #[serde(default)]
    pub jobs: Vec<Job>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_disk_type: Option<String>,

    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub release: String,
}

impl Manifest {
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn instance_group(&self, name: &str) -> Option<&ManifestInstanceGroup> {
        self.instance_groups.iter().find(|group| group.name == name)
    }

    /// Changes needed to turn `current` into `self`
    pub fn diff(&self, current: &Manifest) -> ManifestDiff {
        let names: BTreeSet<&str> = self
            .instance_groups
            .iter()
            .chain(current.instance_groups.iter())
            .map(|group| group.name.as_str())
            .collect();

        let instance_groups = names
            .into_iter()
            .map(|name| {
                let change = match (self.instance_group(name), current.instance_group(name)) {
                    (Some(_), None) => ChangeType::Create,
                    (None, Some(_)) => ChangeType::Delete,
                    (Some(desired), Some(deployed)) if desired != deployed => ChangeType::Update,
                    _ => ChangeType::NoOp,
                };
                InstanceGroupChange {
                    name: name.to_string(),
                    change,
                }
            })
            .collect();

        ManifestDiff {
            instance_groups,
            releases_changed: self.releases != current.releases,
            stemcells_changed: self.stemcells != current.stemcells,
            properties_changed: self.properties != current.properties,
        }
    }
}

/// Kind of change for one instance group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
    NoOp,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::Create => write!(f, "create"),
            ChangeType::Update => write!(f, "update"),
            ChangeType::Delete => write!(f, "delete"),
            ChangeType::NoOp => write!(f, "no-op"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroupChange {
    pub name: String,
    pub change: ChangeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDiff {
    /// One entry per instance group present on either side, sorted by name
    pub instance_groups: Vec<InstanceGroupChange>,
    pub releases_changed: bool,
    pub stemcells_changed: bool,
    pub properties_changed: bool,
}

impl ManifestDiff {
    pub fn has_changes(&self) -> bool {
        self.releases_changed
            || self.stemcells_changed
            || self.properties_changed
            || self
                .instance_groups
                .iter()
                .any(|group| group.change != ChangeType::NoOp)
    }

    fn count(&self, change: ChangeType) -> usize {
        self.instance_groups
            .iter()
            .filter(|group| group.change == change)
            .count()
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            create: self.count(ChangeType::Create),
            update: self.count(ChangeType::Update),
            delete: self.count(ChangeType::Delete),
            no_change: self.count(ChangeType::NoOp),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOYED: &str = r#"
name: service-instance_abc
releases:
  - name: redis
    version: "1.0.0"
stemcells:
  - alias: default
    os: ubuntu-jammy
    version: latest
instance_groups:
  - name: redis-server
    instances: 1
    vm_type: small
    stemcell: default
    azs: [z1]
    networks:
      - name: default
    jobs:
      - name: redis-server
        release: redis
  - name: sentinel
    instances: 3
    vm_type: small
    stemcell: default
properties:
  maxmemory: 256mb
"#;

    fn deployed() -> Manifest {
        Manifest::from_yaml(DEPLOYED).unwrap()
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = deployed();
        assert_eq!(manifest.name, "service-instance_abc");
        assert_eq!(manifest.instance_groups.len(), 2);
        assert_eq!(manifest.properties["maxmemory"], "256mb");
        assert!(manifest.update.is_none());
    }

    #[test]
    fn test_identical_manifests_have_no_changes() {
        let diff = deployed().diff(&deployed());
        assert!(!diff.has_changes());
        assert_eq!(
            diff.summary().to_string(),
            "0 to create, 0 to update, 0 to delete, 2 unchanged"
        );
    }

    #[test]
    fn test_diff_reports_group_changes() {
        let mut desired = deployed();
        desired.instance_groups[0].instances = 2;
        desired.instance_groups.retain(|group| group.name != "sentinel");
        desired.instance_groups.push(ManifestInstanceGroup {
            name: "metrics".into(),
            instances: 1,
            vm_type: "small".into(),
            stemcell: "default".into(),
            azs: vec![],
            networks: vec![],
            jobs: vec![],
            persistent_disk_type: None,
            properties: serde_json::Value::Null,
        });

        let diff = desired.diff(&deployed());
        let changes: Vec<_> = diff
            .instance_groups
            .iter()
            .map(|group| (group.name.as_str(), group.change))
            .collect();

        assert_eq!(
            changes,
            vec![
                ("metrics", ChangeType::Create),
                ("redis-server", ChangeType::Update),
                ("sentinel", ChangeType::Delete),
            ]
        );
        assert!(diff.has_changes());
        assert!(!diff.properties_changed);
    }

    #[test]
    fn test_property_change_alone_is_a_change() {
        let mut desired = deployed();
        desired.properties["maxmemory"] = serde_json::json!("512mb");
        let diff = desired.diff(&deployed());
        assert!(diff.properties_changed);
        assert!(diff.has_changes());
        assert_eq!(diff.summary().no_change, 2);
    }

    #[test]
    fn test_yaml_round_trip_preserves_manifest() {
        let manifest = deployed();
        let reparsed = Manifest::from_yaml(&manifest.to_yaml().unwrap()).unwrap();
        assert!(!reparsed.diff(&manifest).has_changes());
    }
}
