//! In-memory registry and director used by the orchestrator tests

#![allow(dead_code)]

use async_trait::async_trait;
use odb_broker::{Broker, ManifestGenerator, TopologyGenerator, deployment_name};
use odb_config::{DirectorConfig, ReleaseConfig, StemcellConfig};
use odb_core::{InstanceGroup, LifecycleErrands, Plan, Quotas, RequestContext, ServiceOffering};
use odb_director::{
    Binding, BindingRequest, Director, DirectorError, DirectorVersion, Manifest, Task, TaskId,
    TaskState,
};
use odb_registry::{
    Binding as RegistryBinding, Instance, InstanceRef, InstanceState, Registry, RegistryError,
    ServiceKey,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const SMALL_PLAN: &str = "small-id";
pub const HA_PLAN: &str = "ha-id";
pub const POST_DEPLOY_ERRAND: &str = "smoke-tests";
pub const PRE_DELETE_ERRAND: &str = "drain";

// ============ Registry ============

pub struct RegistryState {
    pub api_version: Result<String, RegistryError>,
    pub instances: Vec<InstanceRef>,
    pub in_progress: HashSet<String>,
    pub bindings: HashMap<String, Vec<RegistryBinding>>,
    pub keys: HashMap<String, Vec<ServiceKey>>,
    pub brokers: HashMap<String, String>,
    /// Deleted instances stay listed, as when deletions never finish
    pub sticky_instances: bool,
    pub count_error: Option<RegistryError>,
    pub calls: Vec<String>,
}

impl Default for RegistryState {
    fn default() -> Self {
        Self {
            api_version: Ok("2.57.0".to_string()),
            instances: Vec::new(),
            in_progress: HashSet::new(),
            bindings: HashMap::new(),
            keys: HashMap::new(),
            brokers: HashMap::new(),
            sticky_instances: false,
            count_error: None,
            calls: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    pub state: Mutex<RegistryState>,
}

impl FakeRegistry {
    pub fn add_instance(&self, guid: &str, plan_id: &str) {
        self.state.lock().unwrap().instances.push(InstanceRef {
            guid: guid.to_string(),
            plan_unique_id: plan_id.to_string(),
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn counts(state: &RegistryState) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for instance in &state.instances {
            *counts.entry(instance.plan_unique_id.clone()).or_insert(0) += 1;
        }
        counts
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn api_version(&self, _ctx: &RequestContext) -> odb_registry::Result<String> {
        self.state.lock().unwrap().api_version.clone()
    }

    async fn broker_guid(
        &self,
        _ctx: &RequestContext,
        broker_name: &str,
    ) -> odb_registry::Result<String> {
        self.record(format!("broker_guid {}", broker_name));
        self.state
            .lock()
            .unwrap()
            .brokers
            .get(broker_name)
            .cloned()
            .ok_or_else(|| RegistryError::BrokerNotFound(broker_name.to_string()))
    }

    async fn count_instances_of_service_offering(
        &self,
        _ctx: &RequestContext,
        _offering_id: &str,
    ) -> odb_registry::Result<HashMap<String, usize>> {
        let state = self.state.lock().unwrap();
        if let Some(err) = &state.count_error {
            return Err(err.clone());
        }
        Ok(Self::counts(&state))
    }

    async fn count_instances_of_plan(
        &self,
        _ctx: &RequestContext,
        _offering_id: &str,
        plan_id: &str,
    ) -> odb_registry::Result<usize> {
        let state = self.state.lock().unwrap();
        Ok(Self::counts(&state).get(plan_id).copied().unwrap_or(0))
    }

    async fn get_instance(
        &self,
        _ctx: &RequestContext,
        instance_id: &str,
    ) -> odb_registry::Result<Instance> {
        let state = self.state.lock().unwrap();
        state
            .instances
            .iter()
            .find(|instance| instance.guid == instance_id)
            .map(|instance| Instance {
                guid: instance.guid.clone(),
                service_plan_url: format!("/v2/service_plans/{}", instance.plan_unique_id),
                last_operation: None,
            })
            .ok_or_else(|| RegistryError::NotFound(instance_id.to_string()))
    }

    async fn get_instance_state(
        &self,
        _ctx: &RequestContext,
        instance_id: &str,
    ) -> odb_registry::Result<InstanceState> {
        let state = self.state.lock().unwrap();
        state
            .instances
            .iter()
            .find(|instance| instance.guid == instance_id)
            .map(|instance| InstanceState {
                plan_id: instance.plan_unique_id.clone(),
                operation_in_progress: state.in_progress.contains(instance_id),
            })
            .ok_or_else(|| RegistryError::NotFound(instance_id.to_string()))
    }

    async fn get_instances_of_service_offering(
        &self,
        _ctx: &RequestContext,
        _offering_id: &str,
    ) -> odb_registry::Result<Vec<InstanceRef>> {
        self.record("get_instances".to_string());
        Ok(self.state.lock().unwrap().instances.clone())
    }

    async fn get_bindings_for_instance(
        &self,
        _ctx: &RequestContext,
        instance_id: &str,
    ) -> odb_registry::Result<Vec<RegistryBinding>> {
        let state = self.state.lock().unwrap();
        Ok(state.bindings.get(instance_id).cloned().unwrap_or_default())
    }

    async fn get_service_keys_for_instance(
        &self,
        _ctx: &RequestContext,
        instance_id: &str,
    ) -> odb_registry::Result<Vec<ServiceKey>> {
        let state = self.state.lock().unwrap();
        Ok(state.keys.get(instance_id).cloned().unwrap_or_default())
    }

    async fn delete_binding(
        &self,
        _ctx: &RequestContext,
        binding: &RegistryBinding,
    ) -> odb_registry::Result<()> {
        self.record(format!("delete_binding {}", binding.guid));
        Ok(())
    }

    async fn delete_service_key(
        &self,
        _ctx: &RequestContext,
        key: &ServiceKey,
    ) -> odb_registry::Result<()> {
        self.record(format!("delete_service_key {}", key.guid));
        Ok(())
    }

    async fn delete_service_instance(
        &self,
        _ctx: &RequestContext,
        instance_id: &str,
    ) -> odb_registry::Result<()> {
        self.record(format!("delete_service_instance {}", instance_id));
        let mut state = self.state.lock().unwrap();
        if !state.sticky_instances {
            state.instances.retain(|instance| instance.guid != instance_id);
        }
        Ok(())
    }

    async fn disable_service_access(
        &self,
        _ctx: &RequestContext,
        offering_id: &str,
    ) -> odb_registry::Result<()> {
        self.record(format!("disable_service_access {}", offering_id));
        Ok(())
    }

    async fn deregister_broker(
        &self,
        _ctx: &RequestContext,
        broker_guid: &str,
    ) -> odb_registry::Result<()> {
        self.record(format!("deregister_broker {}", broker_guid));
        Ok(())
    }
}

// ============ Director ============

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub manifest: Manifest,
    pub context_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrandRun {
    pub deployment: String,
    pub errand: String,
    pub context_id: Option<String>,
}

pub struct DirectorState {
    pub version: Result<DirectorVersion, DirectorError>,
    pub manifests: HashMap<String, Manifest>,
    /// Every task ever created, with the deployment it belongs to
    pub tasks: Vec<(String, Task)>,
    pub next_task_id: u64,
    pub submissions: Vec<Submission>,
    pub errands: Vec<ErrandRun>,
    pub deletions: Vec<(String, Option<String>)>,
    pub bindings: HashSet<(String, String)>,
    /// Deployments unrelated to any instance
    pub foreign_deployments: Vec<String>,
    pub submit_error: Option<DirectorError>,
}

impl Default for DirectorState {
    fn default() -> Self {
        Self {
            version: Ok(DirectorVersion::new(270, 2, 0)),
            manifests: HashMap::new(),
            tasks: Vec::new(),
            next_task_id: 100,
            submissions: Vec::new(),
            errands: Vec::new(),
            deletions: Vec::new(),
            bindings: HashSet::new(),
            foreign_deployments: Vec::new(),
            submit_error: None,
        }
    }
}

impl DirectorState {
    fn create_task(
        &mut self,
        deployment: &str,
        description: &str,
        context_id: Option<&str>,
    ) -> TaskId {
        self.next_task_id += 1;
        let id = TaskId(self.next_task_id);
        self.tasks.push((
            deployment.to_string(),
            Task {
                id,
                state: TaskState::Queued,
                description: description.to_string(),
                result: None,
                context_id: context_id.map(str::to_string),
            },
        ));
        id
    }
}

#[derive(Default)]
pub struct FakeDirector {
    pub state: Mutex<DirectorState>,
}

impl FakeDirector {
    pub fn set_manifest(&self, manifest: Manifest) {
        self.state
            .lock()
            .unwrap()
            .manifests
            .insert(manifest.name.clone(), manifest);
    }

    pub fn set_task_state(&self, task_id: TaskId, state: TaskState) {
        let mut director = self.state.lock().unwrap();
        for (_, task) in director.tasks.iter_mut() {
            if task.id == task_id {
                task.state = state;
            }
        }
    }

    /// Mark the most recently created task as finished with `state`
    pub fn finish_latest(&self, state: TaskState) {
        let mut director = self.state.lock().unwrap();
        if let Some((_, task)) = director.tasks.last_mut() {
            task.state = state;
        }
    }

    pub fn add_running_task(&self, deployment: &str) -> TaskId {
        let mut director = self.state.lock().unwrap();
        let id = director.create_task(deployment, "other operation", None);
        director.tasks.last_mut().unwrap().1.state = TaskState::Processing;
        id
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn errands(&self) -> Vec<ErrandRun> {
        self.state.lock().unwrap().errands.clone()
    }

    pub fn deletions(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().deletions.clone()
    }
}

#[async_trait]
impl Director for FakeDirector {
    async fn submit_deployment(
        &self,
        _ctx: &RequestContext,
        manifest: &Manifest,
        context_id: Option<&str>,
    ) -> odb_director::Result<TaskId> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = &state.submit_error {
            return Err(err.clone());
        }
        state.submissions.push(Submission {
            manifest: manifest.clone(),
            context_id: context_id.map(str::to_string),
        });
        state
            .manifests
            .insert(manifest.name.clone(), manifest.clone());
        Ok(state.create_task(&manifest.name, "create deployment", context_id))
    }

    async fn delete_deployment(
        &self,
        _ctx: &RequestContext,
        deployment: &str,
        context_id: Option<&str>,
    ) -> odb_director::Result<TaskId> {
        let mut state = self.state.lock().unwrap();
        if !state.manifests.contains_key(deployment) {
            return Err(DirectorError::NotFound(deployment.to_string()));
        }
        state
            .deletions
            .push((deployment.to_string(), context_id.map(str::to_string)));
        Ok(state.create_task(deployment, "delete deployment", context_id))
    }

    async fn run_errand(
        &self,
        _ctx: &RequestContext,
        deployment: &str,
        errand: &str,
        context_id: Option<&str>,
    ) -> odb_director::Result<TaskId> {
        let mut state = self.state.lock().unwrap();
        state.errands.push(ErrandRun {
            deployment: deployment.to_string(),
            errand: errand.to_string(),
            context_id: context_id.map(str::to_string),
        });
        Ok(state.create_task(deployment, "run errand", context_id))
    }

    async fn poll_task(
        &self,
        _ctx: &RequestContext,
        task_id: TaskId,
    ) -> odb_director::Result<Task> {
        let state = self.state.lock().unwrap();
        state
            .tasks
            .iter()
            .map(|(_, task)| task)
            .find(|task| task.id == task_id)
            .cloned()
            .ok_or_else(|| DirectorError::NotFound(format!("task {}", task_id)))
    }

    async fn tasks_for_context(
        &self,
        _ctx: &RequestContext,
        deployment: &str,
        context_id: &str,
    ) -> odb_director::Result<Vec<Task>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tasks
            .iter()
            .filter(|(name, task)| {
                name == deployment && task.context_id.as_deref() == Some(context_id)
            })
            .map(|(_, task)| task.clone())
            .collect())
    }

    async fn incomplete_tasks(
        &self,
        _ctx: &RequestContext,
        deployment: &str,
    ) -> odb_director::Result<Vec<Task>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tasks
            .iter()
            .filter(|(name, task)| name == deployment && task.state.is_incomplete())
            .map(|(_, task)| task.clone())
            .collect())
    }

    async fn get_current_manifest(
        &self,
        _ctx: &RequestContext,
        deployment: &str,
    ) -> odb_director::Result<Option<Manifest>> {
        Ok(self.state.lock().unwrap().manifests.get(deployment).cloned())
    }

    async fn deployments(&self, _ctx: &RequestContext) -> odb_director::Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .manifests
            .keys()
            .cloned()
            .chain(state.foreign_deployments.iter().cloned())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn director_version(
        &self,
        _ctx: &RequestContext,
    ) -> odb_director::Result<DirectorVersion> {
        self.state.lock().unwrap().version.clone()
    }

    async fn create_binding(
        &self,
        _ctx: &RequestContext,
        deployment: &str,
        binding_id: &str,
        request: &BindingRequest,
    ) -> odb_director::Result<Binding> {
        let mut state = self.state.lock().unwrap();
        if !state.manifests.contains_key(deployment) {
            return Err(DirectorError::NotFound(deployment.to_string()));
        }
        if request.app_guid.is_none() {
            return Err(DirectorError::AppGuidNotProvided);
        }
        let key = (deployment.to_string(), binding_id.to_string());
        if !state.bindings.insert(key) {
            return Err(DirectorError::BindingAlreadyExists(binding_id.to_string()));
        }
        Ok(Binding {
            credentials: serde_json::json!({ "host": format!("{}.internal", deployment) }),
            syslog_drain_url: None,
            route_service_url: None,
        })
    }

    async fn delete_binding(
        &self,
        _ctx: &RequestContext,
        deployment: &str,
        binding_id: &str,
    ) -> odb_director::Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.manifests.contains_key(deployment) {
            return Err(DirectorError::NotFound(deployment.to_string()));
        }
        let key = (deployment.to_string(), binding_id.to_string());
        if !state.bindings.remove(&key) {
            return Err(DirectorError::BindingNotFound(binding_id.to_string()));
        }
        Ok(())
    }
}

// ============ Catalog and harness ============

fn plan(id: &str, name: &str, vm_type: &str, instances: u32) -> Plan {
    Plan {
        id: id.to_string(),
        name: name.to_string(),
        instance_groups: vec![InstanceGroup {
            name: "redis-server".to_string(),
            vm_type: vm_type.to_string(),
            instances,
            networks: vec!["default".to_string()],
            azs: vec!["z1".to_string()],
            persistent_disk_type: None,
        }],
        quotas: Quotas::default(),
        lifecycle_errands: None,
        properties: Value::Null,
    }
}

/// Two plans: `small` without errands, `ha` with both lifecycle errands
pub fn offering() -> ServiceOffering {
    let small = Plan {
        quotas: Quotas::limited(2),
        ..plan(SMALL_PLAN, "small", "small", 1)
    };
    let ha = Plan {
        lifecycle_errands: Some(LifecycleErrands {
            post_deploy: Some(POST_DEPLOY_ERRAND.to_string()),
            pre_delete: Some(PRE_DELETE_ERRAND.to_string()),
        }),
        ..plan(HA_PLAN, "ha", "large", 3)
    };

    ServiceOffering {
        id: "redis-offering-id".to_string(),
        name: "redis-on-demand".to_string(),
        plans: vec![small, ha],
        global_quotas: Quotas::limited(5),
    }
}

pub fn generator() -> TopologyGenerator {
    TopologyGenerator::new(&DirectorConfig {
        url: "https://director.example.com:25555".to_string(),
        username: "admin".to_string(),
        password: "secret".to_string(),
        stemcell: StemcellConfig {
            os: "ubuntu-jammy".to_string(),
            version: "1.5".to_string(),
        },
        releases: vec![ReleaseConfig {
            name: "redis".to_string(),
            version: "4.0.1".to_string(),
        }],
    })
}

pub struct Harness {
    pub broker: Broker,
    pub registry: Arc<FakeRegistry>,
    pub director: Arc<FakeDirector>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_offering(offering())
    }

    pub fn with_offering(offering: ServiceOffering) -> Self {
        let registry = Arc::new(FakeRegistry::default());
        let director = Arc::new(FakeDirector::default());
        let broker = Broker::new(
            registry.clone(),
            director.clone(),
            Arc::new(generator()),
            offering,
        );
        Self {
            broker,
            registry,
            director,
        }
    }

    /// An instance known to the registry with its deployment in place
    pub fn existing_instance(&self, instance_id: &str, plan_id: &str) {
        self.registry.add_instance(instance_id, plan_id);
        let plan = self
            .broker
            .offering()
            .find_plan(plan_id)
            .unwrap()
            .clone();
        let manifest = generator()
            .generate(&deployment_name(instance_id), &plan, &Value::Null, None)
            .unwrap();
        self.director.set_manifest(manifest);
    }
}

pub fn ctx() -> RequestContext {
    RequestContext::new("redis-on-demand")
}
