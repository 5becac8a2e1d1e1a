//! Operation orchestrator
//!
//! Every entry point re-reads instance state from the registry and the
//! director; nothing is cached between requests. The in-progress check is a
//! fast-fail: the director itself serialises conflicting deployments.

use crate::adapter::{AdapterError, ManifestGenerator};
use crate::error::{BrokerError, Result};
use crate::operation::{DeprovisionOutcome, OperationToken, OperationType};
use crate::quota;
use odb_core::{PENDING_CHANGES_ERROR_MESSAGE, Plan, RequestContext, ServiceOffering};
use odb_director::{Director, Manifest};
use odb_registry::Registry;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Prefix of every deployment owned by the broker
pub const DEPLOYMENT_PREFIX: &str = "service-instance_";

pub fn deployment_name(instance_id: &str) -> String {
    format!("{}{}", DEPLOYMENT_PREFIX, instance_id)
}

fn new_context_id() -> String {
    Uuid::new_v4().to_string()
}

/// `ctx` narrowed to one operation on one instance
pub(crate) fn scoped(
    ctx: &RequestContext,
    instance_id: &str,
    operation: OperationType,
) -> RequestContext {
    ctx.clone()
        .with_instance_id(instance_id)
        .with_operation(operation.to_string())
}

pub struct Broker {
    pub(crate) registry: Arc<dyn Registry>,
    pub(crate) director: Arc<dyn Director>,
    pub(crate) adapter: Arc<dyn ManifestGenerator>,
    pub(crate) offering: ServiceOffering,
}

impl Broker {
    pub fn new(
        registry: Arc<dyn Registry>,
        director: Arc<dyn Director>,
        adapter: Arc<dyn ManifestGenerator>,
        offering: ServiceOffering,
    ) -> Self {
        Self {
            registry,
            director,
            adapter,
            offering,
        }
    }

    pub fn offering(&self) -> &ServiceOffering {
        &self.offering
    }

    pub(crate) fn plan(&self, plan_id: &str) -> Result<&Plan> {
        self.offering
            .find_plan(plan_id)
            .ok_or_else(|| BrokerError::UnprocessableRequest(format!("plan {} not found", plan_id)))
    }

    fn generate(
        &self,
        ctx: &RequestContext,
        deployment: &str,
        plan: &Plan,
        params: &Value,
        previous: Option<&Manifest>,
    ) -> Result<Manifest> {
        self.adapter
            .generate(deployment, plan, params, previous)
            .map_err(|e| match e {
                AdapterError::InvalidParameters(message) => {
                    BrokerError::UnprocessableRequest(message)
                }
                other @ AdapterError::Failed(_) => BrokerError::generic(ctx, other),
            })
    }

    /// Submit `manifest`, threading a fresh context id through when the plan
    /// has a post-deploy errand
    async fn submit(
        &self,
        ctx: &RequestContext,
        manifest: &Manifest,
        plan: &Plan,
        operation_type: OperationType,
    ) -> Result<OperationToken> {
        match plan.post_deploy_errand() {
            Some(errand) => {
                let context_id = new_context_id();
                let task_id = self
                    .director
                    .submit_deployment(ctx, manifest, Some(&context_id))
                    .await?;
                Ok(OperationToken::new(operation_type, task_id)
                    .with_context_id(context_id)
                    .with_post_deploy_errand(errand))
            }
            None => {
                let task_id = self.director.submit_deployment(ctx, manifest, None).await?;
                Ok(OperationToken::new(operation_type, task_id))
            }
        }
    }

    /// Fail with [`BrokerError::OperationInProgress`] when the director is
    /// still working on the deployment
    async fn ensure_no_incomplete_tasks(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        deployment: &str,
    ) -> Result<()> {
        let tasks = self.director.incomplete_tasks(ctx, deployment).await?;
        if let Some(task) = tasks.first() {
            tracing::info!(
                instance_id,
                task_id = %task.id,
                state = %task.state,
                "Deployment has an incomplete task"
            );
            return Err(BrokerError::OperationInProgress(instance_id.to_string()));
        }
        Ok(())
    }

    pub async fn provision(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        plan_id: &str,
        params: &Value,
    ) -> Result<OperationToken> {
        let ctx = &scoped(ctx, instance_id, OperationType::Provision);
        let plan = self.plan(plan_id)?;
        let deployment = deployment_name(instance_id);

        let counts = self
            .registry
            .count_instances_of_service_offering(ctx, &self.offering.id)
            .await?;
        quota::check_provision(
            &counts,
            plan_id,
            plan.quotas.service_instance_limit,
            self.offering.global_quotas.service_instance_limit,
        )
        .map_err(|scope| BrokerError::QuotaExceeded(scope.message().to_string()))?;

        if self
            .director
            .get_current_manifest(ctx, &deployment)
            .await?
            .is_some()
        {
            return Err(BrokerError::AlreadyExists(instance_id.to_string()));
        }

        let manifest = self.generate(ctx, &deployment, plan, params, None)?;
        let token = self
            .submit(ctx, &manifest, plan, OperationType::Provision)
            .await?;

        tracing::info!(
            instance_id,
            plan_id,
            task_id = %token.task_id,
            "Provisioning instance"
        );
        Ok(token)
    }

    /// Change plan or parameters of an instance
    ///
    /// `new_plan_id` of `None` keeps the current plan.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        new_plan_id: Option<&str>,
        params: &Value,
    ) -> Result<OperationToken> {
        let ctx = &scoped(ctx, instance_id, OperationType::Update);
        let state = self.registry.get_instance_state(ctx, instance_id).await?;
        let current_plan = self.plan(&state.plan_id)?;
        let target_plan = match new_plan_id {
            Some(plan_id) => self.plan(plan_id)?,
            None => current_plan,
        };
        let plan_changed = target_plan.id != current_plan.id;

        if state.operation_in_progress {
            return Err(BrokerError::OperationInProgress(instance_id.to_string()));
        }
        let deployment = deployment_name(instance_id);
        self.ensure_no_incomplete_tasks(ctx, instance_id, &deployment)
            .await?;

        if plan_changed {
            let count = self
                .registry
                .count_instances_of_plan(ctx, &self.offering.id, &target_plan.id)
                .await?;
            if !quota::allows(count, target_plan.quotas.service_instance_limit) {
                return Err(BrokerError::QuotaExceeded(
                    quota::QuotaScope::Plan.message().to_string(),
                ));
            }
        }

        let deployed = self
            .director
            .get_current_manifest(ctx, &deployment)
            .await?
            .ok_or_else(|| BrokerError::DeploymentGone(deployment.clone()))?;

        let params_changed = params.as_object().is_some_and(|params| !params.is_empty());
        if plan_changed || params_changed {
            let expected =
                self.generate(ctx, &deployment, current_plan, &Value::Null, Some(&deployed))?;
            let pending = expected.diff(&deployed);
            if pending.has_changes() {
                tracing::warn!(
                    instance_id,
                    changes = %pending.summary(),
                    "Refusing update of a deployment with pending changes"
                );
                return Err(BrokerError::UnprocessableRequest(
                    PENDING_CHANGES_ERROR_MESSAGE.to_string(),
                ));
            }
        }

        let manifest = self.generate(ctx, &deployment, target_plan, params, Some(&deployed))?;
        let diff = manifest.diff(&deployed);
        tracing::info!(
            instance_id,
            from_plan = %current_plan.id,
            to_plan = %target_plan.id,
            changes = %diff.summary(),
            "Updating instance"
        );

        let token = self
            .submit(ctx, &manifest, target_plan, OperationType::Update)
            .await?;
        Ok(if plan_changed {
            token.with_plan_id(target_plan.id.clone())
        } else {
            token
        })
    }

    /// Redeploy an instance on its current plan, applying pending changes
    pub async fn upgrade(&self, ctx: &RequestContext, instance_id: &str) -> Result<OperationToken> {
        let ctx = &scoped(ctx, instance_id, OperationType::Upgrade);
        let state = self.registry.get_instance_state(ctx, instance_id).await?;
        let plan = self.plan(&state.plan_id)?;

        if state.operation_in_progress {
            return Err(BrokerError::OperationInProgress(instance_id.to_string()));
        }
        let deployment = deployment_name(instance_id);
        self.ensure_no_incomplete_tasks(ctx, instance_id, &deployment)
            .await?;

        let deployed = self
            .director
            .get_current_manifest(ctx, &deployment)
            .await?
            .ok_or_else(|| BrokerError::DeploymentGone(deployment.clone()))?;

        let manifest = self.generate(ctx, &deployment, plan, &Value::Null, Some(&deployed))?;
        tracing::info!(
            instance_id,
            plan_id = %plan.id,
            changes = %manifest.diff(&deployed).summary(),
            "Upgrading instance"
        );

        let token = self
            .submit(ctx, &manifest, plan, OperationType::Upgrade)
            .await?;
        Ok(token.with_plan_id(plan.id.clone()))
    }

    pub async fn deprovision(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
    ) -> Result<DeprovisionOutcome> {
        let ctx = &scoped(ctx, instance_id, OperationType::Deprovision);
        let state = match self.registry.get_instance_state(ctx, instance_id).await {
            Ok(state) => state,
            Err(e) if e.is_not_found() => {
                tracing::info!(instance_id, "Instance unknown to the registry");
                return Ok(DeprovisionOutcome::AlreadyDeprovisioned);
            }
            Err(e) => return Err(e.into()),
        };

        if state.operation_in_progress {
            return Err(BrokerError::OperationInProgress(instance_id.to_string()));
        }
        let deployment = deployment_name(instance_id);
        self.ensure_no_incomplete_tasks(ctx, instance_id, &deployment)
            .await?;

        if self
            .director
            .get_current_manifest(ctx, &deployment)
            .await?
            .is_none()
        {
            tracing::info!(instance_id, %deployment, "Deployment already gone");
            return Ok(DeprovisionOutcome::AlreadyDeprovisioned);
        }

        let pre_delete = self
            .offering
            .find_plan(&state.plan_id)
            .and_then(Plan::pre_delete_errand);

        let token = match pre_delete {
            Some(errand) => {
                let context_id = new_context_id();
                let task_id = self
                    .director
                    .run_errand(ctx, &deployment, errand, Some(&context_id))
                    .await?;
                tracing::info!(instance_id, errand, %task_id, "Running pre-delete errand");
                OperationToken::new(OperationType::Deprovision, task_id)
                    .with_context_id(context_id)
                    .with_pre_delete_errand(errand)
            }
            None => match self.director.delete_deployment(ctx, &deployment, None).await {
                Ok(task_id) => {
                    tracing::info!(instance_id, %task_id, "Deleting deployment");
                    OperationToken::new(OperationType::Deprovision, task_id)
                }
                Err(e) if e.is_not_found() => {
                    return Ok(DeprovisionOutcome::AlreadyDeprovisioned);
                }
                Err(e) => return Err(e.into()),
            },
        };

        Ok(DeprovisionOutcome::Submitted(token))
    }
}
